pub mod metadata;
pub mod offsets;
pub mod speaker_start;

pub use metadata::*;
pub use offsets::*;
pub use speaker_start::*;
