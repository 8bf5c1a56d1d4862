pub mod label;
pub mod speaker;
pub mod transcript;
pub mod turn;

pub use label::*;
pub use speaker::*;
pub use transcript::*;
pub use turn::*;
