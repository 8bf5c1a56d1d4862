pub mod input;
pub mod output;
pub mod unpack;

pub use input::*;
pub use output::*;
pub use unpack::*;
