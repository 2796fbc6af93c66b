mod compile;
mod info;
mod verify;

pub use compile::*;
pub use info::*;
pub use verify::*;
