pub mod protocol;
pub mod path;
pub mod creature;

pub use protocol::*;
pub use path::*;
pub use creature::*;
