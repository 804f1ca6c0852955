pub mod base;
pub mod console;
pub mod library;
pub mod logging;
pub mod player;

pub use base::*;
pub use console::*;
pub use library::*;
pub use logging::*;
pub use player::*;
