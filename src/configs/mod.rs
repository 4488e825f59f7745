pub mod base;
pub mod catalog;
pub mod logging;
pub mod party;
pub mod server;

pub use base::*;
pub use catalog::*;
pub use logging::*;
pub use party::*;
pub use server::*;
