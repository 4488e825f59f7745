pub mod events;
pub mod info;
pub mod models;
pub mod opcodes;

pub use events::*;
pub use info::*;
pub use models::*;
pub use opcodes::*;
