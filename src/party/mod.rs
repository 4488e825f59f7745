pub mod authority;
pub mod buffering;
pub mod chat;
pub mod content;
pub mod membership;
pub mod session;

pub use content::{ContentCatalog, ContentRef, ContentSummary, StaticCatalog};
pub use session::{Founding, PartySession};
