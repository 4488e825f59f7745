pub mod info;
pub mod parties;

pub use info::{get_info, get_stats, get_version};
pub use parties::{create_party, get_party, remove_member};
