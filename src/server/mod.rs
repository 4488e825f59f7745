pub mod app_state;
pub mod directory;
pub mod room;
pub mod sweeper;

pub use app_state::AppState;
pub use directory::SessionDirectory;
pub use room::PartyRoom;
pub use sweeper::spawn_sweeper;
