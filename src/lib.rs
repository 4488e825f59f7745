pub mod common;
pub mod configs;
pub mod monitoring;
pub mod party;
pub mod protocol;
pub mod server;
pub mod transport;
