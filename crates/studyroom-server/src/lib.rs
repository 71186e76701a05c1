pub mod clock;
pub mod config;
pub mod push;
pub mod registry;
pub mod repository;
pub mod room;
pub mod server;

pub use config::StudyRoomConfig;
pub use registry::{RegistryError, RegistryOptions, RoomRegistry};
pub use server::run_server;
