pub mod audio;
pub mod config;
pub mod error;
pub mod segment;
pub mod session;
pub mod summary;
pub mod transport;

// Re-export specific items if needed for convenient access
pub use error::Error;
pub use session::{Scene, SessionActor, SessionEvent, SessionState, SideEffect};
