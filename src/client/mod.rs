//! Client management system
//!
//! Handles client connections, per-client station state, and session lifecycle.

pub mod handler;
pub mod registry;
pub mod session;
pub mod state;

pub use handler::handle_client;
pub use registry::ClientRegistry;
pub use session::Session;
pub use state::ClientState;
