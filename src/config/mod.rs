mod server;

pub use server::{Environment, MinigameConfig, ServerConfig, SessionConfig};
