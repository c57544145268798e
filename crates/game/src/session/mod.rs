mod client;
mod config;
mod events;
mod server;

pub use client::{ClientError, ConnectionStatus, GameClient};
pub use config::{ClientConfig, ServerConfig};
pub use events::{DisconnectReason, ServerEvent};
pub use server::GameServer;
