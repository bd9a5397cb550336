pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod conversation;
pub mod error;
pub mod handler;
pub mod session;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use api::{ApiClient, AuthService, ChatService};
pub use config::Config;
pub use conversation::{Conversation, Message, Sender};
pub use error::{ApiError, StoreError};
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
