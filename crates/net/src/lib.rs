//! Huddle Network Library
//!
//! Realtime change feed plus the HTTP collaborators the app talks to.
//!
//! # Architecture
//!
//! - **Server**: relays group changes between connected clients
//! - **Client**: subscribes to groups and publishes its own changes
//! - **Protocol**: Length-prefixed JSON messages
//! - **Suggest**: generative task suggestions
//! - **Push**: notification delivery
//!
//! # Usage
//!
//! ```ignore
//! let server = FeedServer::start(DEFAULT_FEED_ADDR).await?;
//!
//! let mut client = FeedClient::connect(server.addr()).await?;
//! client.subscribe(group_id).await?;
//!
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         FeedEvent::Change(change) => { /* refresh */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod push;
pub mod server;
pub mod suggest;

pub use client::{ConnectionState, FeedClient, FeedEvent};
pub use error::{Error, Result};
pub use protocol::{Change, Message};
pub use push::{ExpoPushClient, PushMessage, PushSender};
pub use server::FeedServer;
pub use suggest::{GeminiConfig, GeminiSuggester, TaskSuggester};

/// Default address for the change feed
pub const DEFAULT_FEED_ADDR: &str = "127.0.0.1:7878";
