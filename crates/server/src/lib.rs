//! WebSocket push server for simulated stock prices
//!
//! Wires the price simulator, fan-out engine, identity store and trade
//! ledger behind a WebSocket command protocol.

pub mod config;
pub mod hub;
pub mod protocol;
pub mod rate_limit;
pub mod server;
pub mod service;
pub mod session;

pub use config::load_config;
pub use hub::ChannelHub;
pub use protocol::{ClientMessage, SessionError, SessionResult};
pub use rate_limit::{LoginLimiter, RateLimitResult};
pub use server::{WsServer, WsServerBuilder};
pub use service::AppService;
pub use session::{handle_connection, Session};
