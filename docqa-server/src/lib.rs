//! `docqa-server` exposes conversational document question answering over HTTP.
//! Clients upload a document's extracted pages to a session, then ask questions
//! that are answered from that document with the session's history in mind.

pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorBody};
pub use server::{AppState, app_router, run_server};
pub use session::SessionRegistry;
