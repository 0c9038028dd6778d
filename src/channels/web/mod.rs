//! BFF HTTP entry point.

pub mod server;
pub mod types;

pub use self::server::{BffState, build_router, start_server};
