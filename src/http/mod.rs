//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → request.rs (assign or keep the request ID)
//!     → server.rs (route, read body, dispatch, map errors to status)
//!     → webhook dispatcher answers the review
//!     → Send JSON review back to client
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
