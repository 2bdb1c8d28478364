//! Review protocol handling.
//!
//! # Data Flow
//! ```text
//! POST /authorize/{kind}
//!     → dispatcher.rs (resolve kind, decode body)
//!     → StateStore snapshot
//!     → provider call
//!     → schema.rs (encode review response)
//! ```
//!
//! # Design Decisions
//! - The set of review kinds is a closed enum, checked before decoding
//! - A negative answer ("token not found", "No policy matched.") is a
//!   successful response; only unknown kinds, bad bodies and provider
//!   failures are errors

pub mod dispatcher;
pub mod schema;

pub use dispatcher::{DispatchError, ReviewKind, ReviewRequest, ReviewResponse, WebhookDispatcher};
