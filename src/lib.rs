//! Token and access review webhooks backed by hot-reloaded files.
//!
//! # Architecture Overview
//!
//! ```text
//!     API server                ┌──────────────────────────────────────────┐
//!     ─────────────────────────▶│ net (TLS) → http server → webhook        │
//!     POST /authorize/{kind}    │                           dispatcher     │
//!                               │                               │          │
//!                               │                               ▼          │
//!                               │                  state (ArcSwap snapshot)│
//!                               │                    │               │     │
//!                               │               tokenfile        abac      │
//!                               │               provider         provider  │
//!                               │                    ▲               ▲     │
//!                               │                    └── config ─────┘     │
//!                               │                        watcher           │
//!                               └──────────────────────────────────────────┘
//! ```
//!
//! Reviews always see one consistent pair of providers. A file edit that
//! fails to parse leaves the previous providers in place.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod provider;
pub mod state;
pub mod webhook;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::Options;
pub use http::HttpServer;
pub use lifecycle::{Service, Shutdown};
pub use state::StateStore;
pub use webhook::WebhookDispatcher;
