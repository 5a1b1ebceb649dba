//! HTTP server module for the site explorer.
//!
//! Exposes the catalog and the per-site actions as a REST API that a thin page drives.
//! Controller events are pushed to the page over Server-Sent Events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Request parsing and validation                         │
//! │  - JSON serialization/deserialization                     │
//! │  - CORS, compression, error handling                      │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (services/)                                │
//! │  - SiteSession, SiteCatalog, ActionController             │
//! │  - Card rendering                                         │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  RemoteGateway (HttpGateway)                              │
//! │  - Extraction, preview, analysis, download                │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::{create_router, create_router_with_limit};
pub use state::AppState;
