//! # Site Explorer Backend
//!
//! UI host for archaeological site records extracted from documents or typed in by hand.
//!
//! This crate drives the site-card page: it normalizes user-entered coordinates, keeps the
//! loaded sites in a single in-memory catalog, and runs the per-site enrichment actions
//! (satellite preview, AI analysis, data download, map lookup) against a remote backend.
//! The page itself talks to the REST API exposed via Axum.
//!
//! ## Architecture
//!
//! - [`models`]: coordinates (decimal/DMS normalization) and site records
//! - [`services`]: site catalog, remote gateway, action controller, card renderer
//! - [`config`]: TOML + environment configuration
//! - [`http`]: Axum-based HTTP server and request handlers
//!
//! ## Data flow
//!
//! ```text
//! document / manual form
//!        │
//!        ▼
//! coordinate normalization ──► SiteCatalog::load ──► render_catalog
//!                                    │
//!                                    ▼
//!                       ActionController (per site, per action)
//!                                    │
//!                                    ▼
//!                             RemoteGateway call
//! ```

pub mod config;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
