//! # Leadline
//!
//! A multi-tenant CRM backend for the lead lifecycle: tagging, bulk import, and
//! conversion of leads into customers. Usable both as a standalone binary and as a
//! library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! leadline = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use leadline::config::ServerConfig;
//! use leadline::dispatch::{Collaborators, Dispatcher};
//! use leadline::lifecycle::LeadEngine;
//! use leadline::server::{AppState, create_router};
//! use leadline::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = Arc::new(SqliteStore::new(config.db_path()).unwrap());
//! store.initialize().unwrap();
//!
//! let (dispatcher, _worker) =
//!     Dispatcher::spawn(store.clone(), Collaborators::default(), &config.dispatch);
//! let engine = Arc::new(LeadEngine::new(store.clone(), dispatcher, config.lifecycle));
//! let router = create_router(Arc::new(AppState::new(store, engine)));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `leadline` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod store;
pub mod types;
