// SPDX-License-Identifier: MIT

//! QuakeWatch Gateway: session and data gateway for the earthquake
//! monitoring dashboard.
//!
//! This crate authenticates dashboard users against Google, exchanges their
//! identity with the platform backend, and relays authorized data requests
//! using server-held credential tiers. It also keeps a live cache of the
//! readings and earthquakes streams fed over websocket push or timed polls.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod sync;

use config::Config;
use services::{BackendClient, IdentityService};
use std::sync::Arc;
use sync::{EventCache, LiveSync};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub backend: BackendClient,
    pub identity: IdentityService,
    pub cache: Arc<EventCache>,
    pub live: LiveSync,
}
