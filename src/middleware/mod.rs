// SPDX-License-Identifier: MIT

//! Middleware modules (session, security headers).

pub mod security;
pub mod session;

pub use session::require_session;
