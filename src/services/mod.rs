// SPDX-License-Identifier: MIT

//! Services module - backend relay and identity pipeline.

pub mod backend;
pub mod identity;

pub use backend::{BackendClient, IdentityUpsert, TokenTier};
pub use identity::{GoogleIdentityVerifier, IdentityAssertion, IdentityService, VerifyError};
