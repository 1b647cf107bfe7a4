// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod events;
pub mod user;

pub use events::{Earthquake, EarthquakesSnapshot, Reading, ReadingsSnapshot};
pub use user::{BackendUser, Pagination, Role};
