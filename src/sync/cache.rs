// SPDX-License-Identifier: MIT

//! Keyed cache for the two live event streams.
//!
//! Incremental pushes prepend into the event sequence and never touch the
//! auxiliary scalar fields; those are replaced only by full re-fetches.
//! Events are applied in receipt order with no deduplication by id.

use crate::models::{Earthquake, EarthquakesSnapshot, Reading, ReadingsSnapshot};
use dashmap::DashMap;

/// Names of the two live streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKey {
    Readings,
    Earthquakes,
}

impl StreamKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKey::Readings => "readings",
            StreamKey::Earthquakes => "earthquakes",
        }
    }
}

enum StreamEntry {
    Readings { snapshot: ReadingsSnapshot, stale: bool },
    Earthquakes { snapshot: EarthquakesSnapshot, stale: bool },
}

/// Shared cache holding the `readings` and `earthquakes` entries.
///
/// Safe to share between the push-channel task and the route handlers.
pub struct EventCache {
    entries: DashMap<StreamKey, StreamEntry>,
}

impl EventCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Prepend a pushed reading. A no-op until the first full fetch has
    /// populated the entry, matching the consumer-side contract.
    pub fn prepend_reading(&self, reading: Reading) {
        if let Some(mut entry) = self.entries.get_mut(&StreamKey::Readings) {
            if let StreamEntry::Readings { snapshot, .. } = entry.value_mut() {
                snapshot.data.insert(0, reading);
            }
        }
    }

    /// Prepend a pushed earthquake event.
    pub fn prepend_earthquake(&self, earthquake: Earthquake) {
        if let Some(mut entry) = self.entries.get_mut(&StreamKey::Earthquakes) {
            if let StreamEntry::Earthquakes { snapshot, .. } = entry.value_mut() {
                snapshot.data.insert(0, earthquake);
            }
        }
    }

    /// Store a full readings fetch, replacing events and scalars and
    /// clearing the stale mark.
    pub fn replace_readings(&self, snapshot: ReadingsSnapshot) {
        self.entries.insert(
            StreamKey::Readings,
            StreamEntry::Readings {
                snapshot,
                stale: false,
            },
        );
    }

    /// Store a full earthquakes fetch.
    pub fn replace_earthquakes(&self, snapshot: EarthquakesSnapshot) {
        self.entries.insert(
            StreamKey::Earthquakes,
            StreamEntry::Earthquakes {
                snapshot,
                stale: false,
            },
        );
    }

    pub fn readings(&self) -> Option<ReadingsSnapshot> {
        self.entries.get(&StreamKey::Readings).map(|entry| {
            match entry.value() {
                StreamEntry::Readings { snapshot, .. } => snapshot.clone(),
                // Keys and variants are inserted pairwise above.
                StreamEntry::Earthquakes { .. } => unreachable!(),
            }
        })
    }

    pub fn earthquakes(&self) -> Option<EarthquakesSnapshot> {
        self.entries.get(&StreamKey::Earthquakes).map(|entry| {
            match entry.value() {
                StreamEntry::Earthquakes { snapshot, .. } => snapshot.clone(),
                StreamEntry::Readings { .. } => unreachable!(),
            }
        })
    }

    /// Mark a stream stale so the next read triggers a full re-fetch.
    pub fn mark_stale(&self, key: StreamKey) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            match entry.value_mut() {
                StreamEntry::Readings { stale, .. } => *stale = true,
                StreamEntry::Earthquakes { stale, .. } => *stale = true,
            }
        }
    }

    /// Whether a read of this stream must go to the backend first.
    pub fn needs_fetch(&self, key: StreamKey) -> bool {
        match self.entries.get(&key) {
            None => true,
            Some(entry) => match entry.value() {
                StreamEntry::Readings { stale, .. } => *stale,
                StreamEntry::Earthquakes { stale, .. } => *stale,
            },
        }
    }
}

impl Default for EventCache {
    fn default() -> Self {
        Self::new()
    }
}
