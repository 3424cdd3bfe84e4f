// MIT License - Copyright (c) 2026 Peter Wright
// Zone state model

use chrono::{DateTime, Utc};

/// Live state of one zone, lazily created on the first notification that
/// references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneState {
    pub number: u16,
    pub name: Option<String>,
    pub is_open: bool,
    /// Partitions this zone belongs to.
    pub partitions: Vec<u8>,
    pub last_updated: DateTime<Utc>,
}

impl ZoneState {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            name: None,
            is_open: false,
            partitions: vec![default_partition(number)],
            last_updated: Utc::now(),
        }
    }

    /// Display name: programmed label, or a generated fallback.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("Zone {}", self.number))
    }
}

/// Default partition association for a zone that has not reported its
/// assignments yet: zones are banked in groups of 64 per partition.
pub fn default_partition(zone: u16) -> u8 {
    (1 + zone.saturating_sub(1) / 64).min(u8::MAX as u16) as u8
}
