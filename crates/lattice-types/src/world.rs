//! World descriptors and summaries exchanged with the REST layer.
//!
//! [`WorldDescriptor`] is the lenient restoration input: every field is
//! optional and the world constructor decides what to keep. [`WorldSummary`]
//! is the read-only listing projection; its JSON field names follow the
//! browser client (`epoch`, `isRunning`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::WorldId;

/// Serialized description of a world used for creation and restoration.
///
/// Absent fields fall back to defaults. Invalid combinations are not an
/// error here; the world constructor downgrades them to a stopped world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldDescriptor {
    /// Explicit identifier; a fresh one is generated when absent.
    #[serde(default)]
    pub id: Option<WorldId>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Grid width (columns). Ignored unless positive.
    #[serde(default, rename = "x")]
    pub width: Option<u32>,
    /// Grid height (rows). Ignored unless positive.
    #[serde(default, rename = "y")]
    pub height: Option<u32>,
    /// Whether the world should be running after restoration.
    #[serde(default, rename = "isRunning")]
    pub running: Option<bool>,
    /// Generation counter to resume from. Ignored unless positive.
    #[serde(default, rename = "epoch")]
    pub generation: Option<u64>,
    /// Grid rows, `height` rows of `width` cells each.
    #[serde(default, rename = "currentState")]
    pub rows: Option<Vec<Vec<bool>>>,
}

impl WorldDescriptor {
    /// Descriptor for a fresh, empty world with the given name and size.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: Some(name.into()),
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    /// Request that the world start running once restored.
    #[must_use]
    pub fn running(mut self, running: bool) -> Self {
        self.running = Some(running);
        self
    }

    /// Attach explicit grid rows.
    #[must_use]
    pub fn with_rows(mut self, rows: Vec<Vec<bool>>) -> Self {
        self.rows = Some(rows);
        self
    }
}

/// Read-only projection of a world for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSummary {
    /// World identifier.
    pub id: WorldId,
    /// Display name.
    pub name: String,
    /// Grid width.
    #[serde(rename = "x")]
    pub width: u32,
    /// Grid height.
    #[serde(rename = "y")]
    pub height: u32,
    /// Generation counter, serialized as a decimal string (u64 exceeds
    /// JavaScript's safe integer range).
    #[serde(rename = "epoch", with = "u64_string")]
    pub generation: u64,
    /// Whether the scheduler is advancing this world.
    #[serde(rename = "isRunning")]
    pub running: bool,
    /// Number of alive cells in the current grid.
    #[serde(rename = "aliveCells")]
    pub alive_cells: u64,
    /// When the world was created in this process.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_generation_as_string() {
        let summary = WorldSummary {
            id: WorldId::new(),
            name: String::from("glider field"),
            width: 8,
            height: 4,
            generation: u64::MAX,
            running: true,
            alive_cells: 5,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["epoch"], "18446744073709551615");
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["x"], 8);
        assert_eq!(json["y"], 4);

        let back: WorldSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn descriptor_fields_are_optional() {
        let descriptor: WorldDescriptor = serde_json::from_str(r#"{"name":"a","x":3}"#).unwrap();
        assert_eq!(descriptor.name.as_deref(), Some("a"));
        assert_eq!(descriptor.width, Some(3));
        assert_eq!(descriptor.height, None);
        assert_eq!(descriptor.rows, None);
    }

    #[test]
    fn builder_sets_running_and_rows() {
        let descriptor = WorldDescriptor::new("b", 2, 1)
            .running(true)
            .with_rows(vec![vec![true, false]]);
        assert_eq!(descriptor.running, Some(true));
        assert_eq!(descriptor.rows, Some(vec![vec![true, false]]));
    }
}
