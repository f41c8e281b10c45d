//! Lifecycle status normalization
//!
//! Block-storage backends report volume and snapshot states as free-form
//! strings. Gauges can only carry numbers, so every status maps onto a fixed
//! code. Statuses the table does not know map to [`UNKNOWN_STATUS`] instead of
//! failing the pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Code published for any status outside the table
pub const UNKNOWN_STATUS: i64 = 99;

/// The kind of resource instance a status belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    Volume,
    Snapshot,
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKind::Volume => write!(f, "volume"),
            InstanceKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Map a lifecycle status onto its numeric code.
///
/// Attachment states only exist for volumes; a snapshot reporting one of them
/// is treated as unknown.
pub fn normalize(kind: InstanceKind, status: &str) -> i64 {
    match (kind, status) {
        (_, "available") => 0,
        (_, "error") => 1,
        (_, "creating") => 2,
        (_, "deleting") => 3,
        (InstanceKind::Volume, "in-use") => 4,
        (InstanceKind::Volume, "attaching") => 5,
        (InstanceKind::Volume, "detaching") => 6,
        (_, "error_deleting") => 7,
        (_, "maintenance") => 8,
        _ => UNKNOWN_STATUS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_codes() {
        let table = [
            ("available", 0),
            ("error", 1),
            ("creating", 2),
            ("deleting", 3),
            ("in-use", 4),
            ("attaching", 5),
            ("detaching", 6),
            ("error_deleting", 7),
            ("maintenance", 8),
        ];
        for (status, code) in table {
            assert_eq!(normalize(InstanceKind::Volume, status), code, "{}", status);
        }
    }

    #[test]
    fn test_snapshot_codes() {
        let table = [
            ("available", 0),
            ("error", 1),
            ("creating", 2),
            ("deleting", 3),
            ("error_deleting", 7),
            ("maintenance", 8),
        ];
        for (status, code) in table {
            assert_eq!(normalize(InstanceKind::Snapshot, status), code, "{}", status);
        }
    }

    #[test]
    fn test_attachment_states_unknown_for_snapshots() {
        for status in ["in-use", "attaching", "detaching"] {
            assert_eq!(normalize(InstanceKind::Snapshot, status), UNKNOWN_STATUS);
        }
    }

    #[test]
    fn test_unknown_statuses() {
        for status in ["", "reserved", "AVAILABLE", "backing-up", "in_use", " available"] {
            assert_eq!(normalize(InstanceKind::Volume, status), UNKNOWN_STATUS);
            assert_eq!(normalize(InstanceKind::Snapshot, status), UNKNOWN_STATUS);
        }
    }

    #[test]
    fn test_normalize_is_stable() {
        let first = normalize(InstanceKind::Volume, "detaching");
        for _ in 0..10 {
            assert_eq!(normalize(InstanceKind::Volume, "detaching"), first);
        }
    }
}
