//! Device snapshot diffing for Mountguard.
//!
//! The registry retains the last device snapshot reported by the authority
//! and computes arrival/departure diffs against each new one. Identity is
//! per [`UsbDevice::identity`] (serial, else name+vendor+product), so the
//! same physical device reported by two overlapping poll kinds diffs to
//! nothing the second time, which is what prevents double-counted arrivals.

use chrono::{DateTime, Utc};
use guard_protocol_types::{DeviceIdentity, EventStatus, SecurityEvent, UsbDevice};
use std::collections::HashSet;
use tracing::debug;

/// Action string recorded for a locally detected arrival.
pub const ACTION_DEVICE_INSERTED: &str = "Device Inserted";

/// Action string recorded for a locally detected departure.
pub const ACTION_DEVICE_REMOVED: &str = "Device Removed";

/// Outcome of applying one snapshot: which identities entered and left.
///
/// Devices present in both snapshots produce nothing, even when their
/// attributes changed; attribute churn is not an arrival.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiff {
    pub arrivals: Vec<UsbDevice>,
    pub departures: Vec<UsbDevice>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty() && self.departures.is_empty()
    }
}

/// Holds the current device set and diffs each incoming snapshot against it.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    current: Vec<UsbDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `snapshot` against the retained set, then replace it wholesale.
    ///
    /// Duplicate identities inside one incoming snapshot are collapsed
    /// (first occurrence wins) so identity uniquely determines a device.
    /// The replacement happens only after the diff is computed, so the diff
    /// always reads a consistent old/new pair.
    pub fn apply_snapshot(&mut self, snapshot: Vec<UsbDevice>) -> SnapshotDiff {
        let incoming = dedup_by_identity(snapshot);

        let new_ids: HashSet<DeviceIdentity> = incoming.iter().map(UsbDevice::identity).collect();
        let old_ids: HashSet<DeviceIdentity> = self.current.iter().map(UsbDevice::identity).collect();

        let arrivals: Vec<UsbDevice> = incoming
            .iter()
            .filter(|d| !old_ids.contains(&d.identity()))
            .cloned()
            .collect();
        let departures: Vec<UsbDevice> = self
            .current
            .iter()
            .filter(|d| !new_ids.contains(&d.identity()))
            .cloned()
            .collect();

        if !arrivals.is_empty() || !departures.is_empty() {
            debug!(
                arrivals = arrivals.len(),
                departures = departures.len(),
                total = incoming.len(),
                "Device snapshot changed"
            );
        }

        self.current = incoming;
        SnapshotDiff {
            arrivals,
            departures,
        }
    }

    /// The retained snapshot, in the order the authority reported it.
    pub fn devices(&self) -> &[UsbDevice] {
        &self.current
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

fn dedup_by_identity(snapshot: Vec<UsbDevice>) -> Vec<UsbDevice> {
    let mut seen = HashSet::new();
    snapshot
        .into_iter()
        .filter(|d| seen.insert(d.identity()))
        .collect()
}

/// Locally synthesized event for a device entering the snapshot.
///
/// New devices are mount-blocked until the operator authorizes access, so
/// the arrival event carries `mount_blocked`.
pub fn arrival_event(device: &UsbDevice, now: DateTime<Utc>) -> SecurityEvent {
    SecurityEvent::new(
        now,
        ACTION_DEVICE_INSERTED,
        Some(device.display_name().to_string()),
        EventStatus::MountBlocked,
    )
}

/// Locally synthesized event for a device leaving the snapshot.
pub fn departure_event(device: &UsbDevice, now: DateTime<Utc>) -> SecurityEvent {
    SecurityEvent::new(
        now,
        ACTION_DEVICE_REMOVED,
        Some(device.display_name().to_string()),
        EventStatus::Disconnected,
    )
}
