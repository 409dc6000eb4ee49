//! Pending status reconciliation
//!
//! A device echoes a command's effect seconds after the command was sent.
//! Until then the status the client itself published is the baseline for the
//! next command, so quick successive commands build on each other instead of
//! on the stale report. The pending value is dropped when a report arrives or
//! after a fixed time to live, whichever comes first.

use crate::error::{DeviceError, DeviceResult};
use crate::models::DeviceStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default lifetime of a pending status
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct StatusSlots {
    confirmed: Option<DeviceStatus>,
    pending: Option<DeviceStatus>,
}

/// Single-slot store for the last confirmed and the pending status
///
/// At most one pending status and one expiry timer exist at a time; a new
/// pending status replaces the previous one and restarts the timer.
#[derive(Debug)]
pub struct PendingStatusTracker {
    ttl: Duration,
    slots: Arc<Mutex<StatusSlots>>,
    expiry: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PendingStatusTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Arc::new(Mutex::new(StatusSlots::default())),
            expiry: tokio::sync::Mutex::new(None),
        }
    }

    fn slots(&self) -> MutexGuard<'_, StatusSlots> {
        lock_slots(&self.slots)
    }

    /// Store `status` as pending and restart the expiry timer
    ///
    /// The previous timer is cancelled and awaited first so it cannot clear
    /// the new value.
    pub async fn set_pending(&self, status: DeviceStatus) {
        let mut expiry = self.expiry.lock().await;
        if let Some(previous) = expiry.take() {
            previous.abort();
            let _ = previous.await;
        }

        self.slots().pending = Some(status);

        let slots = Arc::clone(&self.slots);
        let ttl = self.ttl;
        *expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if lock_slots(&slots).pending.take().is_some() {
                debug!("Pending status expired after {:?}", ttl);
            }
        }));
    }

    /// Adopt a status reported by the device, dropping any pending one
    pub fn confirm(&self, status: DeviceStatus) {
        let mut slots = self.slots();
        slots.pending = None;
        slots.confirmed = Some(status);
    }

    /// Drop the pending status; does nothing if there is none
    pub fn clear(&self) {
        self.slots().pending = None;
    }

    /// Status the next command should be based on: pending, else confirmed
    pub fn baseline(&self) -> DeviceResult<DeviceStatus> {
        let slots = self.slots();
        slots
            .pending
            .as_ref()
            .or(slots.confirmed.as_ref())
            .cloned()
            .ok_or(DeviceError::NoStatus)
    }

    /// Last status reported by the device
    pub fn last_status(&self) -> Option<DeviceStatus> {
        self.slots().confirmed.clone()
    }

    pub fn pending(&self) -> Option<DeviceStatus> {
        self.slots().pending.clone()
    }
}

impl Default for PendingStatusTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_TTL)
    }
}

impl Drop for PendingStatusTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.expiry.get_mut().take() {
            handle.abort();
        }
    }
}

fn lock_slots(slots: &Mutex<StatusSlots>) -> MutexGuard<'_, StatusSlots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_status;

    #[test]
    fn test_no_baseline_without_status() {
        let tracker = PendingStatusTracker::default();
        assert!(matches!(tracker.baseline(), Err(DeviceError::NoStatus)));
        assert!(tracker.last_status().is_none());
    }

    #[test]
    fn test_confirmed_status_is_baseline() {
        let tracker = PendingStatusTracker::default();
        tracker.confirm(sample_status());
        assert_eq!(tracker.baseline().unwrap(), sample_status());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_wins_until_expiry() {
        let tracker = PendingStatusTracker::default();
        tracker.confirm(sample_status());

        let pending = DeviceStatus {
            system_on: false,
            ..sample_status()
        };
        tracker.set_pending(pending.clone()).await;
        assert_eq!(tracker.baseline().unwrap(), pending);

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(tracker.baseline().unwrap(), pending);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(tracker.baseline().unwrap(), sample_status());
        assert!(tracker.pending().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_pending_restarts_timer() {
        let tracker = PendingStatusTracker::default();
        tracker.confirm(sample_status());

        let first = DeviceStatus {
            plant_days: 1,
            ..sample_status()
        };
        let second = DeviceStatus {
            plant_days: 2,
            ..sample_status()
        };

        tracker.set_pending(first).await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        tracker.set_pending(second.clone()).await;

        // The first timer would have fired here
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(tracker.baseline().unwrap(), second);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(tracker.baseline().unwrap(), sample_status());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_clears_pending() {
        let tracker = PendingStatusTracker::default();
        tracker
            .set_pending(DeviceStatus {
                light_mode: 1,
                ..sample_status()
            })
            .await;

        let report = DeviceStatus {
            light_mode: 0,
            plant_days: 99,
            ..sample_status()
        };
        tracker.confirm(report.clone());

        assert!(tracker.pending().is_none());
        assert_eq!(tracker.baseline().unwrap(), report);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let tracker = PendingStatusTracker::default();
        tracker.clear();
        tracker.clear();
        assert!(tracker.pending().is_none());
    }
}
