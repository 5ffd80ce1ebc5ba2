//! Holding keyboard reports until the host listens.
//!
//! A freshly connected host only accepts notifications once the link is
//! encrypted and the input report CCCD is enabled, either restored from
//! the bond or written again by the host.  Until then a notification
//! fails; the report stays at the head of the queue and is retried, so
//! a wake keystroke still arrives and a press is never overtaken by its
//! release.

use crate::config::{REPORT_HOLD_MS, REPORT_RETRY_MS};
use crate::hid::KeyboardReport;

/// What to do after a notification failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Retry {
    /// Try again after this many ms, or earlier once the host subscribes.
    After(u64),
    /// The host never subscribed in time.
    GiveUp,
}

/// A report taken off the queue and not yet delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingReport {
    report: KeyboardReport,
    queued_at_ms: u64,
}

impl PendingReport {
    pub fn new(report: KeyboardReport, now_ms: u64) -> Self {
        Self {
            report,
            queued_at_ms: now_ms,
        }
    }

    pub fn report(&self) -> &KeyboardReport {
        &self.report
    }

    pub fn after_failure(&self, now_ms: u64) -> Retry {
        let deadline = self.queued_at_ms + REPORT_HOLD_MS;
        if now_ms >= deadline {
            Retry::GiveUp
        } else {
            Retry::After(REPORT_RETRY_MS.min(deadline - now_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_waits_for_subscription_then_expires() {
        let pending = PendingReport::new(KeyboardReport::press(0x2C), 1_000);
        assert_eq!(pending.after_failure(1_000), Retry::After(REPORT_RETRY_MS));
        assert_eq!(pending.after_failure(5_980), Retry::After(20));
        assert_eq!(pending.after_failure(6_000), Retry::GiveUp);
        assert_eq!(pending.report(), &KeyboardReport::press(0x2C));
    }

    #[test]
    fn wake_keystroke_outlives_reconnect_handshake() {
        // Encryption plus the CCCD restore take a few connection events.
        let pending = PendingReport::new(KeyboardReport::press(0x2C), 0);
        let mut t = 0;
        while t < 1_500 {
            match pending.after_failure(t) {
                Retry::After(ms) => t += ms,
                Retry::GiveUp => panic!("dropped at {} ms", t),
            }
        }
    }
}
