//! # JIT Queue Statistics
//!
//! Lock-free counters describing what happened to every frame offered to
//! the queue. Stale drops never surface as errors to the producer, so this
//! is where they become visible.
//!
//! ## Example
//!
//! ```rust
//! use r4w_jit::stats::JitStats;
//! use r4w_jit::JitError;
//!
//! let stats = JitStats::new();
//! stats.record_accepted();
//! stats.record_rejected(JitError::CollisionBeacon);
//!
//! let snap = stats.snapshot();
//! assert_eq!(snap.accepted, 1);
//! assert_eq!(snap.rejected_collision_beacon, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{FrameClass, JitError};

/// Lock-free JIT queue counters.
///
/// All operations are non-blocking.
#[derive(Debug, Default)]
pub struct JitStats {
    accepted: AtomicU64,
    rejected_too_late: AtomicU64,
    rejected_too_early: AtomicU64,
    rejected_full: AtomicU64,
    rejected_collision_packet: AtomicU64,
    rejected_collision_beacon: AtomicU64,
    rejected_invalid: AtomicU64,
    /// Frames handed to the transmit path
    dequeued: AtomicU64,
    /// Frames dropped unsent: slot missed, or cleared by a reset
    dropped: AtomicU64,
    beacons_dropped: AtomicU64,
    internal_errors: AtomicU64,
}

impl JitStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a refused operation under its reason.
    #[inline]
    pub fn record_rejected(&self, err: JitError) {
        let counter = match err {
            JitError::TooLate => &self.rejected_too_late,
            JitError::TooEarly => &self.rejected_too_early,
            JitError::Full => &self.rejected_full,
            JitError::CollisionPacket => &self.rejected_collision_packet,
            JitError::CollisionBeacon => &self.rejected_collision_beacon,
            JitError::Invalid => &self.rejected_invalid,
            JitError::Internal => &self.internal_errors,
            // not a rejection
            JitError::Empty => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self, class: FrameClass) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        if class.is_beacon() {
            self.beacons_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all statistics.
    pub fn snapshot(&self) -> JitStatsSnapshot {
        JitStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_too_late: self.rejected_too_late.load(Ordering::Relaxed),
            rejected_too_early: self.rejected_too_early.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            rejected_collision_packet: self.rejected_collision_packet.load(Ordering::Relaxed),
            rejected_collision_beacon: self.rejected_collision_beacon.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            beacons_dropped: self.beacons_dropped.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.accepted,
            &self.rejected_too_late,
            &self.rejected_too_early,
            &self.rejected_full,
            &self.rejected_collision_packet,
            &self.rejected_collision_beacon,
            &self.rejected_invalid,
            &self.dequeued,
            &self.dropped,
            &self.beacons_dropped,
            &self.internal_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of JIT queue statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitStatsSnapshot {
    pub accepted: u64,
    pub rejected_too_late: u64,
    pub rejected_too_early: u64,
    pub rejected_full: u64,
    pub rejected_collision_packet: u64,
    pub rejected_collision_beacon: u64,
    pub rejected_invalid: u64,
    pub dequeued: u64,
    pub dropped: u64,
    pub beacons_dropped: u64,
    pub internal_errors: u64,
}

impl JitStatsSnapshot {
    /// Total enqueue attempts that were refused.
    pub fn rejected(&self) -> u64 {
        self.rejected_too_late
            + self.rejected_too_early
            + self.rejected_full
            + self.rejected_collision_packet
            + self.rejected_collision_beacon
            + self.rejected_invalid
    }

    /// Fraction of accepted frames that were later dropped unsent.
    pub fn drop_rate(&self) -> f64 {
        if self.accepted == 0 {
            0.0
        } else {
            self.dropped as f64 / self.accepted as f64
        }
    }
}

impl std::fmt::Display for JitStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "JIT Queue Statistics:")?;
        writeln!(f, "  Accepted:          {}", self.accepted)?;
        writeln!(f, "  Dequeued:          {}", self.dequeued)?;
        writeln!(
            f,
            "  Dropped:           {} ({} beacons)",
            self.dropped, self.beacons_dropped
        )?;
        writeln!(f, "  Rejected:          {}", self.rejected())?;
        writeln!(f, "    too late:        {}", self.rejected_too_late)?;
        writeln!(f, "    too early:       {}", self.rejected_too_early)?;
        writeln!(f, "    full:            {}", self.rejected_full)?;
        writeln!(f, "    packet overlap:  {}", self.rejected_collision_packet)?;
        writeln!(f, "    beacon overlap:  {}", self.rejected_collision_beacon)?;
        writeln!(f, "    invalid:         {}", self.rejected_invalid)?;
        write!(f, "  Internal errors:   {}", self.internal_errors)
    }
}
