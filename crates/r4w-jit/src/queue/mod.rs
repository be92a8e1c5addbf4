//! # Just-In-Time TX Queue
//!
//! Admission control for downlinks and beacons sharing one radio. A frame is
//! accepted only if, once queued, it can still be sent on time and its
//! reserved window overlaps no other queued frame. The consumer side polls
//! [`JitQueue::peek`] and takes frames out with [`JitQueue::dequeue`] shortly
//! before they are due.
//!
//! ## Admission
//!
//! ```text
//!   enqueue(now, frame)
//!     ├─ time on air unknown ............................ Invalid
//!     ├─ queue full ..................................... Full
//!     ├─ class C: pick first free slot (asap)
//!     ├─ count_us - now <= start + margin + jit ......... TooLate
//!     ├─ class A/B: count_us - now > advance window ..... TooEarly
//!     ├─ window overlaps a queued frame ................. CollisionPacket / CollisionBeacon
//!     └─ append ......................................... Ok(count_us)
//! ```
//!
//! Class A and class C downlinks may use the guard interval in front of a
//! queued beacon; class B downlinks and beacons may not.
//!
//! ## Example
//!
//! ```rust
//! use r4w_jit::airtime::{Bandwidth, CodeRate, TxPacket};
//! use r4w_jit::{Frame, FrameClass, JitConfig, JitQueue};
//!
//! let queue = JitQueue::new(JitConfig::default()).unwrap();
//! let pkt = TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0u8; 12]);
//!
//! let now = 0;
//! queue.enqueue(now, Frame::class_a(2_000_000, pkt)).unwrap();
//!
//! // not due yet
//! assert_eq!(queue.peek(now).unwrap(), None);
//!
//! // 20 ms before TX time
//! let idx = queue.peek(1_980_000).unwrap().unwrap();
//! let frame = queue.dequeue(idx).unwrap();
//! assert_eq!(frame.class, FrameClass::DownlinkA);
//! assert_eq!(frame.count_us, 2_000_000);
//! ```

mod asap;
pub(crate) mod store;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::airtime::Airtime;
use crate::collision::Window;
use crate::config::{ConfigError, JitConfig};
use crate::stats::JitStats;
use crate::timing::{offset, CountUs};
use crate::types::{Dequeued, Frame, FrameClass, JitError, JitResult};

use self::store::{Entry, EntryStore};

/// Bounded, collision-free TX schedule for one radio.
///
/// All operations take the same lock for their whole duration and cost at
/// most a few passes over `capacity` entries. The queue can be shared
/// between a producer and a consumer thread behind an `Arc`.
#[derive(Debug)]
pub struct JitQueue<P> {
    store: Mutex<EntryStore<P>>,
    config: JitConfig,
    stats: JitStats,
}

impl<P> JitQueue<P> {
    /// Create an empty queue after validating `config`.
    pub fn new(config: JitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: Mutex::new(EntryStore::new(config.capacity)),
            config,
            stats: JitStats::new(),
        })
    }

    /// Default timings with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        Self::new(JitConfig {
            capacity,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    pub fn stats(&self) -> &JitStats {
        &self.stats
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Drop every queued frame. Cleared frames are counted as dropped.
    pub fn reset(&self) {
        let mut store = self.store.lock();
        for entry in store.entries() {
            self.stats.record_dropped(entry.class);
        }
        let cleared = store.len();
        store.clear();
        debug!(cleared, "JIT queue reset");
    }

    pub fn is_full(&self) -> bool {
        self.store.lock().is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn beacon_count(&self) -> usize {
        self.store.lock().beacon_count()
    }

    /// Admit `frame` into the schedule.
    ///
    /// Returns the TX time the frame was scheduled at: the requested one, or
    /// the slot picked for a class C downlink.
    pub fn enqueue(&self, now: CountUs, frame: Frame<P>) -> JitResult<CountUs>
    where
        P: Airtime,
    {
        let class = frame.class;
        let result = self.try_enqueue(now, frame);
        match result {
            Ok(count_us) => {
                self.stats.record_accepted();
                debug!(count_us, now, %class, "enqueued frame");
                if tracing::enabled!(tracing::Level::TRACE) {
                    self.log_contents(false);
                }
            }
            Err(err) => self.stats.record_rejected(err),
        }
        result
    }

    fn try_enqueue(&self, now: CountUs, frame: Frame<P>) -> JitResult<CountUs>
    where
        P: Airtime,
    {
        let Frame {
            class,
            count_us,
            payload,
        } = frame;

        let post_delay = match class {
            FrameClass::Beacon => self.config.beacon_reserved_us,
            _ => payload.time_on_air_us().ok_or_else(|| {
                debug!(%class, "rejected frame, cannot compute time on air");
                JitError::Invalid
            })?,
        };
        let pre_delay = self.config.pre_delay_us(class);

        let mut store = self.store.lock();

        if store.is_full() {
            debug!(capacity = store.capacity(), "rejected frame, JIT queue is full");
            return Err(JitError::Full);
        }

        let count_us = if class.is_asap() {
            asap::find_slot(&store, now, pre_delay, post_delay, &self.config)
        } else {
            count_us
        };

        // must reach the radio before TX start, with margin
        let ahead = offset(count_us, now);
        if ahead <= self.config.too_late_threshold_us() {
            debug!(now, count_us, %class, "rejected frame, already too late to send it");
            return Err(JitError::TooLate);
        }

        // class A/B timestamps this far ahead are bogus
        if class.checks_advance() && ahead > self.config.max_advance_delay_us() {
            debug!(now, count_us, %class, "rejected frame, timestamp too far in advance");
            return Err(JitError::TooEarly);
        }

        let wanted = Window::new(count_us, pre_delay, post_delay);
        for queued in store.entries() {
            let target_pre = if class.ignores_beacon_guard() && queued.class.is_beacon() {
                self.config.tx_start_delay_us
            } else {
                queued.pre_delay
            };
            let target = Window::new(queued.count_us, target_pre, queued.post_delay);

            if wanted.collides(&target, self.config.tx_margin_delay_us) {
                if queued.class.is_beacon() {
                    if class.is_beacon() {
                        // expected with beacon pre-scheduling
                        trace!(count_us, queued = queued.count_us, "beacon collides with queued beacon");
                    } else {
                        debug!(count_us, queued = queued.count_us, %class, "rejected frame, collision with beacon");
                    }
                    return Err(JitError::CollisionBeacon);
                }
                debug!(count_us, queued = queued.count_us, %class, "rejected frame, collision with packet");
                return Err(JitError::CollisionPacket);
            }
        }

        store.push(Entry {
            count_us,
            class,
            pre_delay,
            post_delay,
            payload,
        })?;

        Ok(count_us)
    }

    /// Remove and return the frame at `index`, as reported by [`peek`](Self::peek).
    pub fn dequeue(&self, index: usize) -> JitResult<Dequeued<P>> {
        if index >= self.capacity() {
            debug!(index, "dequeue index out of range");
            return Err(JitError::Invalid);
        }

        let entry = {
            let mut store = self.store.lock();
            if store.is_empty() {
                return Err(JitError::Empty);
            }
            self.remove(&mut store, index)?
        };

        self.stats.record_dequeued();
        debug!(count_us = entry.count_us, index, class = %entry.class, "dequeued frame");
        if tracing::enabled!(tracing::Level::TRACE) {
            self.log_contents(false);
        }

        Ok(Dequeued {
            class: entry.class,
            count_us: entry.count_us,
            payload: entry.payload,
        })
    }

    /// Find the frame to send next.
    ///
    /// Drops frames whose slot has been missed, then returns the index of
    /// the frame closest in time if it is due within the JIT delay, `None`
    /// otherwise.
    pub fn peek(&self, now: CountUs) -> JitResult<Option<usize>> {
        let mut store = self.store.lock();
        self.peek_locked(&mut store, now)
    }

    /// [`peek`](Self::peek) and [`dequeue`](Self::dequeue) under a single
    /// lock, so the index cannot be invalidated in between.
    pub fn take_due(&self, now: CountUs) -> JitResult<Option<Dequeued<P>>> {
        let entry = {
            let mut store = self.store.lock();
            match self.peek_locked(&mut store, now)? {
                Some(index) => self.remove(&mut store, index)?,
                None => return Ok(None),
            }
        };

        self.stats.record_dequeued();
        debug!(count_us = entry.count_us, class = %entry.class, "took due frame");

        Ok(Some(Dequeued {
            class: entry.class,
            count_us: entry.count_us,
            payload: entry.payload,
        }))
    }

    fn peek_locked(&self, store: &mut EntryStore<P>, now: CountUs) -> JitResult<Option<usize>> {
        if store.is_empty() {
            return Err(JitError::Empty);
        }

        self.drop_stale(store, now)?;

        // nearest in time wins, first one on ties
        let next = store
            .entries()
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| offset(e.count_us, now))
            .map(|(i, e)| (i, e.count_us));

        match next {
            Some((index, count_us)) if offset(count_us, now) < self.config.tx_jit_delay_us => {
                debug!(count_us, index, "peek frame due");
                Ok(Some(index))
            }
            _ => Ok(None),
        }
    }

    /// Drop every frame whose TX time has already gone by.
    ///
    /// A missed timestamp wraps around to a huge forward distance, beyond
    /// anything enqueue accepts.
    fn drop_stale(&self, store: &mut EntryStore<P>, now: CountUs) -> JitResult<()> {
        let max_advance = self.config.max_advance_delay_us();
        let mut i = 0;
        while i < store.len() {
            let count_us = store.entries()[i].count_us;
            if offset(count_us, now) < max_advance {
                i += 1;
                continue;
            }

            // the last entry moves into slot i, which is checked next
            let dropped = self.remove(store, i)?;
            if dropped.class.is_beacon() {
                warn!(now, count_us, "beacon dropped, TX slot missed");
            } else {
                warn!(now, count_us, class = %dropped.class, "packet dropped, TX slot missed");
            }
            self.stats.record_dropped(dropped.class);
        }
        Ok(())
    }

    fn remove(&self, store: &mut EntryStore<P>, index: usize) -> JitResult<Entry<P>> {
        let result = store.swap_remove(index);
        if let Err(JitError::Internal) = result {
            error!(index, len = store.len(), "JIT queue beacon counter out of sync");
            self.stats.record_rejected(JitError::Internal);
        }
        result
    }

    /// Copy of the queue layout for diagnostics.
    ///
    /// With `show_all`, unoccupied slots up to `capacity` are listed too.
    pub fn snapshot(&self, show_all: bool) -> QueueSnapshot {
        let store = self.store.lock();

        let mut nodes: Vec<NodeInfo> = store
            .entries()
            .iter()
            .enumerate()
            .map(|(index, e)| NodeInfo {
                index,
                slot: Some((e.count_us, e.class)),
            })
            .collect();
        if show_all {
            nodes.extend((store.len()..store.capacity()).map(|index| NodeInfo { index, slot: None }));
        }

        QueueSnapshot {
            len: store.len(),
            beacon_count: store.beacon_count(),
            capacity: store.capacity(),
            nodes,
        }
    }

    /// Emit the queue layout at debug level.
    pub fn log_contents(&self, show_all: bool) {
        let snapshot = self.snapshot(show_all);
        if snapshot.len == 0 {
            debug!("JIT queue is empty");
            return;
        }

        debug!(packets = snapshot.len, beacons = snapshot.beacon_count, "JIT queue contents");
        for node in &snapshot.nodes {
            match node.slot {
                Some((count_us, class)) => debug!(index = node.index, count_us, %class, "node"),
                None => debug!(index = node.index, "node (empty)"),
            }
        }
    }
}

impl<P> Default for JitQueue<P> {
    fn default() -> Self {
        Self {
            store: Mutex::new(EntryStore::new(JitConfig::default().capacity)),
            config: JitConfig::default(),
            stats: JitStats::new(),
        }
    }
}

/// One slot of a [`QueueSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub index: usize,
    /// TX time and class, `None` for an unoccupied slot
    pub slot: Option<(CountUs, FrameClass)>,
}

/// Point-in-time view of the queue, without payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub len: usize,
    pub beacon_count: usize,
    pub capacity: usize,
    pub nodes: Vec<NodeInfo>,
}

impl std::fmt::Display for QueueSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.len == 0 && self.nodes.is_empty() {
            return write!(f, "JIT queue is empty");
        }
        writeln!(
            f,
            "JIT queue contains {} packets ({} beacons), capacity {}:",
            self.len, self.beacon_count, self.capacity
        )?;
        for node in &self.nodes {
            match node.slot {
                Some((count_us, class)) => {
                    writeln!(f, " - node[{}]: count_us={} - type={}", node.index, count_us, class)?
                }
                None => writeln!(f, " - node[{}]: empty", node.index)?,
            }
        }
        Ok(())
    }
}
