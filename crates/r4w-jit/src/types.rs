//! Core types shared by the queue, the dispatcher and callers.

use serde::{Deserialize, Serialize};

use crate::timing::CountUs;

/// Result type for JIT queue operations
pub type JitResult<T> = Result<T, JitError>;

/// Reasons a JIT queue operation can be refused.
///
/// Every variant maps onto a packet forwarder status code (see
/// [`JitError::code`]); `Ok(_)` stands for status `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum JitError {
    #[error("too late to send this packet")]
    TooLate,

    #[error("too early to queue this packet")]
    TooEarly,

    #[error("downlink queue is full")]
    Full,

    #[error("downlink queue is empty")]
    Empty,

    #[error("a packet is already enqueued for this timeframe")]
    CollisionPacket,

    #[error("a beacon is planned for this timeframe")]
    CollisionBeacon,

    #[error("packet is invalid")]
    Invalid,

    #[error("internal queue bookkeeping error")]
    Internal,
}

impl JitError {
    /// Numeric status as reported by the packet forwarder (`OK` is 0).
    pub const fn code(&self) -> u8 {
        match self {
            JitError::TooLate => 1,
            JitError::TooEarly => 2,
            JitError::Full => 3,
            JitError::Empty => 4,
            JitError::CollisionPacket => 5,
            JitError::CollisionBeacon => 6,
            JitError::Invalid => 10,
            JitError::Internal => 11,
        }
    }

    /// Upper-case name used in TX acknowledgements.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JitError::TooLate => "TOO_LATE",
            JitError::TooEarly => "TOO_EARLY",
            JitError::Full => "FULL",
            JitError::Empty => "EMPTY",
            JitError::CollisionPacket => "COLLISION_PACKET",
            JitError::CollisionBeacon => "COLLISION_BEACON",
            JitError::Invalid => "INVALID",
            JitError::Internal => "INTERNAL",
        }
    }

    pub const fn is_collision(&self) -> bool {
        matches!(self, JitError::CollisionPacket | JitError::CollisionBeacon)
    }
}

/// Kind of frame held by the queue.
///
/// The class drives the reserved window around the frame and which
/// admission checks apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameClass {
    /// Class A downlink, answers an uplink in RX1/RX2.
    DownlinkA,
    /// Class B downlink, lands in a ping slot.
    DownlinkB,
    /// Class C downlink, sent as soon as a slot is free.
    DownlinkC,
    /// Network beacon.
    Beacon,
}

impl FrameClass {
    #[inline]
    pub const fn is_beacon(&self) -> bool {
        matches!(self, FrameClass::Beacon)
    }

    #[inline]
    pub const fn is_downlink(&self) -> bool {
        !self.is_beacon()
    }

    /// Timestamp is picked by the queue rather than by the caller.
    #[inline]
    pub const fn is_asap(&self) -> bool {
        matches!(self, FrameClass::DownlinkC)
    }

    /// Subject to the "too much in advance" check.
    #[inline]
    pub const fn checks_advance(&self) -> bool {
        matches!(self, FrameClass::DownlinkA | FrameClass::DownlinkB)
    }

    /// Allowed to use the guard interval in front of a queued beacon.
    #[inline]
    pub const fn ignores_beacon_guard(&self) -> bool {
        matches!(self, FrameClass::DownlinkA | FrameClass::DownlinkC)
    }
}

impl std::fmt::Display for FrameClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameClass::DownlinkA => write!(f, "downlink-a"),
            FrameClass::DownlinkB => write!(f, "downlink-b"),
            FrameClass::DownlinkC => write!(f, "downlink-c"),
            FrameClass::Beacon => write!(f, "beacon"),
        }
    }
}

/// A frame offered to the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<P> {
    pub class: FrameClass,
    /// Requested TX time. Ignored for [`FrameClass::DownlinkC`].
    pub count_us: CountUs,
    pub payload: P,
}

impl<P> Frame<P> {
    pub fn new(class: FrameClass, count_us: CountUs, payload: P) -> Self {
        Self {
            class,
            count_us,
            payload,
        }
    }

    /// A timestamped class A downlink.
    pub fn class_a(count_us: CountUs, payload: P) -> Self {
        Self::new(FrameClass::DownlinkA, count_us, payload)
    }

    /// A timestamped class B downlink.
    pub fn class_b(count_us: CountUs, payload: P) -> Self {
        Self::new(FrameClass::DownlinkB, count_us, payload)
    }

    /// An immediate downlink, placed by the queue in the first free slot.
    pub fn immediate(payload: P) -> Self {
        Self::new(FrameClass::DownlinkC, 0, payload)
    }

    pub fn beacon(count_us: CountUs, payload: P) -> Self {
        Self::new(FrameClass::Beacon, count_us, payload)
    }
}

/// A frame handed back by [`JitQueue::dequeue`](crate::JitQueue::dequeue).
#[derive(Debug, Clone, PartialEq)]
pub struct Dequeued<P> {
    pub class: FrameClass,
    /// Concrete TX time, including the one resolved for immediate downlinks.
    pub count_us: CountUs,
    pub payload: P,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(JitError::TooLate.code(), 1);
        assert_eq!(JitError::CollisionBeacon.code(), 6);
        assert_eq!(JitError::Invalid.code(), 10);
        assert_eq!(JitError::Full.as_str(), "FULL");
        assert_eq!(format!("{}", JitError::Empty), "downlink queue is empty");
    }

    #[test]
    fn test_collision_errors() {
        assert!(JitError::CollisionPacket.is_collision());
        assert!(JitError::CollisionBeacon.is_collision());
        assert!(!JitError::TooLate.is_collision());
    }

    #[test]
    fn test_class_rules() {
        assert!(FrameClass::DownlinkC.is_asap());
        assert!(!FrameClass::DownlinkA.is_asap());

        assert!(FrameClass::DownlinkA.checks_advance());
        assert!(FrameClass::DownlinkB.checks_advance());
        assert!(!FrameClass::DownlinkC.checks_advance());
        assert!(!FrameClass::Beacon.checks_advance());

        // class B must stay out of the beacon guard
        assert!(FrameClass::DownlinkA.ignores_beacon_guard());
        assert!(!FrameClass::DownlinkB.ignores_beacon_guard());
        assert!(FrameClass::DownlinkC.ignores_beacon_guard());
        assert!(!FrameClass::Beacon.ignores_beacon_guard());
    }

    #[test]
    fn test_frame_constructors() {
        let f = Frame::immediate(7u8);
        assert_eq!(f.class, FrameClass::DownlinkC);
        let b = Frame::beacon(1_000, ());
        assert!(b.class.is_beacon());
        assert_eq!(FrameClass::DownlinkB.to_string(), "downlink-b");
    }
}
