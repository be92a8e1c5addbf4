//! # Just-In-Time Downlink Scheduler
//!
//! This crate schedules outgoing frames for a LoRa gateway that shares a
//! single radio between class A/B/C downlinks and network beacons.
//!
//! ## Overview
//!
//! Network servers ask for downlinks well before they are due. The radio
//! however can only be programmed for one frame at a time, shortly before
//! it goes out. The JIT queue sits in between:
//!
//! - **Admission**: reject frames that are too late, too far ahead, or that
//!   would overlap a frame already queued
//! - **Class C placement**: pick the first free slot for immediate downlinks
//! - **Just-in-time release**: report the next frame once it is due within
//!   the configured lookahead, and drop frames whose slot was missed
//! - **Dispatch**: hand due frames to the radio driver from a polling loop
//!
//! All times are 32-bit microsecond concentrator counts that wrap around.
//!
//! ## Frame Flow
//!
//! ```text
//! Network server → enqueue → [JitQueue] → peek/dequeue → JitDispatcher → TxSink (radio)
//!                                 ↑
//!                         beacon scheduler
//! ```
//!
//! ## Example
//!
//! ```rust
//! use r4w_jit::airtime::{Bandwidth, CodeRate, TxPacket, TxMode};
//! use r4w_jit::{FrameClass, JitError, JitQueue};
//!
//! let queue = JitQueue::new(Default::default()).unwrap();
//!
//! let now = 10_000_000;
//! let rx1 = TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0x60; 20])
//!     .with_count_us(now + 1_000_000);
//! queue.enqueue(now, rx1.clone().into_frame(FrameClass::DownlinkA)).unwrap();
//!
//! // the same slot cannot be booked twice
//! assert_eq!(
//!     queue.enqueue(now, rx1.into_frame(FrameClass::DownlinkA)),
//!     Err(JitError::CollisionPacket)
//! );
//!
//! // class C: the queue picks the time
//! let asap = TxPacket::lora(9, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0x60; 12])
//!     .with_tx_mode(TxMode::Immediate);
//! let at = queue.enqueue(now, asap.into_frame(FrameClass::DownlinkC)).unwrap();
//! assert!(at > now + 1_000_000);
//! ```

pub mod airtime;
pub mod collision;
pub mod config;
pub mod dispatch;
pub mod observe;
pub mod queue;
pub mod stats;
pub mod timing;
pub mod types;

pub use airtime::{Airtime, TxPacket};
pub use config::{ConfigError, JitConfig};
pub use dispatch::{DispatchError, JitDispatcher, TxSink};
pub use queue::{JitQueue, NodeInfo, QueueSnapshot};
pub use stats::{JitStats, JitStatsSnapshot};
pub use timing::{Clock, CountUs, MockClock, SystemClock};
pub use types::{Dequeued, Frame, FrameClass, JitError, JitResult};
