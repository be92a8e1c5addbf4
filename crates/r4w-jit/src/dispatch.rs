//! # TX Dispatcher
//!
//! Consumer side of the JIT queue: polls for the next due frame and hands it
//! to a [`TxSink`], typically the radio driver. One dispatcher serves one
//! queue.
//!
//! ```text
//!   producers ──enqueue──> JitQueue ──take_due──> JitDispatcher ──transmit──> TxSink
//!                                                  (poll every interval)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::{mpsc, Arc};
//! use r4w_jit::airtime::{Bandwidth, CodeRate, TxPacket};
//! use r4w_jit::dispatch::JitDispatcher;
//! use r4w_jit::timing::MockClock;
//! use r4w_jit::{Frame, FrameClass, JitQueue};
//!
//! let queue = Arc::new(JitQueue::<TxPacket>::default());
//! let clock = Arc::new(MockClock::new());
//! let (tx, rx) = mpsc::channel();
//! let dispatcher = JitDispatcher::new(queue.clone(), clock.clone(), tx);
//!
//! let beacon = TxPacket::lora(9, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0; 17]);
//! queue.enqueue(0, Frame::beacon(5_000_000, beacon)).unwrap();
//! clock.set_us(4_990_000);
//!
//! assert_eq!(dispatcher.poll_once().unwrap(), Some(FrameClass::Beacon));
//! assert_eq!(rx.recv().unwrap().count_us, 5_000_000);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::queue::JitQueue;
use crate::timing::Clock;
use crate::types::{Dequeued, FrameClass, JitError};

/// Destination for frames leaving the queue.
pub trait TxSink<P>: Send {
    type Error: std::fmt::Display;

    /// Send `frame` now. Its `count_us` is the concentrator time it must go
    /// out at.
    fn transmit(&mut self, frame: Dequeued<P>) -> Result<(), Self::Error>;
}

impl<P: Send> TxSink<P> for mpsc::Sender<Dequeued<P>> {
    type Error = mpsc::SendError<Dequeued<P>>;

    fn transmit(&mut self, frame: Dequeued<P>) -> Result<(), Self::Error> {
        self.send(frame)
    }
}

/// Errors from the dispatcher
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher is already running")]
    AlreadyRunning,

    #[error("queue error: {0}")]
    Queue(JitError),

    #[error("transmit failed: {0}")]
    Sink(String),
}

/// Moves due frames from a [`JitQueue`] to a [`TxSink`].
pub struct JitDispatcher<P, C, S> {
    queue: Arc<JitQueue<P>>,
    clock: C,
    sink: Mutex<S>,
    running: AtomicBool,
    sent: AtomicU64,
    sink_errors: AtomicU64,
}

impl<P, C, S> JitDispatcher<P, C, S>
where
    C: Clock,
    S: TxSink<P>,
{
    pub fn new(queue: Arc<JitQueue<P>>, clock: C, sink: S) -> Self {
        Self {
            queue,
            clock,
            sink: Mutex::new(sink),
            running: AtomicBool::new(false),
            sent: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
        }
    }

    pub fn queue(&self) -> &Arc<JitQueue<P>> {
        &self.queue
    }

    /// Frames successfully handed to the sink.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Frames the sink refused. They are not re-queued.
    pub fn sink_errors(&self) -> u64 {
        self.sink_errors.load(Ordering::Relaxed)
    }

    /// Transmit the next frame if one is due.
    ///
    /// Returns the class of the frame sent, or `None` when nothing is due
    /// (an empty queue included).
    pub fn poll_once(&self) -> Result<Option<FrameClass>, DispatchError> {
        let now = self.clock.now_us();
        let frame = match self.queue.take_due(now) {
            Ok(Some(frame)) => frame,
            Ok(None) | Err(JitError::Empty) => return Ok(None),
            Err(err) => return Err(DispatchError::Queue(err)),
        };

        let class = frame.class;
        let count_us = frame.count_us;
        if let Err(err) = self.sink.lock().transmit(frame) {
            self.sink_errors.fetch_add(1, Ordering::Relaxed);
            return Err(DispatchError::Sink(err.to_string()));
        }

        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(now, count_us, %class, "frame handed to TX sink");
        Ok(Some(class))
    }

    /// Poll the queue every `interval` until [`stop`](Self::stop) is called.
    pub fn run(&self, interval: Duration) -> Result<(), DispatchError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyRunning);
        }
        info!(?interval, "JIT dispatcher started");

        while self.running.load(Ordering::SeqCst) {
            // drain everything due before sleeping
            loop {
                match self.poll_once() {
                    Ok(Some(_)) => continue,
                    Ok(None) => break,
                    Err(DispatchError::Sink(msg)) => {
                        warn!(%msg, "dropping frame, TX sink refused it");
                    }
                    Err(err) => {
                        error!(%err, "JIT dispatcher poll failed");
                        break;
                    }
                }
            }
            thread::sleep(interval);
        }

        info!(sent = self.sent(), sink_errors = self.sink_errors(), "JIT dispatcher stopped");
        Ok(())
    }

    /// Stop the dispatch loop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::MockClock;
    use crate::types::Frame;

    struct FailingSink;

    impl TxSink<u32> for FailingSink {
        type Error = &'static str;

        fn transmit(&mut self, _frame: Dequeued<u32>) -> Result<(), Self::Error> {
            Err("radio busy")
        }
    }

    impl crate::airtime::Airtime for u32 {
        fn time_on_air_us(&self) -> Option<u32> {
            Some(*self)
        }
    }

    fn setup() -> (
        Arc<JitQueue<u32>>,
        Arc<MockClock>,
        JitDispatcher<u32, Arc<MockClock>, mpsc::Sender<Dequeued<u32>>>,
        mpsc::Receiver<Dequeued<u32>>,
    ) {
        let queue = Arc::new(JitQueue::default());
        let clock = Arc::new(MockClock::new());
        let (tx, rx) = mpsc::channel();
        let dispatcher = JitDispatcher::new(queue.clone(), clock.clone(), tx);
        (queue, clock, dispatcher, rx)
    }

    #[test]
    fn test_poll_empty_queue() {
        let (_queue, _clock, dispatcher, rx) = setup();
        assert_eq!(dispatcher.poll_once(), Ok(None));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_poll_sends_when_due() {
        let (queue, clock, dispatcher, rx) = setup();
        queue.enqueue(0, Frame::class_a(1_000_000, 40_000)).unwrap();

        assert_eq!(dispatcher.poll_once(), Ok(None));
        assert_eq!(queue.len(), 1);

        clock.set_us(980_000);
        assert_eq!(dispatcher.poll_once(), Ok(Some(FrameClass::DownlinkA)));
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.count_us, 1_000_000);
        assert_eq!(frame.payload, 40_000);
        assert!(queue.is_empty());
        assert_eq!(dispatcher.sent(), 1);
    }

    #[test]
    fn test_poll_in_time_order() {
        let (queue, clock, dispatcher, rx) = setup();
        queue.enqueue(0, Frame::class_a(2_000_000, 2)).unwrap();
        queue.enqueue(0, Frame::class_a(1_000_000, 1)).unwrap();

        clock.set_us(990_000);
        dispatcher.poll_once().unwrap();
        clock.set_us(1_990_000);
        dispatcher.poll_once().unwrap();

        let order: Vec<u32> = rx.try_iter().map(|f| f.payload).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_sink_error_counted() {
        let queue = Arc::new(JitQueue::default());
        let clock = Arc::new(MockClock::at(990_000));
        let dispatcher = JitDispatcher::new(queue.clone(), clock, FailingSink);

        queue.enqueue(0, Frame::class_a(1_000_000, 10_000)).unwrap();
        assert_eq!(
            dispatcher.poll_once(),
            Err(DispatchError::Sink("radio busy".to_string()))
        );
        assert_eq!(dispatcher.sink_errors(), 1);
        // the frame is gone either way
        assert!(queue.is_empty());
    }

    #[test]
    fn test_run_and_stop() {
        let (queue, clock, dispatcher, rx) = setup();
        let dispatcher = Arc::new(dispatcher);
        queue.enqueue(0, Frame::class_a(1_000_000, 10_000)).unwrap();
        queue.enqueue(0, Frame::beacon(10_000_000, 0)).unwrap();
        clock.set_us(1_990_000);

        let runner = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.run(Duration::from_millis(1)))
        };

        // the class A frame has been missed and is dropped by peek
        clock.set_us(9_990_000);
        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.class, FrameClass::Beacon);

        assert!(dispatcher.is_running());
        assert_eq!(
            dispatcher.run(Duration::from_millis(1)),
            Err(DispatchError::AlreadyRunning)
        );

        dispatcher.stop();
        assert_eq!(runner.join().unwrap(), Ok(()));
        assert!(!dispatcher.is_running());
        assert_eq!(queue.stats().dropped(), 1);
    }
}
