//! Background decode with bounded look-ahead
//!
//! [`QueuedSource`] wraps a sequential source with a decode thread and a
//! fixed-capacity rtrb ring. The producer throttles itself: whenever the
//! buffered duration exceeds the configured cap it sleeps in proportion to
//! the excess instead of growing the queue. The consumer side is the render
//! thread calling [`FrameSource::next_frame`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::frame::{Frame, FramePayload};

use super::{FrameSource, SourceError, SourceInfo};

/// Default look-ahead cap in seconds
pub const DEFAULT_LOOKAHEAD_SECS: f64 = 5.0;

/// Producer poll interval when the ring is full or the cap is reached
const THROTTLE_FLOOR: Duration = Duration::from_millis(5);

/// Consumer poll interval while waiting for the producer
const CONSUMER_POLL: Duration = Duration::from_millis(1);

enum QueueItem {
    Frame(Frame),
    Eos,
    Failed(SourceError),
}

struct Shared {
    /// Buffered look-ahead in microseconds
    buffered_micros: AtomicU64,
    shutdown: AtomicBool,
    producer_done: AtomicBool,
}

/// Sequential source fed by a background decode thread
pub struct QueuedSource {
    info: SourceInfo,
    consumer: rtrb::Consumer<QueueItem>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

impl QueuedSource {
    /// Wrap `inner` with the default 5-second look-ahead cap
    pub fn new(inner: Box<dyn FrameSource>) -> Result<Self, SourceError> {
        Self::with_lookahead(inner, DEFAULT_LOOKAHEAD_SECS)
    }

    /// Wrap `inner`, buffering at most `lookahead_secs` of decoded frames
    pub fn with_lookahead(
        inner: Box<dyn FrameSource>,
        lookahead_secs: f64,
    ) -> Result<Self, SourceError> {
        let info = inner.info();
        let lookahead_secs = lookahead_secs.max(0.05);

        // Ring sized to the cap with headroom; the duration cap is what
        // actually bounds the look-ahead
        let frame_dur = info.frame_duration().max(1e-3);
        let capacity = ((lookahead_secs / frame_dur).ceil() as usize + 2).max(8);
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);

        let shared = Arc::new(Shared {
            buffered_micros: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            producer_done: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("reel-decode".into())
            .spawn(move || decode_loop(inner, producer, worker_shared, lookahead_secs))?;

        Ok(Self {
            info,
            consumer,
            shared,
            worker: Some(worker),
            finished: false,
        })
    }

    /// Currently buffered look-ahead in seconds
    pub fn buffered_seconds(&self) -> f64 {
        self.shared.buffered_micros.load(Ordering::Acquire) as f64 / 1e6
    }
}

fn frame_duration(frame: &Frame, fallback: f64) -> f64 {
    match &frame.payload {
        FramePayload::Audio(a) => a.duration(),
        FramePayload::Video(_) => fallback,
    }
}

fn decode_loop(
    mut inner: Box<dyn FrameSource>,
    mut producer: rtrb::Producer<QueueItem>,
    shared: Arc<Shared>,
    cap_secs: f64,
) {
    let fallback_dur = inner.info().frame_duration();

    let mut push = |item: QueueItem, shared: &Shared| -> bool {
        let mut item = item;
        loop {
            if shared.shutdown.load(Ordering::Acquire) {
                return false;
            }
            match producer.push(item) {
                Ok(()) => return true,
                Err(rtrb::PushError::Full(back)) => {
                    item = back;
                    thread::sleep(THROTTLE_FLOOR);
                }
            }
        }
    };

    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        // Backpressure: sleep off the excess instead of queueing more
        let buffered = shared.buffered_micros.load(Ordering::Acquire) as f64 / 1e6;
        if buffered >= cap_secs {
            let excess = buffered - cap_secs;
            thread::sleep(THROTTLE_FLOOR.max(Duration::from_secs_f64(excess.min(0.25))));
            continue;
        }

        match inner.next_frame() {
            Ok(Some(frame)) => {
                let micros = (frame_duration(&frame, fallback_dur) * 1e6) as u64;
                if !push(QueueItem::Frame(frame), &shared) {
                    break;
                }
                shared.buffered_micros.fetch_add(micros, Ordering::AcqRel);
            }
            Ok(None) => {
                push(QueueItem::Eos, &shared);
                break;
            }
            Err(e) if e.is_recoverable() => {
                // Surface it to the consumer; the render loop decides how
                // to continue
                if !push(QueueItem::Failed(e), &shared) {
                    break;
                }
            }
            Err(e) => {
                push(QueueItem::Failed(e), &shared);
                break;
            }
        }
    }

    shared.producer_done.store(true, Ordering::Release);
    log::debug!("decode thread exiting");
}

impl FrameSource for QueuedSource {
    fn info(&self) -> SourceInfo {
        self.info.clone()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.finished {
            return Ok(None);
        }

        let fallback_dur = self.info.frame_duration();
        loop {
            match self.consumer.pop() {
                Ok(QueueItem::Frame(frame)) => {
                    let micros = (frame_duration(&frame, fallback_dur) * 1e6) as u64;
                    // Saturating: never underflow if durations disagree
                    let _ = self.shared.buffered_micros.fetch_update(
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        |v| Some(v.saturating_sub(micros)),
                    );
                    return Ok(Some(frame));
                }
                Ok(QueueItem::Eos) => {
                    self.finished = true;
                    return Ok(None);
                }
                Ok(QueueItem::Failed(e)) => {
                    if !e.is_recoverable() {
                        self.finished = true;
                    }
                    return Err(e);
                }
                Err(rtrb::PopError::Empty) => {
                    if self.shared.producer_done.load(Ordering::Acquire) {
                        // Drain race: check once more before declaring EOS
                        if self.consumer.is_empty() {
                            self.finished = true;
                            return Ok(None);
                        }
                        continue;
                    }
                    thread::sleep(CONSUMER_POLL);
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        // The decode thread owns the inner cursor; restarting the stream
        // means building a fresh QueuedSource
        Err(SourceError::RewindUnsupported)
    }
}

impl Drop for QueuedSource {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
