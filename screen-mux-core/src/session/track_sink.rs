use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use crate::models::config::TrackSettings;
use crate::models::error::CaptureError;
use crate::models::media::{MediaTime, RawSample, SubmitOutcome, TrackKind, TrackStats};
use crate::models::state::{ContainerStatus, WriterState};
use crate::traits::container_writer::ContainerWriter;

/// One destination track inside the container.
///
/// Samples are never queued here: a sample that cannot be written right
/// now is dropped, so memory and latency stay bounded under load.
#[derive(Debug)]
pub struct TrackSink {
    kind: TrackKind,
    attached: AtomicBool,
    written: AtomicU64,
    dropped_not_ready: AtomicU64,
    dropped_not_writing: AtomicU64,
    /// End of the latest written sample, in host-clock nanoseconds.
    end_nanos: AtomicI64,
}

impl TrackSink {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            attached: AtomicBool::new(false),
            written: AtomicU64::new(0),
            dropped_not_ready: AtomicU64::new(0),
            dropped_not_writing: AtomicU64::new(0),
            end_nanos: AtomicI64::new(i64::MIN),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Declare this track on `writer`.
    pub fn attach(&self, writer: &dyn ContainerWriter, settings: TrackSettings) -> Result<(), CaptureError> {
        writer.add_track(self.kind, settings)?;
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Read-only view of the writer's readiness flag for this track.
    pub fn is_ready(&self, writer: &dyn ContainerWriter) -> bool {
        writer.is_ready_for_more_data(self.kind)
    }

    /// Offer `sample` to the track while the session is in `state`.
    pub fn submit(&self, state: WriterState, sample: &RawSample, writer: &dyn ContainerWriter) -> SubmitOutcome {
        let outcome = self.try_submit(state, sample, writer);
        self.record(outcome, sample);
        outcome
    }

    fn try_submit(&self, state: WriterState, sample: &RawSample, writer: &dyn ContainerWriter) -> SubmitOutcome {
        if sample.kind() != self.kind {
            log::debug!("{} sink refused a {} sample", self.kind, sample.kind());
            return SubmitOutcome::DroppedNotWriting;
        }
        if !state.is_writing() || !self.is_attached() {
            return SubmitOutcome::DroppedNotWriting;
        }
        if !self.is_ready(writer) {
            return SubmitOutcome::DroppedNotReady;
        }
        if writer.append(self.kind, sample) {
            return SubmitOutcome::Written;
        }
        // Readiness can flip between the check and the append.
        if writer.status() == ContainerStatus::Failed {
            SubmitOutcome::DroppedNotWriting
        } else {
            SubmitOutcome::DroppedNotReady
        }
    }

    fn record(&self, outcome: SubmitOutcome, sample: &RawSample) {
        match outcome {
            SubmitOutcome::Written => {
                self.written.fetch_add(1, Ordering::Relaxed);
                let end = sample.pts() + sample.duration().unwrap_or(MediaTime::ZERO);
                self.end_nanos.fetch_max(end.as_nanos(), Ordering::Relaxed);
            }
            SubmitOutcome::DroppedNotReady => {
                self.dropped_not_ready.fetch_add(1, Ordering::Relaxed);
            }
            SubmitOutcome::DroppedNotWriting => {
                self.dropped_not_writing.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn stats(&self) -> TrackStats {
        TrackStats {
            written: self.written.load(Ordering::Relaxed),
            dropped_not_ready: self.dropped_not_ready.load(Ordering::Relaxed),
            dropped_not_writing: self.dropped_not_writing.load(Ordering::Relaxed),
        }
    }

    /// End time of the latest written sample, if anything was written.
    pub fn end_time(&self) -> Option<MediaTime> {
        match self.end_nanos.load(Ordering::Relaxed) {
            i64::MIN => None,
            nanos => Some(MediaTime::from_nanos(nanos)),
        }
    }
}
