use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;

use crate::models::config::RecordingConfiguration;
use crate::models::error::CaptureError;
use crate::models::media::{MediaTime, RawSample, SubmitOutcome, TrackKind, TrackStats};
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::{ContainerStatus, WriterState};
use crate::session::track_sink::TrackSink;
use crate::traits::container_writer::ContainerWriter;
use crate::traits::session_delegate::SessionDelegate;

// Raw values of the state word. `STARTING` is only ever held by the
// producer that won the idle → writing race; everyone else reads it as idle.
const IDLE: u8 = WriterState::Idle as u8;
const WRITING: u8 = WriterState::Writing as u8;
const FINALIZING: u8 = WriterState::Finalizing as u8;
const CLOSED: u8 = WriterState::Closed as u8;
const FAILED: u8 = WriterState::Failed as u8;
const STARTING: u8 = 5;

fn public_state(raw: u8) -> WriterState {
    match raw {
        WRITING => WriterState::Writing,
        FINALIZING => WriterState::Finalizing,
        CLOSED => WriterState::Closed,
        FAILED => WriterState::Failed,
        _ => WriterState::Idle,
    }
}

/// Owns the container writer, the session clock anchor and the three
/// track sinks of one recording.
///
/// Producers on any thread call [`SessionWriter::append`]; nothing on that
/// path blocks. The first video sample to arrive while idle anchors the
/// session clock and starts the container, exactly once. A writer is used
/// for a single recording and then dropped.
///
/// ```text
/// [screen thread]  ─ video ───────┐
/// [audio thread]   ─ system audio ┼→ SessionWriter → TrackSink[kind] → ContainerWriter
/// [mic callback]   ─ microphone ──┘
/// ```
pub struct SessionWriter {
    state: AtomicU8,
    anchor: OnceLock<MediaTime>,
    writer: Arc<dyn ContainerWriter>,
    sinks: [TrackSink; 3],
    /// Producers currently between the state check and the end of their append.
    in_flight: AtomicUsize,
    delegate: Option<Arc<dyn SessionDelegate>>,
    /// Outcome of the one finalize run; `Some` once it has completed.
    finished: Mutex<Option<Option<RecordingResult>>>,
}

impl SessionWriter {
    /// Attach all three tracks to `writer` and return an idle session.
    pub fn new(
        writer: Arc<dyn ContainerWriter>,
        config: &RecordingConfiguration,
        delegate: Option<Arc<dyn SessionDelegate>>,
    ) -> Result<Self, CaptureError> {
        let sinks = TrackKind::ALL.map(TrackSink::new);
        for sink in &sinks {
            sink.attach(writer.as_ref(), config.track_settings(sink.kind()))?;
        }

        Ok(Self {
            state: AtomicU8::new(IDLE),
            anchor: OnceLock::new(),
            writer,
            sinks,
            in_flight: AtomicUsize::new(0),
            delegate,
            finished: Mutex::new(None),
        })
    }

    pub fn state(&self) -> WriterState {
        public_state(self.state.load(Ordering::SeqCst))
    }

    /// Session clock anchor, once the first valid video frame has arrived.
    pub fn anchor(&self) -> Option<MediaTime> {
        self.anchor.get().copied()
    }

    pub fn output_path(&self) -> &Path {
        self.writer.output_path()
    }

    pub fn stats(&self, kind: TrackKind) -> TrackStats {
        self.sinks[kind.index()].stats()
    }

    pub fn all_stats(&self) -> [TrackStats; 3] {
        TrackKind::ALL.map(|kind| self.stats(kind))
    }

    /// Route one sample to its track.
    ///
    /// Video samples must already have passed frame validation: the first
    /// one seen while idle becomes the session anchor and is then written
    /// like any other.
    pub fn append(&self, sample: RawSample) -> SubmitOutcome {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let outcome = self.append_gated(&sample);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn append_gated(&self, sample: &RawSample) -> SubmitOutcome {
        let kind = sample.kind();
        let mut raw = self.state.load(Ordering::SeqCst);
        if raw == IDLE && kind == TrackKind::Video {
            raw = self.begin(sample.pts());
        }

        let state = public_state(raw);
        let outcome = self.sinks[kind.index()].submit(state, sample, self.writer.as_ref());

        if outcome != SubmitOutcome::Written
            && state.is_writing()
            && self.writer.status() == ContainerStatus::Failed
        {
            let error = self
                .writer
                .error()
                .unwrap_or_else(|| CaptureError::ContainerFailed(format!("{} append rejected", kind)));
            self.fail(WRITING, error);
        }
        outcome
    }

    /// Try to win the idle → writing transition with `anchor`.
    ///
    /// Returns the raw state the caller should act on.
    fn begin(&self, anchor: MediaTime) -> u8 {
        if let Err(current) = self
            .state
            .compare_exchange(IDLE, STARTING, Ordering::SeqCst, Ordering::SeqCst)
        {
            return current;
        }

        let _ = self.anchor.set(anchor);
        let started = self
            .writer
            .start_writing()
            .and_then(|_| self.writer.start_session(anchor));

        match started {
            Ok(()) => {
                self.state.store(WRITING, Ordering::SeqCst);
                log::info!("Session started, anchor at {} ns", anchor.as_nanos());
                self.notify_state(WriterState::Writing);
                WRITING
            }
            Err(e) => {
                self.fail(STARTING, e);
                FAILED
            }
        }
    }

    /// Move `from` → failed. Only the caller that performs the move reports it.
    fn fail(&self, from: u8, error: CaptureError) {
        if self
            .state
            .compare_exchange(from, FAILED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        log::error!("Container writer failed: {}", error);
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
        self.notify_state(WriterState::Failed);
    }

    /// Stop accepting samples, finish the container and return the result.
    ///
    /// Idempotent: only the first call finalizes; later calls return the
    /// same result. Returns `None` if the session never started writing,
    /// failed, or could not be finished.
    pub fn finalize(&self) -> Option<RecordingResult> {
        let mut finished = self.finished.lock();
        if let Some(ref result) = *finished {
            return result.clone();
        }
        let result = self.finalize_once();
        *finished = Some(result.clone());
        result
    }

    fn finalize_once(&self) -> Option<RecordingResult> {
        loop {
            match self.state.load(Ordering::SeqCst) {
                IDLE => {
                    if self.try_transition(IDLE, CLOSED) {
                        log::info!("Session stopped before the first valid frame, nothing recorded");
                        self.notify_state(WriterState::Closed);
                        return None;
                    }
                }
                // The winning producer is inside start_writing/start_session.
                STARTING => thread::yield_now(),
                WRITING => {
                    // The container may have failed on its own since the last append.
                    if self.writer.status() == ContainerStatus::Failed {
                        let error = self
                            .writer
                            .error()
                            .unwrap_or_else(|| CaptureError::ContainerFailed("container failed before stop".into()));
                        self.fail(WRITING, error);
                        continue;
                    }
                    if self.try_transition(WRITING, FINALIZING) {
                        break;
                    }
                }
                FAILED => {
                    log::warn!("Session failed earlier, no output to finalize");
                    return None;
                }
                _ => return None,
            }
        }

        self.notify_state(WriterState::Finalizing);
        self.wait_for_in_flight();

        for sink in &self.sinks {
            let stats = sink.stats();
            log::info!(
                "{} track: {} written, {} dropped (not ready), {} dropped (not writing)",
                sink.kind(),
                stats.written,
                stats.dropped_not_ready,
                stats.dropped_not_writing
            );
        }

        let finished = self.writer.finish();
        self.state.store(CLOSED, Ordering::SeqCst);
        self.notify_state(WriterState::Closed);

        let file_path = match finished {
            Ok(path) => path,
            Err(e) => {
                log::error!("Failed to finish container: {}", e);
                if let Some(ref delegate) = self.delegate {
                    delegate.on_error(&e);
                }
                return None;
            }
        };

        let anchor = self.anchor().unwrap_or(MediaTime::ZERO);
        let end = self
            .sinks
            .iter()
            .filter_map(TrackSink::end_time)
            .max()
            .unwrap_or(anchor);
        let duration_secs = (end - anchor).as_secs_f64().max(0.0);
        let checksum = self.writer.checksum().unwrap_or_default();

        let metadata = RecordingMetadata::new(
            duration_secs,
            &file_path.to_string_lossy(),
            &checksum,
            anchor.as_nanos(),
            self.all_stats(),
        );
        let result = RecordingResult {
            file_path,
            duration_secs,
            metadata,
            checksum,
        };

        log::info!("Recording finalized at {}", result.file_path.display());
        if let Some(ref delegate) = self.delegate {
            delegate.on_recording_finished(&result);
        }
        Some(result)
    }

    fn try_transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Wait until every producer that saw `Writing` has left the gate.
    fn wait_for_in_flight(&self) {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            thread::yield_now();
        }
    }

    fn notify_state(&self, state: WriterState) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{audio_sample, video_sample, MockContainer, RecordingDelegate};
    use std::sync::Barrier;

    fn session_with(writer: &Arc<MockContainer>) -> SessionWriter {
        SessionWriter::new(writer.clone(), &RecordingConfiguration::default(), None).unwrap()
    }

    #[test]
    fn new_session_is_idle_with_all_tracks_attached() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);

        assert_eq!(session.state(), WriterState::Idle);
        assert_eq!(session.anchor(), None);
        assert_eq!(writer.tracks(), TrackKind::ALL.to_vec());
        assert_eq!(writer.start_writing_calls(), 0);
    }

    #[test]
    fn audio_before_first_frame_is_dropped_without_touching_writer() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);

        for i in 0..5 {
            assert_eq!(
                session.append(audio_sample(TrackKind::SystemAudio, i * 10)),
                SubmitOutcome::DroppedNotWriting
            );
            assert_eq!(
                session.append(audio_sample(TrackKind::MicrophoneAudio, i * 10)),
                SubmitOutcome::DroppedNotWriting
            );
        }

        assert_eq!(session.state(), WriterState::Idle);
        assert_eq!(writer.start_writing_calls(), 0);
        assert!(writer.appended().is_empty());
    }

    #[test]
    fn first_video_sample_anchors_and_is_written() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);

        assert_eq!(session.append(video_sample(100)), SubmitOutcome::Written);
        assert_eq!(session.append(video_sample(116)), SubmitOutcome::Written);

        assert_eq!(session.state(), WriterState::Writing);
        assert_eq!(session.anchor(), Some(MediaTime::from_millis(100)));
        assert_eq!(writer.sessions(), vec![MediaTime::from_millis(100)]);
        assert_eq!(writer.start_writing_calls(), 1);
        assert_eq!(
            writer.appended(),
            vec![
                (TrackKind::Video, MediaTime::from_millis(100)),
                (TrackKind::Video, MediaTime::from_millis(116)),
            ]
        );
    }

    #[test]
    fn mixed_scenario_drops_only_pre_anchor_audio() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);

        assert_eq!(
            session.append(audio_sample(TrackKind::SystemAudio, -5)),
            SubmitOutcome::DroppedNotWriting
        );
        assert_eq!(session.append(video_sample(0)), SubmitOutcome::Written);
        assert_eq!(session.append(video_sample(16)), SubmitOutcome::Written);
        assert_eq!(
            session.append(audio_sample(TrackKind::SystemAudio, 20)),
            SubmitOutcome::Written
        );

        assert_eq!(session.anchor(), Some(MediaTime::ZERO));
        assert_eq!(
            writer.appended(),
            vec![
                (TrackKind::Video, MediaTime::ZERO),
                (TrackKind::Video, MediaTime::from_millis(16)),
                (TrackKind::SystemAudio, MediaTime::from_millis(20)),
            ]
        );
    }

    #[test]
    fn backpressure_drops_everything_and_stays_writing() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);
        session.append(video_sample(0));
        let baseline = writer.appended().len();

        for kind in TrackKind::ALL {
            writer.set_ready(kind, false);
        }

        let mut outcomes = Vec::new();
        for i in 1..=10 {
            outcomes.push(session.append(video_sample(i * 16)));
            outcomes.push(session.append(audio_sample(TrackKind::SystemAudio, i * 10)));
            outcomes.push(session.append(audio_sample(TrackKind::MicrophoneAudio, i * 10)));
        }

        assert_eq!(outcomes.iter().filter(|o| **o == SubmitOutcome::Written).count(), 0);
        assert_eq!(
            outcomes.iter().filter(|o| **o == SubmitOutcome::DroppedNotReady).count(),
            30
        );
        assert_eq!(writer.appended().len(), baseline);
        assert_eq!(session.state(), WriterState::Writing);
        for kind in TrackKind::ALL {
            assert_eq!(session.stats(kind).dropped_not_ready, 10);
        }
    }

    #[test]
    fn concurrent_first_frames_start_session_once() {
        let writer = Arc::new(MockContainer::new());
        let session = Arc::new(session_with(&writer));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    if i % 2 == 0 {
                        session.append(video_sample(i));
                    } else {
                        session.append(audio_sample(TrackKind::SystemAudio, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(writer.start_writing_calls(), 1);
        assert_eq!(writer.sessions().len(), 1);
        let anchor = session.anchor().unwrap();
        assert_eq!(writer.sessions()[0], anchor);
        assert!(!writer.appended_before_session());
        assert!(writer.appended().contains(&(TrackKind::Video, anchor)));
    }

    #[test]
    fn stop_is_idempotent() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);
        session.append(video_sample(0));
        session.append(audio_sample(TrackKind::MicrophoneAudio, 5));

        let first = session.finalize().unwrap();
        let second = session.finalize().unwrap();

        assert_eq!(first.file_path, second.file_path);
        assert_eq!(first.metadata.id, second.metadata.id);
        assert_eq!(writer.finish_calls(), 1);
        assert_eq!(session.state(), WriterState::Closed);
    }

    #[test]
    fn samples_after_stop_are_discarded() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);
        session.append(video_sample(0));
        session.finalize();
        let written = writer.appended().len();

        assert_eq!(session.append(video_sample(16)), SubmitOutcome::DroppedNotWriting);
        assert_eq!(
            session.append(audio_sample(TrackKind::SystemAudio, 20)),
            SubmitOutcome::DroppedNotWriting
        );
        assert_eq!(writer.appended().len(), written);
    }

    #[test]
    fn stop_before_first_frame_closes_without_output() {
        let writer = Arc::new(MockContainer::new());
        let session = session_with(&writer);

        assert!(session.finalize().is_none());
        assert_eq!(session.state(), WriterState::Closed);
        assert_eq!(writer.finish_calls(), 0);

        // A frame arriving after stop must not start the container.
        assert_eq!(session.append(video_sample(0)), SubmitOutcome::DroppedNotWriting);
        assert_eq!(writer.start_writing_calls(), 0);
    }

    #[test]
    fn start_failure_moves_to_failed() {
        let writer = Arc::new(MockContainer::new());
        writer.fail_start("cannot open output");
        let delegate = Arc::new(RecordingDelegate::default());
        let session =
            SessionWriter::new(writer.clone(), &RecordingConfiguration::default(), Some(delegate.clone())).unwrap();

        assert_eq!(session.append(video_sample(0)), SubmitOutcome::DroppedNotWriting);
        assert_eq!(session.state(), WriterState::Failed);
        assert_eq!(delegate.errors.lock().len(), 1);
        assert_eq!(
            session.append(audio_sample(TrackKind::SystemAudio, 5)),
            SubmitOutcome::DroppedNotWriting
        );
        assert!(session.finalize().is_none());
        assert_eq!(writer.finish_calls(), 0);
    }

    #[test]
    fn append_failure_moves_to_failed_and_stops_writes() {
        let writer = Arc::new(MockContainer::new());
        let delegate = Arc::new(RecordingDelegate::default());
        let session =
            SessionWriter::new(writer.clone(), &RecordingConfiguration::default(), Some(delegate.clone())).unwrap();
        session.append(video_sample(0));

        writer.fail_appends("disk full");
        session.append(audio_sample(TrackKind::SystemAudio, 10));

        assert_eq!(session.state(), WriterState::Failed);
        assert_eq!(
            *delegate.errors.lock(),
            vec![CaptureError::ContainerFailed("disk full".into())]
        );
        assert_eq!(
            *delegate.states.lock(),
            vec![WriterState::Writing, WriterState::Failed]
        );
    }

    #[test]
    fn finish_failure_reports_no_output() {
        let writer = Arc::new(MockContainer::new());
        writer.fail_finish("flush failed");
        let session = session_with(&writer);
        session.append(video_sample(0));

        assert!(session.finalize().is_none());
        assert!(session.finalize().is_none());
        assert_eq!(writer.finish_calls(), 1);
    }

    #[test]
    fn container_failure_noticed_at_stop_moves_to_failed() {
        let writer = Arc::new(MockContainer::new());
        let delegate = Arc::new(RecordingDelegate::default());
        let session =
            SessionWriter::new(writer.clone(), &RecordingConfiguration::default(), Some(delegate.clone())).unwrap();
        session.append(video_sample(0));

        writer.fail_now("write failed: no space left on device");

        assert!(session.finalize().is_none());
        assert_eq!(session.state(), WriterState::Failed);
        assert_eq!(writer.finish_calls(), 0);
        assert_eq!(
            *delegate.states.lock(),
            vec![WriterState::Writing, WriterState::Failed]
        );
        assert_eq!(
            *delegate.errors.lock(),
            vec![CaptureError::ContainerFailed("write failed: no space left on device".into())]
        );
        assert!(session.finalize().is_none());
    }

    #[test]
    fn stop_waits_for_append_in_progress() {
        let writer = Arc::new(MockContainer::new());
        let session = Arc::new(session_with(&writer));
        session.append(video_sample(0));

        let gate = Arc::new(Barrier::new(2));
        writer.hold_appends(Arc::clone(&gate));

        let producer = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.append(audio_sample(TrackKind::SystemAudio, 10)))
        };
        // The producer is now inside the container's append.
        gate.wait();

        let stopper = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.finalize())
        };
        while session.state() != WriterState::Finalizing {
            thread::yield_now();
        }
        thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(writer.finish_calls(), 0);

        gate.wait();
        assert_eq!(producer.join().unwrap(), SubmitOutcome::Written);
        let result = stopper.join().unwrap();

        assert!(result.is_some());
        assert_eq!(writer.finish_calls(), 1);
        assert_eq!(writer.appended_at_finish(), Some(2));
        assert_eq!(
            session.append(audio_sample(TrackKind::SystemAudio, 20)),
            SubmitOutcome::DroppedNotWriting
        );
        assert_eq!(writer.appended().len(), 2);
    }

    #[test]
    fn duration_spans_anchor_to_latest_sample_end() {
        let writer = Arc::new(MockContainer::new());
        let delegate = Arc::new(RecordingDelegate::default());
        let session =
            SessionWriter::new(writer.clone(), &RecordingConfiguration::default(), Some(delegate.clone())).unwrap();
        session.append(video_sample(1000));
        session.append(audio_sample(TrackKind::SystemAudio, 1990));

        let result = session.finalize().unwrap();

        assert!((result.duration_secs - 1.0).abs() < 1e-9);
        assert_eq!(result.metadata.anchor_nanos, MediaTime::from_millis(1000).as_nanos());
        assert_eq!(
            *delegate.states.lock(),
            vec![WriterState::Writing, WriterState::Finalizing, WriterState::Closed]
        );
        assert_eq!(delegate.finished.lock().len(), 1);
    }
}
