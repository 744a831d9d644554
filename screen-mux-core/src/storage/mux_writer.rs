use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::config::{AudioEncoding, TrackSettings};
use crate::models::error::CaptureError;
use crate::models::media::{MediaTime, RawSample, TrackKind};
use crate::models::state::ContainerStatus;
use crate::storage::mux_format::{self, TrackDescriptor, TrackSummary};
use crate::traits::container_writer::{ContainerFactory, ContainerWriter};

enum Command {
    Header(Vec<TrackDescriptor>),
    Session(MediaTime),
    Sample {
        kind: TrackKind,
        pts: MediaTime,
        duration: Option<MediaTime>,
        data: Vec<u8>,
    },
    Finish,
}

/// State shared with the writer thread.
struct Shared {
    status: AtomicU8,
    error: Mutex<Option<CaptureError>>,
    /// Samples handed to the writer thread and not yet written, per track.
    pending: [AtomicUsize; 3],
}

impl Shared {
    fn status(&self) -> ContainerStatus {
        ContainerStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn set_status(&self, status: ContainerStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    fn fail(&self, error: CaptureError) {
        log::error!("Container writer failed: {}", error);
        *self.error.lock() = Some(error);
        self.set_status(ContainerStatus::Failed);
    }
}

/// `.smux` container writer.
///
/// File I/O runs on a dedicated `mux-writer` thread. Producers only do an
/// atomic readiness check and a channel send. A track reports ready while
/// fewer than its queue depth of samples are waiting for that thread.
///
/// Samples stamped before the session anchor are trimmed: accepted, but
/// not stored. Audio tracks store linear PCM exactly as declared in the
/// header; samples in any other format are refused.
pub struct MuxFileWriter {
    path: PathBuf,
    settings: [OnceLock<TrackSettings>; 3],
    shared: Arc<Shared>,
    anchor: OnceLock<MediaTime>,
    sender: OnceLock<Sender<Command>>,
    handle: Mutex<Option<thread::JoinHandle<Result<String, CaptureError>>>>,
    checksum: Mutex<Option<String>>,
    trimmed: AtomicU64,
}

impl MuxFileWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            settings: [OnceLock::new(), OnceLock::new(), OnceLock::new()],
            shared: Arc::new(Shared {
                status: AtomicU8::new(ContainerStatus::Unknown as u8),
                error: Mutex::new(None),
                pending: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
            }),
            anchor: OnceLock::new(),
            sender: OnceLock::new(),
            handle: Mutex::new(None),
            checksum: Mutex::new(None),
            trimmed: AtomicU64::new(0),
        }
    }

    /// Samples dropped for predating the session anchor.
    pub fn trimmed_samples(&self) -> u64 {
        self.trimmed.load(Ordering::Relaxed)
    }

    fn send(&self, command: Command) -> Result<(), CaptureError> {
        let sender = self
            .sender
            .get()
            .ok_or_else(|| CaptureError::ContainerFailed("writer is not started".into()))?;
        sender.send(command).map_err(|_| {
            let error = CaptureError::ContainerFailed("writer thread exited".into());
            self.shared.fail(error.clone());
            error
        })
    }

    fn require_writing(&self) -> Result<(), CaptureError> {
        match self.shared.status() {
            ContainerStatus::Writing => Ok(()),
            ContainerStatus::Failed => Err(self
                .shared
                .error
                .lock()
                .clone()
                .unwrap_or_else(|| CaptureError::ContainerFailed("writer failed".into()))),
            status => Err(CaptureError::ContainerFailed(format!(
                "writer is not writing ({:?})",
                status
            ))),
        }
    }
}

impl ContainerWriter for MuxFileWriter {
    fn add_track(&self, kind: TrackKind, settings: TrackSettings) -> Result<(), CaptureError> {
        if self.shared.status() != ContainerStatus::Unknown {
            return Err(CaptureError::ContainerFailed("tracks must be added before writing starts".into()));
        }
        if let TrackSettings::Audio { audio, .. } = &settings {
            if audio.encoding != AudioEncoding::LinearPcm {
                return Err(CaptureError::ConfigurationFailed(format!(
                    "{} track: {:?} is not supported, audio is stored as linear PCM",
                    kind, audio.encoding
                )));
            }
        }
        self.settings[kind.index()]
            .set(settings)
            .map_err(|_| CaptureError::ContainerFailed(format!("{} track already added", kind)))
    }

    fn start_writing(&self) -> Result<(), CaptureError> {
        if self.shared.status() != ContainerStatus::Unknown {
            return Err(CaptureError::ContainerFailed("writing already started".into()));
        }
        let tracks: Vec<TrackDescriptor> = TrackKind::ALL
            .iter()
            .filter_map(|&kind| {
                self.settings[kind.index()].get().map(|settings| TrackDescriptor {
                    kind,
                    settings: settings.clone(),
                })
            })
            .collect();
        if tracks.is_empty() {
            return Err(CaptureError::ContainerFailed("no tracks added".into()));
        }

        let file = open_output(&self.path).map_err(|e| {
            self.shared.fail(e.clone());
            e
        })?;

        let (sender, receiver) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("mux-writer".into())
            .spawn(move || {
                let result = write_loop(file, receiver, &shared);
                if let Err(ref e) = result {
                    shared.fail(e.clone());
                }
                result
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn writer thread: {}", e)))?;

        *self.handle.lock() = Some(handle);
        let _ = self.sender.set(sender);
        self.shared.set_status(ContainerStatus::Writing);
        self.send(Command::Header(tracks))
    }

    fn start_session(&self, anchor: MediaTime) -> Result<(), CaptureError> {
        self.require_writing()?;
        self.anchor
            .set(anchor)
            .map_err(|_| CaptureError::ContainerFailed("session already started".into()))?;
        self.send(Command::Session(anchor))
    }

    fn append(&self, kind: TrackKind, sample: &RawSample) -> bool {
        if sample.kind() != kind || !self.is_ready_for_more_data(kind) {
            return false;
        }
        let Some(settings) = self.settings[kind.index()].get() else {
            return false;
        };
        if !settings.accepts(&sample.format()) {
            log::debug!("{} track refused a sample in format {:?}", kind, sample.format());
            return false;
        }
        if !fits_record(sample.data().len()) {
            log::warn!("{} track refused a {} byte sample", kind, sample.data().len());
            return false;
        }
        let Some(&anchor) = self.anchor.get() else {
            return false;
        };
        if sample.pts() < anchor {
            self.trimmed.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        self.shared.pending[kind.index()].fetch_add(1, Ordering::SeqCst);
        let command = Command::Sample {
            kind,
            pts: sample.pts() - anchor,
            duration: sample.duration(),
            data: sample.data().to_vec(),
        };
        if self.send(command).is_err() {
            self.shared.pending[kind.index()].fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn is_ready_for_more_data(&self, kind: TrackKind) -> bool {
        let Some(settings) = self.settings[kind.index()].get() else {
            return false;
        };
        self.shared.status() == ContainerStatus::Writing
            && self.shared.pending[kind.index()].load(Ordering::SeqCst) < settings.queue_depth().max(1)
    }

    fn status(&self) -> ContainerStatus {
        self.shared.status()
    }

    fn error(&self) -> Option<CaptureError> {
        self.shared.error.lock().clone()
    }

    fn finish(&self) -> Result<PathBuf, CaptureError> {
        self.require_writing()?;
        self.send(Command::Finish)?;

        let handle = self
            .handle
            .lock()
            .take()
            .ok_or_else(|| CaptureError::ContainerFailed("writer thread already joined".into()))?;
        let result = handle
            .join()
            .map_err(|_| CaptureError::Unknown("writer thread panicked".into()))
            .and_then(|r| r);

        match result {
            Ok(checksum) => {
                *self.checksum.lock() = Some(checksum);
                self.shared.set_status(ContainerStatus::Completed);
                Ok(self.path.clone())
            }
            Err(e) => {
                self.shared.fail(e.clone());
                Err(e)
            }
        }
    }

    fn output_path(&self) -> &Path {
        &self.path
    }

    fn checksum(&self) -> Option<String> {
        self.checksum.lock().clone()
    }
}

/// Factory that writes each recording to a fresh `.smux` file.
pub fn mux_file_factory() -> ContainerFactory {
    Box::new(|path: &Path| Ok(Arc::new(MuxFileWriter::new(path.to_path_buf())) as Arc<dyn ContainerWriter>))
}

fn open_output(path: &Path) -> Result<File, CaptureError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
    }
    File::create(path).map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))
}

/// Writer that hashes everything passing through it.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Body of the writer thread. Returns the SHA-256 of the file on `Finish`.
fn write_loop(file: File, receiver: Receiver<Command>, shared: &Shared) -> Result<String, CaptureError> {
    let mut out = HashingWriter {
        inner: BufWriter::new(file),
        hasher: Sha256::new(),
    };
    let mut summaries: Vec<TrackSummary> = Vec::new();
    let io_error = |e: io::Error| CaptureError::StorageError(format!("write failed: {}", e));

    for command in receiver {
        match command {
            Command::Header(tracks) => {
                out.write_all(&mux_format::encode_header(&tracks)?).map_err(io_error)?;
                summaries = tracks.iter().map(|t| TrackSummary::empty(t.kind)).collect();
            }
            Command::Session(anchor) => {
                out.write_all(&mux_format::encode_session(anchor)).map_err(io_error)?;
            }
            Command::Sample {
                kind,
                pts,
                duration,
                data,
            } => {
                let header = mux_format::encode_sample_header(kind, pts, duration, data.len() as u32);
                let written = out.write_all(&header).and_then(|_| out.write_all(&data));
                shared.pending[kind.index()].fetch_sub(1, Ordering::SeqCst);
                written.map_err(io_error)?;
                if let Some(summary) = summaries.iter_mut().find(|s| s.kind == kind) {
                    summary.record(pts, duration);
                }
            }
            Command::Finish => {
                out.write_all(&mux_format::encode_trailer(&summaries)).map_err(io_error)?;
                out.flush().map_err(io_error)?;
                let file = out
                    .inner
                    .into_inner()
                    .map_err(|e| CaptureError::StorageError(format!("flush failed: {}", e)))?;
                file.sync_all().map_err(io_error)?;
                return Ok(hex_encode(&out.hasher.finalize()));
            }
        }
    }

    Err(CaptureError::ContainerFailed("writer closed without finishing".into()))
}

/// Whether a payload of `len` bytes fits the record's `u32` length field.
fn fits_record(len: usize) -> bool {
    u32::try_from(len).is_ok()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
