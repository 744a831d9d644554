//! `.smux` container layout.
//!
//! All integers are little-endian.
//!
//! ```text
//! header   "SMUX" | version u16 | track_count u8
//!          per track: kind u8 | settings_len u32 | settings (JSON)
//! session  0x53 | anchor i64 (host clock, ns)
//! sample   0x01 | kind u8 | pts i64 (ns since anchor) | duration i64 (-1 = unknown)
//!          | len u32 | payload
//! trailer  0xFF | track_count u8
//!          per track: kind u8 | samples u64 | end i64 (ns since anchor)
//! ```

use std::fs;
use std::path::Path;

use crate::models::config::TrackSettings;
use crate::models::error::CaptureError;
use crate::models::media::{MediaTime, TrackKind};

pub const MAGIC: &[u8; 4] = b"SMUX";
pub const VERSION: u16 = 1;
pub const SESSION_TAG: u8 = 0x53;
pub const SAMPLE_TAG: u8 = 0x01;
pub const TRAILER_TAG: u8 = 0xFF;
pub const UNKNOWN_DURATION: i64 = -1;

/// Size of a sample record before its payload.
pub const SAMPLE_HEADER_SIZE: usize = 22;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescriptor {
    pub kind: TrackKind,
    pub settings: TrackSettings,
}

/// Trailer entry for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSummary {
    pub kind: TrackKind,
    pub samples: u64,
    /// End of the last sample, relative to the anchor.
    pub end: MediaTime,
}

impl TrackSummary {
    pub fn empty(kind: TrackKind) -> Self {
        Self {
            kind,
            samples: 0,
            end: MediaTime::ZERO,
        }
    }

    pub fn record(&mut self, pts: MediaTime, duration: Option<MediaTime>) {
        self.samples += 1;
        self.end = self.end.max(pts + duration.unwrap_or(MediaTime::ZERO));
    }
}

/// Sample record as read back from a file, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord {
    pub kind: TrackKind,
    pub pts: MediaTime,
    pub duration: Option<MediaTime>,
    pub len: u32,
}

/// Everything in a finished file except the payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSummary {
    pub version: u16,
    pub tracks: Vec<TrackDescriptor>,
    pub anchor: Option<MediaTime>,
    pub samples: Vec<SampleRecord>,
    pub trailer: Vec<TrackSummary>,
}

impl ContainerSummary {
    pub fn samples_of(&self, kind: TrackKind) -> impl Iterator<Item = &SampleRecord> {
        self.samples.iter().filter(move |s| s.kind == kind)
    }
}

pub fn encode_header(tracks: &[TrackDescriptor]) -> Result<Vec<u8>, CaptureError> {
    let mut out = Vec::with_capacity(64 * tracks.len() + 7);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(tracks.len() as u8);
    for track in tracks {
        let settings = serde_json::to_vec(&track.settings)
            .map_err(|e| CaptureError::ContainerFailed(format!("failed to encode track settings: {}", e)))?;
        out.push(track.kind.to_u8());
        out.extend_from_slice(&(settings.len() as u32).to_le_bytes());
        out.extend_from_slice(&settings);
    }
    Ok(out)
}

pub fn encode_session(anchor: MediaTime) -> [u8; 9] {
    let mut out = [0u8; 9];
    out[0] = SESSION_TAG;
    out[1..9].copy_from_slice(&anchor.as_nanos().to_le_bytes());
    out
}

pub fn encode_sample_header(
    kind: TrackKind,
    pts: MediaTime,
    duration: Option<MediaTime>,
    len: u32,
) -> [u8; SAMPLE_HEADER_SIZE] {
    let duration = duration.map(MediaTime::as_nanos).unwrap_or(UNKNOWN_DURATION);
    let mut out = [0u8; SAMPLE_HEADER_SIZE];
    out[0] = SAMPLE_TAG;
    out[1] = kind.to_u8();
    out[2..10].copy_from_slice(&pts.as_nanos().to_le_bytes());
    out[10..18].copy_from_slice(&duration.to_le_bytes());
    out[18..22].copy_from_slice(&len.to_le_bytes());
    out
}

pub fn encode_trailer(tracks: &[TrackSummary]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + tracks.len() * 17);
    out.push(TRAILER_TAG);
    out.push(tracks.len() as u8);
    for track in tracks {
        out.push(track.kind.to_u8());
        out.extend_from_slice(&track.samples.to_le_bytes());
        out.extend_from_slice(&track.end.as_nanos().to_le_bytes());
    }
    out
}

/// Parse a finished file.
pub fn read_summary(path: &Path) -> Result<ContainerSummary, CaptureError> {
    let data = fs::read(path).map_err(|e| CaptureError::StorageError(format!("failed to read container: {}", e)))?;
    parse(&data)
}

pub fn parse(data: &[u8]) -> Result<ContainerSummary, CaptureError> {
    let mut cursor = Cursor { data, pos: 0 };

    if cursor.take(4)? != MAGIC {
        return Err(malformed("bad magic"));
    }
    let version = cursor.u16()?;
    if version != VERSION {
        return Err(malformed(&format!("unsupported version {}", version)));
    }

    let track_count = cursor.u8()?;
    let mut tracks = Vec::with_capacity(track_count as usize);
    for _ in 0..track_count {
        let kind = cursor.kind()?;
        let len = cursor.u32()? as usize;
        let settings = serde_json::from_slice(cursor.take(len)?)
            .map_err(|e| malformed(&format!("bad track settings: {}", e)))?;
        tracks.push(TrackDescriptor { kind, settings });
    }

    let mut summary = ContainerSummary {
        version,
        tracks,
        anchor: None,
        samples: Vec::new(),
        trailer: Vec::new(),
    };

    while !cursor.is_at_end() {
        match cursor.u8()? {
            SESSION_TAG => summary.anchor = Some(MediaTime::from_nanos(cursor.i64()?)),
            SAMPLE_TAG => {
                let kind = cursor.kind()?;
                let pts = MediaTime::from_nanos(cursor.i64()?);
                let duration = match cursor.i64()? {
                    UNKNOWN_DURATION => None,
                    nanos => Some(MediaTime::from_nanos(nanos)),
                };
                let len = cursor.u32()?;
                cursor.take(len as usize)?;
                summary.samples.push(SampleRecord {
                    kind,
                    pts,
                    duration,
                    len,
                });
            }
            TRAILER_TAG => {
                let count = cursor.u8()?;
                for _ in 0..count {
                    let kind = cursor.kind()?;
                    let samples = cursor.u64()?;
                    let end = MediaTime::from_nanos(cursor.i64()?);
                    summary.trailer.push(TrackSummary { kind, samples, end });
                }
                if !cursor.is_at_end() {
                    return Err(malformed("data after trailer"));
                }
            }
            tag => return Err(malformed(&format!("unknown record tag {:#04x}", tag))),
        }
    }

    Ok(summary)
}

fn malformed(reason: &str) -> CaptureError {
    CaptureError::StorageError(format!("malformed container: {}", reason))
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CaptureError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len());
        let end = end.ok_or_else(|| malformed("truncated"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CaptureError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CaptureError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CaptureError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, CaptureError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, CaptureError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, CaptureError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn kind(&mut self) -> Result<TrackKind, CaptureError> {
        let raw = self.u8()?;
        TrackKind::from_u8(raw).ok_or_else(|| malformed(&format!("unknown track kind {}", raw)))
    }
}
