use std::collections::HashMap;

use super::media::RawSample;

/// Delivery status the capture platform attaches to every screen sample.
///
/// Raw values follow the platform's frame-status numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    Complete,
    Idle,
    Blank,
    Suspended,
    Started,
    Stopped,
}

impl FrameStatus {
    pub fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Complete),
            1 => Some(Self::Idle),
            2 => Some(Self::Blank),
            3 => Some(Self::Suspended),
            4 => Some(Self::Started),
            5 => Some(Self::Stopped),
            _ => None,
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            Self::Complete => 0,
            Self::Idle => 1,
            Self::Blank => 2,
            Self::Suspended => 3,
            Self::Started => 4,
            Self::Stopped => 5,
        }
    }
}

/// Keys of the per-frame info dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameInfoKey {
    Status,
    ContentRect,
    ContentScale,
    ScaleFactor,
}

/// Loosely typed attachment value, as delivered by the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentValue {
    Integer(i64),
    Float(f64),
    Dictionary(HashMap<String, AttachmentValue>),
}

impl AttachmentValue {
    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Dictionary(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&HashMap<String, AttachmentValue>> {
        match self {
            Self::Dictionary(d) => Some(d),
            _ => None,
        }
    }
}

pub type FrameAttachments = HashMap<FrameInfoKey, AttachmentValue>;

/// Handle to the GPU surface backing a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRef {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Parse a rect from its dictionary representation
    /// (`X`, `Y`, `Width`, `Height`).
    pub fn from_dictionary(dict: &HashMap<String, AttachmentValue>) -> Option<Self> {
        let field = |name: &str| dict.get(name).and_then(AttachmentValue::as_f64).filter(|v| v.is_finite());
        Some(Self {
            x: field("X")?,
            y: field("Y")?,
            width: field("Width")?,
            height: field("Height")?,
        })
    }

    pub fn to_dictionary(&self) -> HashMap<String, AttachmentValue> {
        HashMap::from([
            ("X".to_string(), AttachmentValue::Float(self.x)),
            ("Y".to_string(), AttachmentValue::Float(self.y)),
            ("Width".to_string(), AttachmentValue::Float(self.width)),
            ("Height".to_string(), AttachmentValue::Float(self.height)),
        ])
    }
}

/// Geometry metadata a complete frame must carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub content_rect: Rect,
    pub content_scale: f64,
    pub scale_factor: f64,
}

impl FrameGeometry {
    /// Attachment dictionary for a frame with this geometry and `status`.
    pub fn attachments(&self, status: FrameStatus) -> FrameAttachments {
        HashMap::from([
            (FrameInfoKey::Status, AttachmentValue::Integer(status.raw())),
            (
                FrameInfoKey::ContentRect,
                AttachmentValue::Dictionary(self.content_rect.to_dictionary()),
            ),
            (FrameInfoKey::ContentScale, AttachmentValue::Float(self.content_scale)),
            (FrameInfoKey::ScaleFactor, AttachmentValue::Float(self.scale_factor)),
        ])
    }
}

/// A screen sample together with the platform metadata attached to it.
///
/// Only the first element of `attachments` is consulted, matching how the
/// platform delivers one info dictionary per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub sample: RawSample,
    pub surface: Option<SurfaceRef>,
    pub attachments: Vec<FrameAttachments>,
}

impl VideoFrame {
    pub fn new(sample: RawSample, surface: Option<SurfaceRef>, attachments: Vec<FrameAttachments>) -> Self {
        Self {
            sample,
            surface,
            attachments,
        }
    }

    pub fn into_sample(self) -> RawSample {
        self.sample
    }
}
