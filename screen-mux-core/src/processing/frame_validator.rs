//! Completeness check for screen samples.
//!
//! The screen channel carries many notifications that are not frames
//! (idle, blank, suspended). Rejecting them is routine and never an error.

use crate::models::video::{AttachmentValue, FrameGeometry, FrameInfoKey, FrameStatus, Rect, VideoFrame};

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameValidator;

impl FrameValidator {
    pub fn new() -> Self {
        Self
    }

    /// Whether `frame` is a complete, well-formed frame.
    pub fn validate(&self, frame: &VideoFrame) -> bool {
        self.inspect(frame).is_some()
    }

    /// Parse the geometry of a complete frame, or `None` if any required
    /// piece is missing, malformed, or the frame is not `Complete`.
    pub fn inspect(&self, frame: &VideoFrame) -> Option<FrameGeometry> {
        if frame.sample.is_empty() {
            log::trace!("rejecting screen sample: empty buffer");
            return None;
        }

        let attachments = frame.attachments.first()?;

        let status = attachments
            .get(&FrameInfoKey::Status)
            .and_then(AttachmentValue::as_i64)
            .and_then(FrameStatus::from_raw)?;
        if status != FrameStatus::Complete {
            log::trace!("rejecting screen sample: status {:?}", status);
            return None;
        }

        // Backing surface
        let surface = frame.surface?;
        if surface.width == 0 || surface.height == 0 {
            return None;
        }

        let content_rect = attachments
            .get(&FrameInfoKey::ContentRect)
            .and_then(AttachmentValue::as_dictionary)
            .and_then(Rect::from_dictionary)?;
        let content_scale = attachments
            .get(&FrameInfoKey::ContentScale)
            .and_then(AttachmentValue::as_f64)?;
        let scale_factor = attachments
            .get(&FrameInfoKey::ScaleFactor)
            .and_then(AttachmentValue::as_f64)?;

        Some(FrameGeometry {
            content_rect,
            content_scale,
            scale_factor,
        })
    }
}
