use super::media::MediaTime;

/// Sample layout of a PCM block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Interleaved,
    NonInterleaved,
}

/// Native format of the audio input device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcmFormat {
    pub sample_rate: f64,
    pub channels: u16,
    pub layout: ChannelLayout,
}

impl PcmFormat {
    pub fn interleaved(sample_rate: f64, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            layout: ChannelLayout::Interleaved,
        }
    }
}

/// One block of f32 samples delivered by the audio input callback.
///
/// Borrowed from the input's real-time buffer; it must be converted before
/// the callback returns.
#[derive(Debug, Clone, Copy)]
pub struct PcmBlock<'a> {
    pub samples: &'a [f32],
    pub format: PcmFormat,
    /// Host clock reading at capture time.
    pub host_time: MediaTime,
}

impl<'a> PcmBlock<'a> {
    pub fn new(samples: &'a [f32], format: PcmFormat, host_time: MediaTime) -> Self {
        Self {
            samples,
            format,
            host_time,
        }
    }

    /// Number of frames (samples per channel), rounded down.
    pub fn frame_count(&self) -> usize {
        if self.format.channels == 0 {
            return 0;
        }
        self.samples.len() / self.format.channels as usize
    }
}
