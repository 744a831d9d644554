/// SessionWriter state machine.
///
/// State transitions:
/// ```text
/// idle → writing → finalizing → closed
///   ↓       ↓
///   failed ←┘
/// ```
///
/// `Idle → Closed` is also taken when a recording is stopped before the
/// first valid video frame arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WriterState {
    Idle = 0,
    Writing = 1,
    Finalizing = 2,
    Closed = 3,
    Failed = 4,
}

impl WriterState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_writing(&self) -> bool {
        matches!(self, Self::Writing)
    }

    /// Closed or failed: the session will never write again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Writing => "writing",
            Self::Finalizing => "finalizing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WriterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status reported by a container writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContainerStatus {
    Unknown = 0,
    Writing = 1,
    Completed = 2,
    Failed = 3,
}

impl ContainerStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Writing,
            2 => Self::Completed,
            3 => Self::Failed,
            _ => Self::Unknown,
        }
    }
}
