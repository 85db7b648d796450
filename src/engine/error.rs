use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("unknown command: {0}")]
  UnknownCommand(String),
  #[error("missing argument for `{0}`")]
  MissingArgument(&'static str),
  #[error("not a number: {0}")]
  InvalidNumber(String),
  #[error("unknown effect: {0}")]
  UnknownEffect(String),
  #[error("no effect `{0}` in the chain")]
  NotInChain(String),
  #[error("unknown parameter: {0}")]
  UnknownParam(String),
  #[error("`{0}` is not available in this mode")]
  Unsupported(&'static str),
  #[error("no sound loaded in slot {0}")]
  EmptySlot(u32),
  #[error("sample rate mismatch in {path}: {found} Hz (engine runs at {expected} Hz)")]
  SampleRateMismatch { path: String, found: u32, expected: u32 },
  #[error("channel mismatch in {path}: {found} channels (engine expects {expected})")]
  ChannelMismatch { path: String, found: usize, expected: usize },
  #[error("failed to decode {path}: {reason}")]
  Decode { path: String, reason: String },
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid config: {0}")]
  Config(#[from] serde_json::Error),
  #[error("audio device error: {0}")]
  Device(String),
  #[error("audio engine is not running")]
  Disconnected,
  #[error("audio engine is busy, try again")]
  Busy,
}

impl EngineError {
  /// Configuration errors leave prior state untouched and are only reported.
  pub fn is_config(&self) -> bool {
    matches!(
      self,
      EngineError::UnknownCommand(_)
        | EngineError::MissingArgument(_)
        | EngineError::InvalidNumber(_)
        | EngineError::UnknownEffect(_)
        | EngineError::NotInChain(_)
        | EngineError::UnknownParam(_)
        | EngineError::EmptySlot(_)
        | EngineError::Unsupported(_)
    )
  }
}

pub type EngineResult<T> = Result<T, EngineError>;
