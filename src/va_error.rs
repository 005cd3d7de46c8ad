use std::{error, fmt};

/// Unified error type
///
/// Only loading and baking paths return errors. Playback itself never does:
/// configuration problems disable an animator with a logged warning and
/// out-of-range values are clamped.
#[derive(Debug)]
pub enum VaError {
    EmptyClip,
    NoClips,
    MissingDefaultClip(String),
    CountMismatch { expected: usize, found: usize },
    NonFinitePosition,
    ValueOutOfRange,
    IndexOutOfRange { index: usize, len: usize },
    InvalidLayout,
    SerdeYamlError(Box<serde_yaml::Error>),
    StdIoError(std::io::Error),
}

impl error::Error for VaError {}

impl fmt::Display for VaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EmptyClip => write!(f, "clip contains no frames"),
            Self::NoClips => write!(f, "no clips registered"),
            Self::MissingDefaultClip(name) => {
                write!(f, "default clip \"{name}\" is not registered")
            }
            Self::CountMismatch { expected, found } => {
                write!(f, "count mismatch: expected {expected}, found {found}")
            }
            Self::NonFinitePosition => {
                write!(f, "vertex position is not a finite value")
            }
            Self::ValueOutOfRange => {
                write!(f, "quantized value does not fit in 32 bits")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for length {len}")
            }
            Self::InvalidLayout => {
                write!(f, "compressed clip layout is inconsistent")
            }
            Self::SerdeYamlError(e) => {
                write!(f, "serde_yaml::Error: {e}")
            }
            Self::StdIoError(e) => write!(f, "std::io::Error: {}", e.kind()),
        }
    }
}

impl From<serde_yaml::Error> for VaError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::SerdeYamlError(Box::new(e))
    }
}

impl From<std::io::Error> for VaError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}
