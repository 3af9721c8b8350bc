use std::{error, fmt, io};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by shatter.
///
/// Errors are only ever reported from non real-time setup functions. The audio processing path
/// silently clamps out of range values instead.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    InvalidSampleRate(u32),
    UnsupportedChannelCount(usize),
    ParameterError(String),
    AudioFileError(Box<dyn error::Error + Send + Sync>),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSampleRate(sample_rate) => {
                write!(f, "Invalid sample rate: {sample_rate}")
            }
            Self::UnsupportedChannelCount(channel_count) => {
                write!(
                    f,
                    "Unsupported channel count: {channel_count} (only mono or stereo is supported)"
                )
            }
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::AudioFileError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

#[cfg(feature = "wav-output")]
impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Error {
        match err {
            hound::Error::IoError(err) => Error::IoError(err),
            err => Error::AudioFileError(Box::new(err)),
        }
    }
}
