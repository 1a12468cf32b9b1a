use std::path::PathBuf;

use thiserror::Error;

use steerwave_core::WaveletError;

/// Every failure the command line reports before exiting non-zero.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("unsupported wavelet function '{0}': use Held, Vow, Simoncelli or Shannon")]
    UnsupportedWavelet(String),

    #[error("unsupported dimension {0}: only 2 or 3 dimensions allowed")]
    UnsupportedDimension(usize),

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF error in {path}: {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("invalid image {path}: {reason}")]
    Image { path: PathBuf, reason: String },

    #[error(transparent)]
    Engine(#[from] WaveletError),
}
