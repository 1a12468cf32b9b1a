//! Steerable Wavelet Core Library
//!
//! Frequency-domain multiresolution analysis of 2-D and 3-D images:
//! an isotropic wavelet pyramid with exact reconstruction, generalized Riesz
//! filter banks of arbitrary order, and per-pixel structure tensor analysis
//! that steers each sub-band towards its locally dominant orientation.
//! Everything is generic over `f32`/`f64` through [`WaveletFloat`].

pub mod error;
pub mod filter_bank;
pub mod float_trait;
pub mod grid;
pub mod kernel;
pub mod orchestration;
pub mod pyramid;
pub mod riesz;
pub mod structure_tensor;
pub mod transforms;

// Re-export commonly used types at the crate root
pub use error::{WaveletError, WaveletResult};
pub use filter_bank::{WaveletFilterBankGenerator, WaveletFilterSet};
pub use float_trait::WaveletFloat;
pub use grid::{max_levels, Geometry, Spectrum};
pub use kernel::WaveletFamily;
pub use orchestration::{steerable_analysis, wavelet_round_trip, AnalysisConfig, SteerableAnalysis};
pub use pyramid::{ForwardPyramid, InversePyramid, PyramidCoefficients, PyramidConfig};
pub use riesz::{
    number_of_components, RieszComponents, RieszConfig, RieszFilterBankGenerator, MAX_RIESZ_ORDER,
};
pub use structure_tensor::{StructureTensor, TensorWindow};
pub use transforms::FftPlans;
