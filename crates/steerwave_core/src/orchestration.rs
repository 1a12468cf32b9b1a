//! End-to-end steerable wavelet analysis.
//!
//! This module wires the transform engine into a single call on a spatial
//! image:
//! - Optional zero-DC centering (the mean is restored at the end)
//! - Forward FFT and isotropic wavelet pyramid
//! - Per band: generalized Riesz bank, inverse FFT of every component,
//!   structure tensor, projection onto the dominant eigenvector
//! - The dominant projections replace the bands; the residual is kept
//! - Inverse pyramid and inverse FFT
//!
//! [`wavelet_round_trip`] runs the same pyramid without touching the bands.

use ndarray::{ArrayD, ArrayViewD};
use rustfft::FftPlanner;
use std::time::Instant;

use crate::error::{WaveletError, WaveletResult};
use crate::float_trait::WaveletFloat;
use crate::grid::{validate_dimension, Geometry, Spectrum};
use crate::kernel::WaveletFamily;
use crate::pyramid::{ForwardPyramid, InversePyramid, PyramidConfig};
use crate::riesz::{RieszConfig, RieszFilterBankGenerator};
use crate::structure_tensor::{
    StructureTensor, TensorWindow, DEFAULT_WINDOW_RADIUS, DEFAULT_WINDOW_SIGMA,
};
use crate::transforms::FftPlans;

// =============================================================================
// Constants
// =============================================================================

/// Default number of pyramid levels
const DEFAULT_LEVELS: usize = 2;

/// Default band-pass filters per level
const DEFAULT_HIGH_PASS_SUB_BANDS: usize = 1;

/// Default generalized Riesz order
const DEFAULT_RIESZ_ORDER: usize = 1;

/// Default image dimension
const DEFAULT_DIMENSION: usize = 3;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for steerable wavelet analysis.
///
/// Use `Default::default()` for standard settings.
#[derive(Debug, Clone)]
pub struct AnalysisConfig<F: WaveletFloat> {
    /// Pyramid levels (L). Default: 2
    pub levels: usize,
    /// Band-pass filters per level (K). Default: 1
    pub high_pass_sub_bands: usize,
    /// Radial kernel family. Default: Held
    pub wavelet: WaveletFamily,
    /// Generalized Riesz order (N). Default: 1
    pub riesz_order: usize,
    /// Undo the pyramid decimation scaling on synthesis. Default: true
    pub apply_reconstruction_factors: bool,
    /// Expected image dimension, 2 or 3. Default: 3
    pub dimension: usize,
    /// Structure tensor window half width; 0 disables smoothing. Default: 2
    pub window_radius: usize,
    /// Structure tensor window standard deviation. Default: 1.0
    pub window_sigma: F,
    /// Remove the image mean before the FFT and restore it afterwards. Default: true
    pub zero_dc: bool,
}

impl<F: WaveletFloat> Default for AnalysisConfig<F> {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
            high_pass_sub_bands: DEFAULT_HIGH_PASS_SUB_BANDS,
            wavelet: WaveletFamily::default(),
            riesz_order: DEFAULT_RIESZ_ORDER,
            apply_reconstruction_factors: true,
            dimension: DEFAULT_DIMENSION,
            window_radius: DEFAULT_WINDOW_RADIUS,
            window_sigma: F::from_f64_c(DEFAULT_WINDOW_SIGMA),
            zero_dc: true,
        }
    }
}

impl<F: WaveletFloat> AnalysisConfig<F> {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> WaveletResult<()> {
        self.pyramid_config().validate()?;
        RieszConfig::new(self.riesz_order)?;
        validate_dimension(self.dimension)?;
        self.window().validate()?;
        Ok(())
    }

    pub fn pyramid_config(&self) -> PyramidConfig {
        PyramidConfig {
            levels: self.levels,
            high_pass_sub_bands: self.high_pass_sub_bands,
            wavelet: self.wavelet,
            apply_reconstruction_factors: self.apply_reconstruction_factors,
        }
    }

    pub fn riesz_config(&self) -> WaveletResult<RieszConfig> {
        RieszConfig::new(self.riesz_order)
    }

    pub fn window(&self) -> TensorWindow {
        TensorWindow {
            radius: self.window_radius,
            sigma: self.window_sigma.as_f64(),
        }
    }

    fn check_image(&self, image: &ArrayViewD<F>) -> WaveletResult<Geometry> {
        if image.ndim() != self.dimension {
            return Err(WaveletError::configuration(
                "dimension",
                format!(
                    "configured for {}-D images, got a {}-D image of shape {:?}",
                    self.dimension,
                    image.ndim(),
                    image.shape()
                ),
            ));
        }
        Geometry::new(image.shape())
    }
}

// =============================================================================
// Results
// =============================================================================

/// Output of [`steerable_analysis`].
#[derive(Debug, Clone)]
pub struct SteerableAnalysis<F: WaveletFloat> {
    /// Image synthesized from the steered bands and the untouched residual.
    pub reconstruction: ArrayD<F>,
    /// Number of pyramid outputs, `L * K + 1`.
    pub pyramid_outputs: usize,
    /// Riesz components per band.
    pub riesz_components: usize,
    /// Dominant-orientation projection of every band, level-major.
    pub dominant_responses: Vec<ArrayD<F>>,
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Copy of `image` with its mean removed when `zero_dc` is set, plus that mean.
fn center<F: WaveletFloat>(image: ArrayViewD<F>, zero_dc: bool) -> (ArrayD<F>, F) {
    if !zero_dc || image.is_empty() {
        return (image.to_owned(), F::zero());
    }
    let mean = image.iter().copied().sum::<F>() / F::usize_as(image.len());
    (image.mapv(|v| v - mean), mean)
}

/// Replace one wavelet band by the spectrum of its dominant Riesz projection.
fn steer_band<F: WaveletFloat>(
    band: &Spectrum<F>,
    riesz: &RieszFilterBankGenerator<F>,
    plans: &FftPlans<F>,
    window: &TensorWindow,
) -> WaveletResult<(Spectrum<F>, ArrayD<F>)> {
    let responses = riesz.components()?.apply(band)?;
    let spatial = responses
        .iter()
        .map(|response| plans.inverse_real(response))
        .collect::<WaveletResult<Vec<_>>>()?;
    let tensor = StructureTensor::compute(spatial, window)?;
    let projection = tensor.projection_with_largest_response()?;
    let steered = plans.forward(projection.view())?;
    Ok((steered, projection))
}

// =============================================================================
// Main Entry Points
// =============================================================================

/// Steer every wavelet band towards its locally dominant orientation and
/// reconstruct.
///
/// # Example
///
/// ```
/// use steerwave_core::{steerable_analysis, AnalysisConfig, WaveletFamily};
/// use ndarray::{ArrayD, IxDyn};
///
/// let image = ArrayD::<f64>::from_shape_fn(IxDyn(&[32, 32]), |i| (i[0] * i[1]) as f64);
/// let config = AnalysisConfig {
///     dimension: 2,
///     wavelet: WaveletFamily::Simoncelli,
///     ..AnalysisConfig::default()
/// };
/// let result = steerable_analysis(image.view(), &config).unwrap();
/// assert_eq!(result.pyramid_outputs, 3);
/// assert_eq!(result.reconstruction.shape(), &[32, 32]);
/// ```
pub fn steerable_analysis<F: WaveletFloat>(
    image: ArrayViewD<F>,
    config: &AnalysisConfig<F>,
) -> WaveletResult<SteerableAnalysis<F>> {
    config.validate()?;
    let geometry = config.check_image(&image)?;
    let total = Instant::now();

    let (centered, mean) = center(image, config.zero_dc);
    let mut planner = FftPlanner::new();
    let plans = FftPlans::with_planner(&mut planner, geometry.shape());
    let spectrum = plans.forward(centered.view())?;

    let stage = Instant::now();
    let forward = ForwardPyramid::new(config.pyramid_config())?;
    let coefficients = forward.analyze(&spectrum, &geometry)?;
    log::info!(
        "Forward pyramid: {} outputs in {:.2?}",
        coefficients.len(),
        stage.elapsed()
    );

    let stage = Instant::now();
    let riesz_config = config.riesz_config()?;
    let window = config.window();
    let mut modified = Vec::with_capacity(coefficients.len());
    let mut dominant_responses = Vec::with_capacity(coefficients.len().saturating_sub(1));
    let mut riesz_components = 0;

    for level in 0..config.levels {
        let level_geometry = coefficients
            .level_geometry(level)
            .ok_or_else(|| WaveletError::geometry(format!("missing geometry for level {}", level)))?
            .clone();
        let bands = coefficients
            .band_outputs(level)
            .ok_or_else(|| WaveletError::geometry(format!("missing bands for level {}", level)))?;
        let level_plans = FftPlans::with_planner(&mut planner, level_geometry.shape());
        let riesz = RieszFilterBankGenerator::new(level_geometry, riesz_config);
        riesz_components = riesz.number_of_components()?;

        for (band_index, band) in bands.iter().enumerate() {
            let (steered, projection) = steer_band(band, &riesz, &level_plans, &window)?;
            log::debug!(
                "Level {} band {}: steered over {} Riesz components",
                level,
                band_index,
                riesz_components
            );
            modified.push(steered);
            dominant_responses.push(projection);
        }
    }
    modified.push(coefficients.low_pass_output().clone());
    log::info!(
        "Riesz steering of {} bands in {:.2?}",
        dominant_responses.len(),
        stage.elapsed()
    );

    let stage = Instant::now();
    let inverse = InversePyramid::from_forward(&forward);
    let rebuilt = inverse.synthesize(&modified, &geometry)?;
    let mut reconstruction = plans.inverse_real(&rebuilt)?;
    if config.zero_dc {
        reconstruction.mapv_inplace(|v| v + mean);
    }
    log::info!("Inverse pyramid in {:.2?}", stage.elapsed());
    log::info!(
        "Steerable analysis of {:?} done in {:.2?}",
        geometry.shape(),
        total.elapsed()
    );

    Ok(SteerableAnalysis {
        reconstruction,
        pyramid_outputs: modified.len(),
        riesz_components,
        dominant_responses,
    })
}

/// Forward and inverse pyramid with unmodified bands.
pub fn wavelet_round_trip<F: WaveletFloat>(
    image: ArrayViewD<F>,
    config: &AnalysisConfig<F>,
) -> WaveletResult<ArrayD<F>> {
    config.validate()?;
    let geometry = config.check_image(&image)?;
    let start = Instant::now();

    let (centered, mean) = center(image, config.zero_dc);
    let plans = FftPlans::new(geometry.shape());
    let spectrum = plans.forward(centered.view())?;

    let forward = ForwardPyramid::new(config.pyramid_config())?;
    let coefficients = forward.analyze(&spectrum, &geometry)?;
    let inverse = InversePyramid::from_forward(&forward);
    let rebuilt = inverse.synthesize(coefficients.outputs(), &geometry)?;

    let mut reconstruction = plans.inverse_real(&rebuilt)?;
    if config.zero_dc {
        reconstruction.mapv_inplace(|v| v + mean);
    }
    log::info!(
        "Wavelet round trip of {:?} ({} outputs) in {:.2?}",
        geometry.shape(),
        coefficients.len(),
        start.elapsed()
    );
    Ok(reconstruction)
}

// =============================================================================
// Tests
// =============================================================================
