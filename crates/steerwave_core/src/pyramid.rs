//! Frequency-domain isotropic wavelet pyramid.
//!
//! ## Forward transform
//!
//! At each level the current spectrum is multiplied by the `K` band-pass
//! filters (those products are outputs) and by the low-pass filter. The
//! low-passed spectrum is then cropped to its low-frequency half along every
//! axis and scaled by `2^-d`, which is the spectrum of the 2x decimated
//! spatial image. After `L` levels the remaining low-pass spectrum is the
//! residual. Outputs are ordered level-major, band-minor, residual last, for
//! a total of `L * K + 1` spectra.
//!
//! ## Inverse transform
//!
//! Starting from the residual, each level zero-pads the running low-pass
//! spectrum back to the parent shape, multiplies it by the level low-pass
//! filter and adds every band multiplied by its band-pass filter. With
//! reconstruction factors the level `l` bands are scaled by `2^(l d)` and the
//! residual by `2^(L d)`, undoing the decimation scaling exactly.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{WaveletError, WaveletResult};
use crate::filter_bank::{WaveletFilterBankGenerator, WaveletFilterSet};
use crate::float_trait::WaveletFloat;
use crate::grid::{
    accumulate_filtered, apply_filter, expand_spectrum, max_levels, shrink_spectrum, Geometry,
    Spectrum,
};
use crate::kernel::WaveletFamily;

// =============================================================================
// Constants
// =============================================================================

/// Default number of decomposition levels
const DEFAULT_LEVELS: usize = 2;

/// Default number of band-pass filters per level
const DEFAULT_HIGH_PASS_SUB_BANDS: usize = 1;

// =============================================================================
// Configuration
// =============================================================================

/// Pyramid shape and synthesis settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidConfig {
    /// Number of decomposition levels (L). Default: 2
    pub levels: usize,
    /// Band-pass filters per level (K). Default: 1
    pub high_pass_sub_bands: usize,
    /// Radial kernel family. Default: Held
    pub wavelet: WaveletFamily,
    /// Undo the decimation scaling during synthesis. Default: true
    pub apply_reconstruction_factors: bool,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
            high_pass_sub_bands: DEFAULT_HIGH_PASS_SUB_BANDS,
            wavelet: WaveletFamily::default(),
            apply_reconstruction_factors: true,
        }
    }
}

impl PyramidConfig {
    pub fn validate(&self) -> WaveletResult<()> {
        if self.high_pass_sub_bands == 0 {
            return Err(WaveletError::configuration(
                "high_pass_sub_bands",
                "must be >= 1",
            ));
        }
        Ok(())
    }

    /// Total number of pyramid outputs, `L * K + 1`.
    pub fn output_count(&self) -> usize {
        self.levels * self.high_pass_sub_bands + 1
    }

    /// Level and band of an output index; `None` for the residual.
    pub fn output_level_band(&self, index: usize) -> WaveletResult<Option<(usize, usize)>> {
        let residual = self.levels * self.high_pass_sub_bands;
        match index {
            i if i < residual => Ok(Some((
                i / self.high_pass_sub_bands,
                i % self.high_pass_sub_bands,
            ))),
            i if i == residual => Ok(None),
            i => Err(WaveletError::configuration(
                "output_index",
                format!("{} is past the last output {}", i, residual),
            )),
        }
    }

    /// Geometries of levels `0..=L`; level `L` is the residual grid.
    pub fn level_geometries(&self, geometry: &Geometry) -> WaveletResult<Vec<Geometry>> {
        if max_levels(geometry.shape()) < self.levels {
            return Err(WaveletError::geometry(format!(
                "shape {:?} does not support {} levels: every axis must be divisible by {}",
                geometry.shape(),
                self.levels,
                1usize << self.levels
            )));
        }
        let mut geometries = Vec::with_capacity(self.levels + 1);
        geometries.push(geometry.clone());
        for level in 0..self.levels {
            let next = geometries[level].shrunk()?;
            geometries.push(next);
        }
        Ok(geometries)
    }
}

/// `2^exponent` in the working precision.
fn power_of_two<F: WaveletFloat>(exponent: i32) -> F {
    F::from_f64_c(2.0f64.powi(exponent))
}

// =============================================================================
// Coefficients
// =============================================================================

/// Output of the forward pyramid.
#[derive(Debug, Clone)]
pub struct PyramidCoefficients<F: WaveletFloat> {
    config: PyramidConfig,
    outputs: Vec<Spectrum<F>>,
    geometries: Vec<Geometry>,
    filter_sets: Option<Vec<Arc<WaveletFilterSet<F>>>>,
}

impl<F: WaveletFloat> PyramidCoefficients<F> {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    pub fn outputs(&self) -> &[Spectrum<F>] {
        &self.outputs
    }

    pub fn into_outputs(self) -> Vec<Spectrum<F>> {
        self.outputs
    }

    pub fn output_level_band(&self, index: usize) -> WaveletResult<Option<(usize, usize)>> {
        self.config.output_level_band(index)
    }

    /// The `K` band outputs of one level.
    pub fn band_outputs(&self, level: usize) -> Option<&[Spectrum<F>]> {
        if level >= self.config.levels {
            return None;
        }
        let k = self.config.high_pass_sub_bands;
        Some(&self.outputs[level * k..(level + 1) * k])
    }

    /// The low-pass residual (last output).
    pub fn low_pass_output(&self) -> &Spectrum<F> {
        &self.outputs[self.outputs.len() - 1]
    }

    /// Geometry of a level, with spacing doubled per level.
    pub fn level_geometry(&self, level: usize) -> Option<&Geometry> {
        self.geometries.get(level)
    }

    /// Per-level filter sets, when retained at analysis time.
    pub fn filter_sets(&self) -> Option<&[Arc<WaveletFilterSet<F>>]> {
        self.filter_sets.as_deref()
    }
}

// =============================================================================
// Forward pyramid
// =============================================================================

pub struct ForwardPyramid<F: WaveletFloat> {
    config: PyramidConfig,
    generator: Arc<WaveletFilterBankGenerator<F>>,
    retain_filters: bool,
}

impl<F: WaveletFloat> ForwardPyramid<F> {
    pub fn new(config: PyramidConfig) -> WaveletResult<Self> {
        config.validate()?;
        let generator = Arc::new(WaveletFilterBankGenerator::new(
            config.wavelet,
            config.high_pass_sub_bands,
        )?);
        Ok(Self {
            config,
            generator,
            retain_filters: false,
        })
    }

    /// Keep the per-level filter sets in the returned coefficients.
    pub fn retain_filters(mut self, retain: bool) -> Self {
        self.retain_filters = retain;
        self
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Shared filter generator, reusable by the matching inverse.
    pub fn generator(&self) -> Arc<WaveletFilterBankGenerator<F>> {
        Arc::clone(&self.generator)
    }

    pub fn analyze(
        &self,
        spectrum: &Spectrum<F>,
        geometry: &Geometry,
    ) -> WaveletResult<PyramidCoefficients<F>> {
        if !geometry.matches(spectrum) {
            return Err(WaveletError::geometry(format!(
                "spectrum shape {:?} does not match geometry {:?}",
                spectrum.shape(),
                geometry.shape()
            )));
        }
        let geometries = self.config.level_geometries(geometry)?;
        let scale = power_of_two::<F>(-(geometry.dimension() as i32));

        let mut outputs = Vec::with_capacity(self.config.output_count());
        let mut filter_sets = Vec::with_capacity(self.config.levels);
        let mut current = spectrum.clone();

        for (level, level_geometry) in geometries.iter().take(self.config.levels).enumerate() {
            let start = Instant::now();
            let filters = self.generator.filters(level_geometry)?;
            for band in &filters.band_pass {
                outputs.push(apply_filter(&current, band)?);
            }
            let low = apply_filter(&current, &filters.low_pass)?;
            current = shrink_spectrum(&low, scale)?;
            log::debug!(
                "Analysis level {} ({:?}) done in {:.2?}",
                level,
                level_geometry.shape(),
                start.elapsed()
            );
            if self.retain_filters {
                filter_sets.push(filters);
            }
        }
        outputs.push(current);

        Ok(PyramidCoefficients {
            config: self.config,
            outputs,
            geometries,
            filter_sets: self.retain_filters.then_some(filter_sets),
        })
    }
}

// =============================================================================
// Inverse pyramid
// =============================================================================

pub struct InversePyramid<F: WaveletFloat> {
    config: PyramidConfig,
    generator: Arc<WaveletFilterBankGenerator<F>>,
}

impl<F: WaveletFloat> InversePyramid<F> {
    pub fn new(config: PyramidConfig) -> WaveletResult<Self> {
        config.validate()?;
        let generator = Arc::new(WaveletFilterBankGenerator::new(
            config.wavelet,
            config.high_pass_sub_bands,
        )?);
        Ok(Self { config, generator })
    }

    /// Inverse sharing the forward pyramid's filter cache.
    pub fn from_forward(forward: &ForwardPyramid<F>) -> Self {
        Self {
            config: forward.config,
            generator: forward.generator(),
        }
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Reconstruct the full-resolution spectrum described by `geometry`.
    pub fn synthesize(
        &self,
        outputs: &[Spectrum<F>],
        geometry: &Geometry,
    ) -> WaveletResult<Spectrum<F>> {
        let levels = self.config.levels;
        let k = self.config.high_pass_sub_bands;
        if outputs.len() != self.config.output_count() {
            return Err(WaveletError::configuration(
                "outputs",
                format!(
                    "inverse pyramid expects {} spectra ({} levels x {} bands + residual), got {}",
                    self.config.output_count(),
                    levels,
                    k,
                    outputs.len()
                ),
            ));
        }
        let geometries = self.config.level_geometries(geometry)?;
        let dimension = geometry.dimension() as i32;

        let residual = &outputs[levels * k];
        check_level_shape(residual, &geometries[levels], "residual")?;
        let mut low = if self.config.apply_reconstruction_factors {
            let factor = power_of_two::<F>(levels as i32 * dimension);
            residual.mapv(|v| v * factor)
        } else {
            residual.clone()
        };

        for level in (0..levels).rev() {
            let start = Instant::now();
            let level_geometry = &geometries[level];
            let filters = self.generator.filters(level_geometry)?;
            let factor = if self.config.apply_reconstruction_factors {
                power_of_two::<F>(level as i32 * dimension)
            } else {
                F::one()
            };

            let expanded = expand_spectrum(&low, level_geometry.shape())?;
            let mut acc = apply_filter(&expanded, &filters.low_pass)?;
            for (band_index, band_filter) in filters.band_pass.iter().enumerate() {
                let band = &outputs[level * k + band_index];
                check_level_shape(band, level_geometry, "band")?;
                accumulate_filtered(&mut acc, band, band_filter, factor)?;
            }
            low = acc;
            log::debug!(
                "Synthesis level {} ({:?}) done in {:.2?}",
                level,
                level_geometry.shape(),
                start.elapsed()
            );
        }
        Ok(low)
    }
}

fn check_level_shape<F: WaveletFloat>(
    spectrum: &Spectrum<F>,
    geometry: &Geometry,
    what: &str,
) -> WaveletResult<()> {
    if geometry.matches(spectrum) {
        Ok(())
    } else {
        Err(WaveletError::geometry(format!(
            "{} has shape {:?}, expected {:?}",
            what,
            spectrum.shape(),
            geometry.shape()
        )))
    }
}
