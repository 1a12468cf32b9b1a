//! Isotropic wavelet filter banks.
//!
//! One analysis level splits a spectrum into `K` band-pass filters and one
//! low-pass filter whose squared magnitudes sum to one at every frequency.
//! The radial axis is warped so that the `K` bands tile the top octave:
//! with `x = K log2(2 rho)`, band `k` is the kernel evaluated at octave
//! coordinate `x + k`. Band 0 is held at one beyond its peak so the corners
//! of the frequency cube are covered. The low-pass closes the partition and
//! is zero for `rho > 1/2`, which makes the dyadic crop in the pyramid lossless.
//! Because the `K` bands cover the whole top octave, halving the grid at each
//! level discards no spectral content.

use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{WaveletError, WaveletResult};
use crate::float_trait::WaveletFloat;
use crate::grid::Geometry;
use crate::kernel::WaveletFamily;

/// Band-pass and low-pass filters for one pyramid level.
#[derive(Debug, Clone)]
pub struct WaveletFilterSet<F> {
    pub low_pass: ArrayD<F>,
    /// Ordered from the highest-frequency band down.
    pub band_pass: Vec<ArrayD<F>>,
}

impl<F: WaveletFloat> WaveletFilterSet<F> {
    pub fn shape(&self) -> &[usize] {
        self.low_pass.shape()
    }

    pub fn band_count(&self) -> usize {
        self.band_pass.len()
    }
}

/// Generates (and memoizes per shape) the filter sets of one wavelet family.
pub struct WaveletFilterBankGenerator<F: WaveletFloat> {
    family: WaveletFamily,
    bands: usize,
    cache: Mutex<FxHashMap<Vec<usize>, Arc<WaveletFilterSet<F>>>>,
}

impl<F: WaveletFloat> WaveletFilterBankGenerator<F> {
    /// Create a generator with `bands` band-pass filters per level.
    pub fn new(family: WaveletFamily, bands: usize) -> WaveletResult<Self> {
        if bands == 0 {
            return Err(WaveletError::configuration(
                "high_pass_sub_bands",
                "at least one band-pass filter per level is required",
            ));
        }
        Ok(Self {
            family,
            bands,
            cache: Mutex::new(FxHashMap::default()),
        })
    }

    /// Filter set for `geometry`, computed on first use and shared afterwards.
    pub fn filters(&self, geometry: &Geometry) -> WaveletResult<Arc<WaveletFilterSet<F>>> {
        if geometry.is_empty() {
            return Err(WaveletError::geometry("cannot build filters for an empty grid"));
        }
        if let Some(set) = self.lock_cache().get(geometry.shape()) {
            return Ok(Arc::clone(set));
        }
        log::debug!(
            "Building {} filter bank with {} bands for shape {:?}",
            self.family,
            self.bands,
            geometry.shape()
        );
        let set = Arc::new(self.build(geometry)?);
        let mut cache = self.lock_cache();
        Ok(Arc::clone(
            cache.entry(geometry.shape().to_vec()).or_insert(set),
        ))
    }

    /// Number of memoized shapes.
    pub fn cached_shapes(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> MutexGuard<'_, FxHashMap<Vec<usize>, Arc<WaveletFilterSet<F>>>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Band-pass response `k` at warped octave coordinate `x`.
    pub fn band_response(&self, x: f64, k: usize) -> f64 {
        if k == 0 && x > 0.0 {
            return 1.0;
        }
        self.family.octave_magnitude(x + k as f64)
    }

    /// Low-pass response at warped octave coordinate `x`.
    pub fn low_pass_response(&self, x: f64) -> f64 {
        if x + self.bands as f64 > 1.0 {
            return 0.0;
        }
        let band_energy: f64 = (0..self.bands)
            .map(|k| {
                let b = self.band_response(x, k);
                b * b
            })
            .sum();
        (1.0 - band_energy).max(0.0).sqrt()
    }

    /// Warped octave coordinate of a normalized radius; `-inf` at DC.
    pub fn warped_octave(&self, freq_norm: f64) -> f64 {
        if freq_norm <= 0.0 {
            return f64::NEG_INFINITY;
        }
        self.bands as f64 * (2.0 * freq_norm).log2()
    }

    fn build(&self, geometry: &Geometry) -> WaveletResult<WaveletFilterSet<F>> {
        let shape = IxDyn(geometry.shape());
        let warped: Vec<f64> = (0..geometry.len())
            .into_par_iter()
            .map(|flat| self.warped_octave(geometry.normalized_radius(flat)))
            .collect();

        let to_grid = |values: Vec<F>| {
            ArrayD::from_shape_vec(shape.clone(), values)
                .map_err(|e| WaveletError::geometry(e.to_string()))
        };

        let low_pass = to_grid(
            warped
                .par_iter()
                .map(|&x| F::from_f64_c(self.low_pass_response(x)))
                .collect(),
        )?;
        let band_pass = (0..self.bands)
            .map(|k| {
                to_grid(
                    warped
                        .par_iter()
                        .map(|&x| F::from_f64_c(self.band_response(x, k)))
                        .collect(),
                )
            })
            .collect::<WaveletResult<Vec<_>>>()?;

        Ok(WaveletFilterSet {
            low_pass,
            band_pass,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy_error(set: &WaveletFilterSet<f64>) -> f64 {
        let mut worst = 0.0f64;
        for (flat, &low) in set.low_pass.iter().enumerate() {
            let bands: f64 = set
                .band_pass
                .iter()
                .map(|b| {
                    let v = b.as_slice().unwrap()[flat];
                    v * v
                })
                .sum();
            worst = worst.max((bands + low * low - 1.0).abs());
        }
        worst
    }

    #[test]
    fn test_zero_bands_rejected() {
        let err = WaveletFilterBankGenerator::<f64>::new(WaveletFamily::Held, 0)
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_energy_identity_all_families() {
        for family in WaveletFamily::ALL {
            for bands in 1..=3 {
                let generator = WaveletFilterBankGenerator::<f64>::new(family, bands).unwrap();
                for shape in [&[32usize, 32][..], &[16, 8, 12][..], &[7, 9][..]] {
                    let geometry = Geometry::new(shape).unwrap();
                    let set = generator.filters(&geometry).unwrap();
                    assert_eq!(set.band_count(), bands);
                    let err = energy_error(&set);
                    assert!(err < 1e-12, "{} K={} {:?}: {}", family, bands, shape, err);
                }
            }
        }
    }

    #[test]
    fn test_dc_is_pure_low_pass() {
        let generator = WaveletFilterBankGenerator::<f64>::new(WaveletFamily::Simoncelli, 2).unwrap();
        let set = generator.filters(&Geometry::new(&[16, 16]).unwrap()).unwrap();
        assert_eq!(set.low_pass[[0, 0]], 1.0);
        for band in &set.band_pass {
            assert_eq!(band[[0, 0]], 0.0);
        }
    }

    #[test]
    fn test_low_pass_vanishes_above_half_nyquist() {
        for family in WaveletFamily::ALL {
            for bands in 1..=3 {
                let generator = WaveletFilterBankGenerator::<f64>::new(family, bands).unwrap();
                let geometry = Geometry::new(&[24, 16]).unwrap();
                let set = generator.filters(&geometry).unwrap();
                for (flat, &low) in set.low_pass.iter().enumerate() {
                    if geometry.normalized_radius(flat) >= 0.5 {
                        assert_eq!(low, 0.0, "{} K={} flat={}", family, bands, flat);
                    }
                }
            }
        }
    }

    #[test]
    fn test_highest_band_covers_corners() {
        let generator = WaveletFilterBankGenerator::<f64>::new(WaveletFamily::Held, 1).unwrap();
        let set = generator.filters(&Geometry::new(&[8, 8]).unwrap()).unwrap();
        // (-1, -1) in normalized frequency: radius sqrt(2).
        assert_eq!(set.band_pass[0][[4, 4]], 1.0);
        assert_eq!(set.low_pass[[4, 4]], 0.0);
    }

    #[test]
    fn test_filters_are_memoized() {
        let generator = WaveletFilterBankGenerator::<f64>::new(WaveletFamily::Vow, 1).unwrap();
        let geometry = Geometry::new(&[8, 8]).unwrap();
        let a = generator.filters(&geometry).unwrap();
        let b = generator.filters(&geometry).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        generator.filters(&Geometry::new(&[4, 4]).unwrap()).unwrap();
        assert_eq!(generator.cached_shapes(), 2);
    }

    #[test]
    fn test_concurrent_requests_share_one_set() {
        let generator = WaveletFilterBankGenerator::<f64>::new(WaveletFamily::Held, 2).unwrap();
        let geometry = Geometry::new(&[16, 16, 8]).unwrap();
        let sets: Vec<_> = (0..8)
            .into_par_iter()
            .map(|_| generator.filters(&geometry).unwrap())
            .collect();
        for set in &sets {
            assert!(Arc::ptr_eq(set, &sets[0]));
        }
        assert_eq!(generator.cached_shapes(), 1);
    }

    #[test]
    fn test_shannon_bands_are_binary() {
        let generator = WaveletFilterBankGenerator::<f64>::new(WaveletFamily::Shannon, 2).unwrap();
        let set = generator.filters(&Geometry::new(&[32, 32]).unwrap()).unwrap();
        for grid in set.band_pass.iter().chain(std::iter::once(&set.low_pass)) {
            assert!(grid.iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }

    #[test]
    fn test_f32_filters() {
        let generator = WaveletFilterBankGenerator::<f32>::new(WaveletFamily::Held, 2).unwrap();
        let set = generator.filters(&Geometry::new(&[16, 16]).unwrap()).unwrap();
        for (flat, &low) in set.low_pass.iter().enumerate() {
            let total: f32 = low * low
                + set
                    .band_pass
                    .iter()
                    .map(|b| b.as_slice().unwrap()[flat].powi(2))
                    .sum::<f32>();
            assert!((total - 1.0).abs() < 1e-5);
        }
    }
}
