//! Generalized Riesz transform filter banks.
//!
//! For order `N` in `d` dimensions there is one component per multi-index
//! `alpha` with `|alpha| = N`. Component `alpha` multiplies the spectrum by
//!
//! ```text
//! sqrt(N! / prod(alpha_i!)) * prod((-i * w_i / |w|) ^ alpha_i)
//! ```
//!
//! which is zero at `w = 0`. The squared magnitudes of all components sum to
//! one away from DC, so the bank is a tight frame on top of each wavelet band.

use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{WaveletError, WaveletResult};
use crate::float_trait::WaveletFloat;
use crate::grid::{apply_complex_filter, validate_dimension, Geometry, Spectrum};

/// Largest accepted Riesz order. Order 32 already needs 561 full-size complex
/// grids per band in 3-D.
pub const MAX_RIESZ_ORDER: usize = 32;

/// Number of order-`order` Riesz components in `dimension` dimensions,
/// `C(order + dimension - 1, dimension - 1)`; `None` if it overflows `usize`.
pub fn number_of_components(order: usize, dimension: usize) -> Option<usize> {
    (1..dimension).try_fold(1usize, |acc, i| {
        acc.checked_mul(order.checked_add(i)?).map(|product| product / i)
    })
}

/// Multi-indices of total degree `order` over `dimension` axes, ordered by
/// decreasing first entry, then decreasing second entry, and so on.
pub fn multi_indices(order: usize, dimension: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::with_capacity(number_of_components(order, dimension).unwrap_or(0));
    let mut current = Vec::with_capacity(dimension);
    push_compositions(order, dimension, &mut current, &mut out);
    out
}

fn push_compositions(
    remaining: usize,
    parts: usize,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if parts == 1 {
        current.push(remaining);
        out.push(current.clone());
        current.pop();
        return;
    }
    for first in (0..=remaining).rev() {
        current.push(first);
        push_compositions(remaining - first, parts - 1, current, out);
        current.pop();
    }
}

/// Riesz transform settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RieszConfig {
    order: usize,
}

impl RieszConfig {
    pub fn new(order: usize) -> WaveletResult<Self> {
        validate_order(order)?;
        Ok(Self { order })
    }

    pub fn order(&self) -> usize {
        self.order
    }
}

fn validate_order(order: usize) -> WaveletResult<()> {
    if order == 0 {
        return Err(WaveletError::configuration(
            "riesz_order",
            "order must be >= 1, got 0",
        ));
    }
    if order > MAX_RIESZ_ORDER {
        return Err(WaveletError::configuration(
            "riesz_order",
            format!("order must be <= {}, got {}", MAX_RIESZ_ORDER, order),
        ));
    }
    Ok(())
}

/// The complete set of Riesz filters for one geometry.
#[derive(Debug, Clone)]
pub struct RieszComponents<F> {
    indices: Vec<Vec<usize>>,
    filters: Vec<Spectrum<F>>,
}

impl<F: WaveletFloat> RieszComponents<F> {
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn indices(&self) -> &[Vec<usize>] {
        &self.indices
    }

    pub fn filters(&self) -> &[Spectrum<F>] {
        &self.filters
    }

    /// Multiply `band` by every component filter.
    pub fn apply(&self, band: &Spectrum<F>) -> WaveletResult<Vec<Spectrum<F>>> {
        self.filters
            .iter()
            .map(|filter| apply_complex_filter(band, filter))
            .collect()
    }
}

/// Builds the Riesz components for a fixed geometry, caching the last bank.
pub struct RieszFilterBankGenerator<F: WaveletFloat> {
    geometry: Geometry,
    config: RieszConfig,
    cache: Mutex<Option<Arc<RieszComponents<F>>>>,
}

impl<F: WaveletFloat> RieszFilterBankGenerator<F> {
    pub fn new(geometry: Geometry, config: RieszConfig) -> Self {
        Self {
            geometry,
            config,
            cache: Mutex::new(None),
        }
    }

    /// Generator sized to a reference spectrum, with unit spacing.
    pub fn from_reference(reference: &Spectrum<F>, config: RieszConfig) -> WaveletResult<Self> {
        Ok(Self::new(Geometry::of(reference)?, config))
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn order(&self) -> usize {
        self.config.order
    }

    pub fn number_of_components(&self) -> WaveletResult<usize> {
        number_of_components(self.config.order, self.geometry.dimension()).ok_or_else(|| {
            WaveletError::configuration(
                "riesz_order",
                format!(
                    "order {} has too many components in {} dimensions",
                    self.config.order,
                    self.geometry.dimension()
                ),
            )
        })
    }

    pub fn indices(&self) -> Vec<Vec<usize>> {
        multi_indices(self.config.order, self.geometry.dimension())
    }

    /// Change the order, dropping any cached bank. Returns the new component count.
    pub fn set_order(&mut self, order: usize) -> WaveletResult<usize> {
        validate_order(order)?;
        self.config.order = order;
        *self
            .cache
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        self.number_of_components()
    }

    /// The component filters, built on first use.
    ///
    /// The bank is built without holding the cache lock; if two callers race,
    /// the first bank stored wins and both receive it.
    pub fn components(&self) -> WaveletResult<Arc<RieszComponents<F>>> {
        validate_dimension(self.geometry.dimension())?;
        if let Some(bank) = self.lock_cache().as_ref() {
            return Ok(Arc::clone(bank));
        }
        log::debug!(
            "Building order-{} Riesz bank ({} components) for shape {:?}",
            self.config.order,
            self.number_of_components()?,
            self.geometry.shape()
        );
        let bank = Arc::new(self.build()?);
        Ok(Arc::clone(self.lock_cache().get_or_insert(bank)))
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<Arc<RieszComponents<F>>>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build(&self) -> WaveletResult<RieszComponents<F>> {
        let order = self.config.order;
        let dimension = self.geometry.dimension();
        let indices = multi_indices(order, dimension);

        // Unit direction of every frequency point, zero at DC.
        let directions: Vec<Vec<f64>> = (0..self.geometry.len())
            .into_par_iter()
            .map(|flat| {
                let mut w = vec![0.0; dimension];
                self.geometry.physical_frequency(flat, &mut w);
                let norm = w.iter().map(|v| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    w.iter_mut().for_each(|v| *v /= norm);
                } else {
                    w.clear();
                }
                w
            })
            .collect();

        let phase = minus_i_power(order);
        let filters = indices
            .iter()
            .map(|alpha| {
                let weight = multinomial(order, alpha).sqrt();
                let values: Vec<Complex<F>> = directions
                    .par_iter()
                    .map(|dir| {
                        if dir.is_empty() {
                            return Complex::new(F::zero(), F::zero());
                        }
                        let monomial: f64 = dir
                            .iter()
                            .zip(alpha.iter())
                            .map(|(&w, &a)| w.powi(a as i32))
                            .product();
                        let value = phase * (weight * monomial);
                        Complex::new(F::from_f64_c(value.re), F::from_f64_c(value.im))
                    })
                    .collect();
                ArrayD::from_shape_vec(IxDyn(self.geometry.shape()), values)
                    .map_err(|e| WaveletError::geometry(e.to_string()))
            })
            .collect::<WaveletResult<Vec<_>>>()?;

        Ok(RieszComponents { indices, filters })
    }
}

/// `(-i)^n`
fn minus_i_power(n: usize) -> Complex<f64> {
    match n % 4 {
        0 => Complex::new(1.0, 0.0),
        1 => Complex::new(0.0, -1.0),
        2 => Complex::new(-1.0, 0.0),
        _ => Complex::new(0.0, 1.0),
    }
}

/// `n! / prod(alpha_i!)`
fn multinomial(n: usize, alpha: &[usize]) -> f64 {
    let mut value = 1.0;
    let mut k = 0usize;
    for &a in alpha {
        for j in 1..=a {
            k += 1;
            value *= k as f64 / j as f64;
        }
    }
    debug_assert_eq!(k, n);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::FftPlans;

    #[test]
    fn test_component_counts() {
        assert_eq!(number_of_components(1, 3), Some(3));
        assert_eq!(number_of_components(2, 3), Some(6));
        assert_eq!(number_of_components(1, 2), Some(2));
        assert_eq!(number_of_components(3, 2), Some(4));
        assert_eq!(number_of_components(4, 3), Some(15));
        assert_eq!(number_of_components(MAX_RIESZ_ORDER, 3), Some(561));
    }

    #[test]
    fn test_component_count_overflow_is_detected() {
        assert_eq!(number_of_components(usize::MAX, 2), None);
        assert_eq!(number_of_components(usize::MAX, 3), None);
        assert_eq!(number_of_components(usize::MAX / 2, 3), None);
    }

    #[test]
    fn test_order_above_cap_rejected() {
        assert!(RieszConfig::new(usize::MAX).unwrap_err().is_configuration());
        assert!(RieszConfig::new(MAX_RIESZ_ORDER + 1).is_err());
        assert_eq!(RieszConfig::new(MAX_RIESZ_ORDER).unwrap().order(), MAX_RIESZ_ORDER);

        let geometry = Geometry::new(&[4, 4]).unwrap();
        let mut generator =
            RieszFilterBankGenerator::<f64>::new(geometry, RieszConfig::new(2).unwrap());
        assert!(generator.set_order(usize::MAX).unwrap_err().is_configuration());
        assert_eq!(generator.order(), 2);
        assert_eq!(generator.number_of_components().unwrap(), 3);
    }

    #[test]
    fn test_multi_index_order() {
        assert_eq!(multi_indices(1, 2), vec![vec![1, 0], vec![0, 1]]);
        assert_eq!(
            multi_indices(2, 3),
            vec![
                vec![2, 0, 0],
                vec![1, 1, 0],
                vec![1, 0, 1],
                vec![0, 2, 0],
                vec![0, 1, 1],
                vec![0, 0, 2],
            ]
        );
        for order in 1..5 {
            for dim in 2..=3 {
                assert_eq!(
                    Some(multi_indices(order, dim).len()),
                    number_of_components(order, dim)
                );
            }
        }
    }

    #[test]
    fn test_multinomial_weights() {
        assert_eq!(multinomial(2, &[1, 1, 0]), 2.0);
        assert_eq!(multinomial(3, &[2, 1]), 3.0);
        assert_eq!(multinomial(4, &[2, 2]), 6.0);
        assert_eq!(multinomial(1, &[0, 1]), 1.0);
    }

    #[test]
    fn test_zero_order_rejected() {
        assert!(RieszConfig::new(0).unwrap_err().is_configuration());
        let geometry = Geometry::new(&[8, 8]).unwrap();
        let mut generator =
            RieszFilterBankGenerator::<f64>::new(geometry, RieszConfig::new(1).unwrap());
        assert!(generator.set_order(0).is_err());
        assert_eq!(generator.order(), 1);
    }

    #[test]
    fn test_set_order_returns_count_and_rebuilds() {
        let geometry = Geometry::new(&[8, 8, 8]).unwrap();
        let mut generator =
            RieszFilterBankGenerator::<f64>::new(geometry, RieszConfig::new(1).unwrap());
        assert_eq!(generator.components().unwrap().len(), 3);
        assert_eq!(generator.set_order(2).unwrap(), 6);
        let bank = generator.components().unwrap();
        assert_eq!(bank.len(), 6);
        assert_eq!(bank.indices()[1], vec![1, 1, 0]);
    }

    #[test]
    fn test_concurrent_requests_share_one_bank() {
        let geometry = Geometry::new(&[8, 8, 8]).unwrap();
        let generator =
            RieszFilterBankGenerator::<f64>::new(geometry, RieszConfig::new(2).unwrap());
        let banks: Vec<_> = (0..8)
            .into_par_iter()
            .map(|_| generator.components().unwrap())
            .collect();
        for bank in &banks {
            assert!(Arc::ptr_eq(bank, &banks[0]));
        }
    }

    #[test]
    fn test_tight_frame_and_dc() {
        for (shape, order) in [(&[8usize, 12][..], 1), (&[8, 8][..], 3), (&[4, 6, 8][..], 2)] {
            let geometry = Geometry::new(shape).unwrap();
            let generator =
                RieszFilterBankGenerator::<f64>::new(geometry, RieszConfig::new(order).unwrap());
            let bank = generator.components().unwrap();
            let total = bank
                .filters()
                .iter()
                .fold(ArrayD::<f64>::zeros(IxDyn(shape)), |acc, f| {
                    acc + f.mapv(|v| v.norm_sqr())
                });
            for (flat, &value) in total.iter().enumerate() {
                if flat == 0 {
                    assert_eq!(value, 0.0);
                } else {
                    assert!((value - 1.0).abs() < 1e-12, "{:?} N={} flat={}", shape, order, flat);
                }
            }
        }
    }

    #[test]
    fn test_first_order_is_directional_hilbert() {
        // A cosine varying along axis 1 only excites the axis-1 component,
        // which turns it into a sine of the same amplitude.
        let n = 16;
        let image = ArrayD::from_shape_fn(IxDyn(&[n, n]), |idx| {
            (2.0 * std::f64::consts::PI * 3.0 * idx[1] as f64 / n as f64).cos()
        });
        let plans = FftPlans::<f64>::new(&[n, n]);
        let spectrum = plans.forward(image.view()).unwrap();
        let generator =
            RieszFilterBankGenerator::<f64>::from_reference(&spectrum, RieszConfig::new(1).unwrap())
                .unwrap();
        let responses = generator.components().unwrap().apply(&spectrum).unwrap();
        assert_eq!(responses.len(), 2);

        let along_0 = plans.inverse_real(&responses[0]).unwrap();
        let along_1 = plans.inverse_real(&responses[1]).unwrap();
        assert!(along_0.iter().all(|v| v.abs() < 1e-12));
        for (idx, &v) in along_1.indexed_iter() {
            let expected = (2.0 * std::f64::consts::PI * 3.0 * idx[1] as f64 / n as f64).sin();
            assert!((v - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_odd_grid_outputs_are_real() {
        let shape = [9usize, 15];
        let image = ArrayD::from_shape_fn(IxDyn(&shape), |idx| {
            ((idx[0] * 7 + idx[1] * 3) % 11) as f64 - 5.0
        });
        let plans = FftPlans::<f64>::new(&shape);
        let spectrum = plans.forward(image.view()).unwrap();
        for order in 1..=3 {
            let generator = RieszFilterBankGenerator::<f64>::from_reference(
                &spectrum,
                RieszConfig::new(order).unwrap(),
            )
            .unwrap();
            for response in generator.components().unwrap().apply(&spectrum).unwrap() {
                let spatial = plans.inverse(&response).unwrap();
                assert!(spatial.iter().all(|v| v.im.abs() < 1e-10));
            }
        }
    }

    #[test]
    fn test_apply_rejects_mismatched_band() {
        let generator = RieszFilterBankGenerator::<f64>::new(
            Geometry::new(&[8, 8]).unwrap(),
            RieszConfig::new(1).unwrap(),
        );
        let band = Spectrum::<f64>::zeros(IxDyn(&[4, 4]));
        assert!(generator.components().unwrap().apply(&band).is_err());
    }
}
