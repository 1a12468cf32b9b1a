use ndarray::{ArrayD, ArrayViewD, Axis, Zip};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{WaveletError, WaveletResult};
use crate::float_trait::WaveletFloat;
use crate::grid::Spectrum;

/// Pre-computed FFT plans for every axis of an N-dimensional grid.
///
/// Plans are built once and reused for each forward or inverse transform of
/// that shape. Forward transforms are unnormalized; inverse transforms scale
/// by `1/N` so that `inverse(forward(x)) == x`.
pub struct FftPlans<F: WaveletFloat> {
    shape: Vec<usize>,
    forward: Vec<Arc<dyn Fft<F>>>,
    inverse: Vec<Arc<dyn Fft<F>>>,
}

impl<F: WaveletFloat> FftPlans<F> {
    /// Create plans for `shape` with a private planner.
    pub fn new(shape: &[usize]) -> Self {
        let mut planner = FftPlanner::new();
        Self::with_planner(&mut planner, shape)
    }

    /// Create plans for `shape`, sharing a planner's cache of length plans.
    pub fn with_planner(planner: &mut FftPlanner<F>, shape: &[usize]) -> Self {
        let forward = shape.iter().map(|&n| planner.plan_fft_forward(n)).collect();
        let inverse = shape.iter().map(|&n| planner.plan_fft_inverse(n)).collect();
        Self {
            shape: shape.to_vec(),
            forward,
            inverse,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Forward FFT of a real grid.
    pub fn forward(&self, input: ArrayViewD<F>) -> WaveletResult<Spectrum<F>> {
        self.check_shape(input.shape())?;
        let mut data = input.mapv(|v| Complex::new(v, F::zero()));
        self.transform_all_axes(&mut data, &self.forward);
        Ok(data)
    }

    /// Inverse FFT, normalized by `1/N`.
    pub fn inverse(&self, input: &Spectrum<F>) -> WaveletResult<Spectrum<F>> {
        self.check_shape(input.shape())?;
        let mut data = input.clone();
        self.transform_all_axes(&mut data, &self.inverse);
        let norm_factor = F::one() / F::usize_as(data.len());
        data.par_mapv_inplace(|v| v * norm_factor);
        Ok(data)
    }

    /// Inverse FFT keeping only the real part.
    pub fn inverse_real(&self, input: &Spectrum<F>) -> WaveletResult<ArrayD<F>> {
        let complex = self.inverse(input)?;
        Ok(complex.mapv(|v| v.re))
    }

    fn check_shape(&self, shape: &[usize]) -> WaveletResult<()> {
        if shape == self.shape.as_slice() {
            Ok(())
        } else {
            Err(WaveletError::geometry(format!(
                "FFT plans built for {:?}, got grid of shape {:?}",
                self.shape, shape
            )))
        }
    }

    fn transform_all_axes(&self, data: &mut Spectrum<F>, plans: &[Arc<dyn Fft<F>>]) {
        for (axis, plan) in plans.iter().enumerate() {
            if self.shape[axis] < 2 {
                continue;
            }
            Zip::from(data.lanes_mut(Axis(axis))).par_for_each(|mut lane| {
                let mut buffer: Vec<Complex<F>> = lane.iter().copied().collect();
                plan.process(&mut buffer);
                for (dst, src) in lane.iter_mut().zip(buffer) {
                    *dst = src;
                }
            });
        }
    }
}
