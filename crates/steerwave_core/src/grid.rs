//! Grid geometry and frequency-domain bookkeeping.
//!
//! Grids are plain `ndarray::ArrayD` values in standard (C) layout, in the
//! unshifted FFT ordering: along an axis of length `n`, index `i` holds the
//! signed frequency `i` for `i < ceil(n/2)` and `i - n` otherwise.
//!
//! A [`Geometry`] pairs the shape with a physical spacing and answers the two
//! questions every filter generator asks about a flat index: where is it
//! relative to Nyquist, and which physical direction does it point to.

use ndarray::{ArrayD, IxDyn, Zip};
use rustfft::num_complex::Complex;

use crate::error::{WaveletError, WaveletResult};
use crate::float_trait::WaveletFloat;

/// Complex frequency-domain grid.
pub type Spectrum<F> = ArrayD<Complex<F>>;

/// Supported grid dimensions.
pub const SUPPORTED_DIMENSIONS: [usize; 2] = [2, 3];

/// Shape and physical spacing of an N-dimensional grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    shape: Vec<usize>,
    spacing: Vec<f64>,
}

impl Geometry {
    /// Geometry with unit spacing along every axis.
    pub fn new(shape: &[usize]) -> WaveletResult<Self> {
        Self::with_spacing(shape, &vec![1.0; shape.len()])
    }

    /// Geometry with explicit spacing.
    pub fn with_spacing(shape: &[usize], spacing: &[f64]) -> WaveletResult<Self> {
        validate_dimension(shape.len())?;
        if spacing.len() != shape.len() {
            return Err(WaveletError::geometry(format!(
                "spacing has {} entries for a {}-D shape",
                spacing.len(),
                shape.len()
            )));
        }
        if let Some(axis) = shape.iter().position(|&n| n == 0) {
            return Err(WaveletError::geometry(format!(
                "axis {} has zero extent in shape {:?}",
                axis, shape
            )));
        }
        if let Some(axis) = spacing.iter().position(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(WaveletError::geometry(format!(
                "axis {} has non-positive spacing {}",
                axis, spacing[axis]
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            spacing: spacing.to_vec(),
        })
    }

    /// Unit-spacing geometry matching an array's shape.
    pub fn of<T>(array: &ArrayD<T>) -> WaveletResult<Self> {
        Self::new(array.shape())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    pub fn dimension(&self) -> usize {
        self.shape.len()
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Always false: zero extents are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Geometry after one dyadic subsampling step: every axis halved, spacing doubled.
    pub fn shrunk(&self) -> WaveletResult<Self> {
        if let Some(axis) = self.shape.iter().position(|&n| n < 2 || n % 2 != 0) {
            return Err(WaveletError::geometry(format!(
                "axis {} of shape {:?} cannot be halved",
                axis, self.shape
            )));
        }
        Ok(Self {
            shape: self.shape.iter().map(|&n| n / 2).collect(),
            spacing: self.spacing.iter().map(|&s| s * 2.0).collect(),
        })
    }

    /// Whether the shape matches an array's shape.
    pub fn matches<T>(&self, array: &ArrayD<T>) -> bool {
        array.shape() == self.shape.as_slice()
    }

    /// Fill `out` with the Nyquist-normalized frequency of a flat (C-order) index.
    ///
    /// Along each axis the value is `2k/n`, so it lies in `[-1, 1)`.
    pub fn normalized_frequency(&self, flat: usize, out: &mut [f64]) {
        let mut rest = flat;
        for axis in (0..self.shape.len()).rev() {
            let n = self.shape[axis];
            let k = signed_frequency_index(rest % n, n);
            rest /= n;
            out[axis] = 2.0 * k as f64 / n as f64;
        }
    }

    /// Euclidean norm of the Nyquist-normalized frequency, in `[0, sqrt(d)]`.
    pub fn normalized_radius(&self, flat: usize) -> f64 {
        let mut rest = flat;
        let mut sum_sq = 0.0;
        for axis in (0..self.shape.len()).rev() {
            let n = self.shape[axis];
            let k = signed_frequency_index(rest % n, n);
            rest /= n;
            let f = 2.0 * k as f64 / n as f64;
            sum_sq += f * f;
        }
        sum_sq.sqrt()
    }

    /// Fill `out` with the physical frequency (cycles per unit length) of a flat index.
    pub fn physical_frequency(&self, flat: usize, out: &mut [f64]) {
        let mut rest = flat;
        for axis in (0..self.shape.len()).rev() {
            let n = self.shape[axis];
            let k = signed_frequency_index(rest % n, n);
            rest /= n;
            out[axis] = k as f64 / (n as f64 * self.spacing[axis]);
        }
    }
}

/// Reject dimensions other than 2 or 3.
pub fn validate_dimension(dimension: usize) -> WaveletResult<()> {
    if SUPPORTED_DIMENSIONS.contains(&dimension) {
        Ok(())
    } else {
        Err(WaveletError::configuration(
            "dimension",
            format!("only 2 or 3 dimensions allowed, {} selected", dimension),
        ))
    }
}

/// Signed FFT frequency of index `i` on an axis of length `n`.
#[inline]
pub fn signed_frequency_index(i: usize, n: usize) -> isize {
    if i < n.div_ceil(2) {
        i as isize
    } else {
        i as isize - n as isize
    }
}

/// Number of dyadic levels every axis of `shape` supports.
pub fn max_levels(shape: &[usize]) -> usize {
    shape
        .iter()
        .map(|&n| if n == 0 { 0 } else { n.trailing_zeros() as usize })
        .min()
        .unwrap_or(0)
}

/// Source index in the parent axis for index `j` of the shrunk axis of length `m`.
#[inline]
fn shrink_source(j: usize, m: usize, n: usize) -> usize {
    if j < m.div_ceil(2) {
        j
    } else {
        n - (m - j)
    }
}

/// Keep the low-frequency half of the spectrum along every axis, scaled by `scale`.
///
/// The retained window is the first `ceil(m/2)` and last `floor(m/2)` indices
/// of each axis, `m = n/2`. Frequencies outside the window must already be
/// zero for the step to be lossless.
pub fn shrink_spectrum<F: WaveletFloat>(
    spectrum: &Spectrum<F>,
    scale: F,
) -> WaveletResult<Spectrum<F>> {
    let parent = spectrum.shape().to_vec();
    if let Some(axis) = parent.iter().position(|&n| n < 2 || n % 2 != 0) {
        return Err(WaveletError::geometry(format!(
            "cannot shrink axis {} of shape {:?}",
            axis, parent
        )));
    }
    let child: Vec<usize> = parent.iter().map(|&n| n / 2).collect();
    let mut source = vec![0usize; parent.len()];
    let shrunk = ArrayD::from_shape_fn(IxDyn(&child), |idx| {
        for axis in 0..child.len() {
            source[axis] = shrink_source(idx[axis], child[axis], parent[axis]);
        }
        spectrum[&source[..]] * scale
    });
    Ok(shrunk)
}

/// Zero-pad a spectrum into the parent shape; exact inverse of [`shrink_spectrum`]
/// up to its scale.
pub fn expand_spectrum<F: WaveletFloat>(
    spectrum: &Spectrum<F>,
    target_shape: &[usize],
) -> WaveletResult<Spectrum<F>> {
    let child = spectrum.shape().to_vec();
    if target_shape.len() != child.len()
        || target_shape
            .iter()
            .zip(child.iter())
            .any(|(&n, &m)| n != 2 * m)
    {
        return Err(WaveletError::geometry(format!(
            "cannot expand shape {:?} into {:?}",
            child, target_shape
        )));
    }
    let mut expanded = Spectrum::<F>::zeros(IxDyn(target_shape));
    let mut target = vec![0usize; child.len()];
    for (idx, &value) in spectrum.indexed_iter() {
        for axis in 0..child.len() {
            target[axis] = shrink_source(idx[axis], child[axis], target_shape[axis]);
        }
        expanded[&target[..]] = value;
    }
    Ok(expanded)
}

/// Multiply a spectrum by a real filter of the same shape.
pub fn apply_filter<F: WaveletFloat>(
    spectrum: &Spectrum<F>,
    filter: &ArrayD<F>,
) -> WaveletResult<Spectrum<F>> {
    check_same_shape(spectrum.shape(), filter.shape())?;
    Ok(Zip::from(spectrum)
        .and(filter)
        .par_map_collect(|&s, &h| s * h))
}

/// Multiply a spectrum by a complex filter of the same shape.
pub fn apply_complex_filter<F: WaveletFloat>(
    spectrum: &Spectrum<F>,
    filter: &Spectrum<F>,
) -> WaveletResult<Spectrum<F>> {
    check_same_shape(spectrum.shape(), filter.shape())?;
    Ok(Zip::from(spectrum)
        .and(filter)
        .par_map_collect(|&s, &h| s * h))
}

/// `accumulator += spectrum * filter * factor`, elementwise.
pub fn accumulate_filtered<F: WaveletFloat>(
    accumulator: &mut Spectrum<F>,
    spectrum: &Spectrum<F>,
    filter: &ArrayD<F>,
    factor: F,
) -> WaveletResult<()> {
    check_same_shape(accumulator.shape(), spectrum.shape())?;
    check_same_shape(accumulator.shape(), filter.shape())?;
    Zip::from(accumulator)
        .and(spectrum)
        .and(filter)
        .par_for_each(|acc, &s, &h| *acc += s * (h * factor));
    Ok(())
}

fn check_same_shape(a: &[usize], b: &[usize]) -> WaveletResult<()> {
    if a == b {
        Ok(())
    } else {
        Err(WaveletError::geometry(format!(
            "shape {:?} does not match {:?}",
            a, b
        )))
    }
}
