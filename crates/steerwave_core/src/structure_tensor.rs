//! Structure tensor of a set of steerable responses.
//!
//! For `M` co-registered response images `c_0..c_{M-1}` the tensor at each
//! pixel is the outer product `c c^T`, optionally averaged over a separable
//! Gaussian window. The tensor is symmetric positive semi-definite, so its
//! eigen-decomposition gives the locally dominant combination of responses:
//! projecting `c` onto the leading eigenvector steers the filter bank towards
//! the strongest local orientation.
//!
//! ## Storage
//!
//! The tensor field is an array of shape `spatial + [M (M + 1) / 2]` holding
//! the upper triangle row by row: `(0,0), (0,1), .., (0,M-1), (1,1), ..`.
//! Eigenvalues are stored as `spatial + [M]` in decreasing order and
//! eigenvectors as `spatial + [M, M]`, row `i` being eigenvector `i`.
//!
//! ## Degenerate pixels
//!
//! Eigenvalues closer than `EIGEN_TIE_TOLERANCE` (relative to the largest
//! magnitude at that pixel) keep their canonical axis order. Each eigenvector
//! is signed so its largest-magnitude entry is positive, the first such entry
//! winning ties.

use ndarray::{ArrayD, Axis, IxDyn, Zip};
use rayon::prelude::*;

use crate::error::{WaveletError, WaveletResult};
use crate::float_trait::WaveletFloat;

// =============================================================================
// Constants
// =============================================================================

/// Default half width of the smoothing window in pixels.
pub const DEFAULT_WINDOW_RADIUS: usize = 2;

/// Default standard deviation of the smoothing window in pixels.
pub const DEFAULT_WINDOW_SIGMA: f64 = 1.0;

/// Jacobi sweeps before giving up on further off-diagonal reduction.
const MAX_JACOBI_SWEEPS: usize = 64;

// =============================================================================
// Window
// =============================================================================

/// Separable Gaussian averaging window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorWindow {
    /// Half width in pixels; 0 disables smoothing.
    pub radius: usize,
    pub sigma: f64,
}

impl Default for TensorWindow {
    fn default() -> Self {
        Self {
            radius: DEFAULT_WINDOW_RADIUS,
            sigma: DEFAULT_WINDOW_SIGMA,
        }
    }
}

impl TensorWindow {
    /// No smoothing: the tensor is the raw per-pixel outer product.
    pub fn none() -> Self {
        Self {
            radius: 0,
            sigma: DEFAULT_WINDOW_SIGMA,
        }
    }

    pub fn validate(&self) -> WaveletResult<()> {
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(WaveletError::configuration(
                "window_sigma",
                format!("must be a positive finite number, got {}", self.sigma),
            ));
        }
        Ok(())
    }
}

/// Normalized Gaussian weights over `[-radius, radius]`.
fn gaussian_kernel_1d<F: WaveletFloat>(radius: usize, sigma: f64) -> Vec<F> {
    let size = 2 * radius + 1;
    let two_sigma2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| F::from_f64_c(w / sum)).collect()
}

/// Reflect index for boundary handling (scipy 'reflect' mode).
/// reflect(-1) = 0, reflect(-2) = 1, reflect(n) = n-1, reflect(n+1) = n-2
#[inline(always)]
fn reflect_index(idx: isize, len: usize) -> usize {
    let n = len as isize;
    if idx < 0 {
        (-idx - 1).min(n - 1) as usize
    } else if idx >= n {
        (2 * n - 1 - idx).max(0) as usize
    } else {
        idx as usize
    }
}

/// Fill `padded` with `input` surrounded by `radius` reflected samples per side.
fn fill_padded<F: WaveletFloat>(input: &[F], radius: usize, padded: &mut Vec<F>) {
    let n = input.len();
    padded.clear();
    padded.extend((0..n + 2 * radius).map(|i| {
        let src = i as isize - radius as isize;
        input[reflect_index(src, n)]
    }));
}

/// Convolve every lane of every spatial axis with the window, in place.
fn smooth_in_place<F: WaveletFloat>(
    field: &mut ArrayD<F>,
    spatial_axes: usize,
    window: &TensorWindow,
) {
    if window.radius == 0 {
        return;
    }
    let kernel = gaussian_kernel_1d::<F>(window.radius, window.sigma);
    for axis in 0..spatial_axes {
        Zip::from(field.lanes_mut(Axis(axis))).par_for_each(|mut lane| {
            let input: Vec<F> = lane.iter().copied().collect();
            let mut padded = Vec::with_capacity(input.len() + kernel.len());
            fill_padded(&input, window.radius, &mut padded);
            for (i, out) in lane.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .zip(&padded[i..i + kernel.len()])
                    .fold(F::zero(), |acc, (&w, &v)| acc + w * v);
            }
        });
    }
}

// =============================================================================
// Symmetric eigen-analysis
// =============================================================================

/// Index of `(row, col)` (either triangle) in packed upper-triangular storage.
#[inline]
pub fn packed_index(row: usize, col: usize, m: usize) -> usize {
    let (r, c) = if row <= col { (row, col) } else { (col, row) };
    r * (2 * m - r + 1) / 2 + (c - r)
}

/// Eigen-decomposition of one packed symmetric matrix.
///
/// Writes eigenvalues (decreasing) into `values` and eigenvectors row by row
/// into `vectors` (length `m * m`).
pub fn symmetric_eigen<F: WaveletFloat>(
    packed: &[F],
    m: usize,
    values: &mut [F],
    vectors: &mut [F],
) {
    let mut a = vec![F::zero(); m * m];
    for row in 0..m {
        for col in row..m {
            let v = packed[packed_index(row, col, m)];
            a[row * m + col] = v;
            a[col * m + row] = v;
        }
    }
    let mut v = vec![F::zero(); m * m];
    for i in 0..m {
        v[i * m + i] = F::one();
    }

    jacobi_diagonalize(&mut a, &mut v, m);

    let diag: Vec<F> = (0..m).map(|i| a[i * m + i]).collect();
    let order = descending_order(&diag);

    for (slot, &col) in order.iter().enumerate() {
        values[slot] = diag[col];
        let row = &mut vectors[slot * m..(slot + 1) * m];
        for (k, out) in row.iter_mut().enumerate() {
            *out = v[k * m + col];
        }
        fix_sign(row);
    }
}

/// Cyclic Jacobi rotations until the off-diagonal mass is negligible.
fn jacobi_diagonalize<F: WaveletFloat>(a: &mut [F], v: &mut [F], m: usize) {
    let two = F::from_f64_c(2.0);
    let total: F = a.iter().map(|&x| x * x).sum();
    let threshold = F::epsilon() * F::epsilon() * total;

    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off = F::zero();
        for p in 0..m {
            for q in p + 1..m {
                off += a[p * m + q] * a[p * m + q];
            }
        }
        if off <= threshold {
            return;
        }

        for p in 0..m {
            for q in p + 1..m {
                let apq = a[p * m + q];
                if apq == F::zero() {
                    continue;
                }
                let theta = (a[q * m + q] - a[p * m + p]) / (two * apq);
                let sign = if theta < F::zero() { -F::one() } else { F::one() };
                let t = sign / (theta.abs() + (theta * theta + F::one()).sqrt());
                let c = F::one() / (t * t + F::one()).sqrt();
                let s = t * c;

                for k in 0..m {
                    let akp = a[k * m + p];
                    let akq = a[k * m + q];
                    a[k * m + p] = c * akp - s * akq;
                    a[k * m + q] = s * akp + c * akq;
                }
                for k in 0..m {
                    let apk = a[p * m + k];
                    let aqk = a[q * m + k];
                    a[p * m + k] = c * apk - s * aqk;
                    a[q * m + k] = s * apk + c * aqk;
                }
                for k in 0..m {
                    let vkp = v[k * m + p];
                    let vkq = v[k * m + q];
                    v[k * m + p] = c * vkp - s * vkq;
                    v[k * m + q] = s * vkp + c * vkq;
                }
            }
        }
    }
}

/// Column order by decreasing eigenvalue; near-ties keep the lower column first.
fn descending_order<F: WaveletFloat>(diag: &[F]) -> Vec<usize> {
    let scale = diag.iter().fold(F::zero(), |acc, &x| acc.max(x.abs()));
    let tolerance = F::EIGEN_TIE_TOLERANCE * scale;
    let mut remaining: Vec<usize> = (0..diag.len()).collect();
    let mut order = Vec::with_capacity(diag.len());
    while !remaining.is_empty() {
        let mut best = 0;
        for slot in 1..remaining.len() {
            if diag[remaining[slot]] > diag[remaining[best]] + tolerance {
                best = slot;
            }
        }
        order.push(remaining.remove(best));
    }
    order
}

/// Flip `vector` so its largest-magnitude entry is positive.
fn fix_sign<F: WaveletFloat>(vector: &mut [F]) {
    let mut pivot = 0;
    for (i, x) in vector.iter().enumerate() {
        if x.abs() > vector[pivot].abs() {
            pivot = i;
        }
    }
    if vector[pivot] < F::zero() {
        vector.iter_mut().for_each(|x| *x = -*x);
    }
}

// =============================================================================
// Structure tensor
// =============================================================================

/// Structure tensor field with its per-pixel eigen-decomposition.
#[derive(Debug, Clone)]
pub struct StructureTensor<F: WaveletFloat> {
    components: Vec<ArrayD<F>>,
    tensor: ArrayD<F>,
    eigenvalues: ArrayD<F>,
    eigenvectors: ArrayD<F>,
}

impl<F: WaveletFloat> StructureTensor<F> {
    /// Build the tensor field of `components` and decompose it.
    pub fn compute(components: Vec<ArrayD<F>>, window: &TensorWindow) -> WaveletResult<Self> {
        window.validate()?;
        let first = components
            .first()
            .ok_or_else(|| WaveletError::geometry("structure tensor needs at least one component"))?;
        let spatial = first.shape().to_vec();
        if let Some(bad) = components.iter().position(|c| c.shape() != spatial.as_slice()) {
            return Err(WaveletError::geometry(format!(
                "component {} has shape {:?}, expected {:?}",
                bad,
                components[bad].shape(),
                spatial
            )));
        }

        let m = components.len();
        let packed_len = m * (m + 1) / 2;
        let pixels: usize = spatial.iter().product();

        let packed = {
            let standard: Vec<_> = components.iter().map(|c| c.as_standard_layout()).collect();
            let slices = standard
                .iter()
                .map(|c| {
                    c.as_slice()
                        .ok_or_else(|| WaveletError::geometry("component is not contiguous"))
                })
                .collect::<WaveletResult<Vec<&[F]>>>()?;

            let mut packed = vec![F::zero(); pixels * packed_len];
            packed
                .par_chunks_mut(packed_len)
                .enumerate()
                .for_each(|(pixel, out)| {
                    let mut slot = 0;
                    for row in 0..m {
                        let cr = slices[row][pixel];
                        for col in row..m {
                            out[slot] = cr * slices[col][pixel];
                            slot += 1;
                        }
                    }
                });
            packed
        };

        let mut tensor_shape = spatial.clone();
        tensor_shape.push(packed_len);
        let mut tensor = ArrayD::from_shape_vec(IxDyn(&tensor_shape), packed)
            .map_err(|e| WaveletError::geometry(e.to_string()))?;
        smooth_in_place(&mut tensor, spatial.len(), window);

        let (eigenvalues, eigenvectors) = decompose_field(&tensor, &spatial, m)?;

        Ok(Self {
            components,
            tensor,
            eigenvalues,
            eigenvectors,
        })
    }

    /// Number of components `M`.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn spatial_shape(&self) -> &[usize] {
        self.components[0].shape()
    }

    /// Packed upper-triangular tensor field, shape `spatial + [M(M+1)/2]`.
    pub fn tensor_field(&self) -> &ArrayD<F> {
        &self.tensor
    }

    /// Eigenvalues in decreasing order, shape `spatial + [M]`.
    pub fn eigenvalues(&self) -> &ArrayD<F> {
        &self.eigenvalues
    }

    /// Eigenvectors, shape `spatial + [M, M]`; `[.., i, j]` is entry `j` of eigenvector `i`.
    pub fn eigenvectors(&self) -> &ArrayD<F> {
        &self.eigenvectors
    }

    /// Image of eigenvalue `index` (0 is the largest).
    pub fn eigenvalue_image(&self, index: usize) -> WaveletResult<ArrayD<F>> {
        self.check_index(index)?;
        let last = Axis(self.eigenvalues.ndim() - 1);
        Ok(self.eigenvalues.index_axis(last, index).to_owned())
    }

    /// Per-pixel projection of the responses onto eigenvector `index`.
    pub fn projection_image(&self, index: usize) -> WaveletResult<ArrayD<F>> {
        self.check_index(index)?;
        let m = self.components.len();
        let vectors = self.eigenvectors.as_standard_layout();
        let vectors = vectors
            .as_slice()
            .ok_or_else(|| WaveletError::geometry("eigenvector field is not contiguous"))?;

        let mut projection = ArrayD::<F>::zeros(IxDyn(self.spatial_shape()));
        let standard: Vec<_> = self
            .components
            .iter()
            .map(|c| c.as_standard_layout())
            .collect();
        let slices = standard
            .iter()
            .map(|c| {
                c.as_slice()
                    .ok_or_else(|| WaveletError::geometry("component is not contiguous"))
            })
            .collect::<WaveletResult<Vec<&[F]>>>()?;

        let out = projection
            .as_slice_mut()
            .ok_or_else(|| WaveletError::geometry("projection is not contiguous"))?;
        out.par_iter_mut().enumerate().for_each(|(pixel, value)| {
            let row = &vectors[(pixel * m + index) * m..(pixel * m + index + 1) * m];
            *value = row
                .iter()
                .zip(slices.iter())
                .fold(F::zero(), |acc, (&w, c)| acc + w * c[pixel]);
        });
        Ok(projection)
    }

    /// Projection onto the eigenvector with the largest eigenvalue.
    pub fn projection_with_largest_response(&self) -> WaveletResult<ArrayD<F>> {
        self.projection_image(0)
    }

    fn check_index(&self, index: usize) -> WaveletResult<()> {
        if index < self.components.len() {
            Ok(())
        } else {
            Err(WaveletError::configuration(
                "eigen_index",
                format!(
                    "{} is out of range for {} components",
                    index,
                    self.components.len()
                ),
            ))
        }
    }
}

fn decompose_field<F: WaveletFloat>(
    tensor: &ArrayD<F>,
    spatial: &[usize],
    m: usize,
) -> WaveletResult<(ArrayD<F>, ArrayD<F>)> {
    let packed_len = m * (m + 1) / 2;
    let pixels: usize = spatial.iter().product();
    let standard = tensor.as_standard_layout();
    let packed = standard
        .as_slice()
        .ok_or_else(|| WaveletError::geometry("tensor field is not contiguous"))?;

    let mut values = vec![F::zero(); pixels * m];
    let mut vectors = vec![F::zero(); pixels * m * m];
    values
        .par_chunks_mut(m)
        .zip(vectors.par_chunks_mut(m * m))
        .zip(packed.par_chunks(packed_len))
        .for_each(|((vals, vecs), matrix)| symmetric_eigen(matrix, m, vals, vecs));

    let mut value_shape = spatial.to_vec();
    value_shape.push(m);
    let mut vector_shape = value_shape.clone();
    vector_shape.push(m);
    let eigenvalues = ArrayD::from_shape_vec(IxDyn(&value_shape), values)
        .map_err(|e| WaveletError::geometry(e.to_string()))?;
    let eigenvectors = ArrayD::from_shape_vec(IxDyn(&vector_shape), vectors)
        .map_err(|e| WaveletError::geometry(e.to_string()))?;
    Ok((eigenvalues, eigenvectors))
}
