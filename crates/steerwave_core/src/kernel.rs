//! Isotropic radial wavelet kernels.
//!
//! Every kernel is a function of the Nyquist-normalized radial frequency
//! `rho`, supported on `(1/4, 1]` and peaking at `rho = 1/2`. Internally the
//! kernels are written over the octave coordinate `u = log2(2 rho)`, so the
//! support is `u in (-1, 1]` and neighbouring octaves differ by exactly one.
//! All four families satisfy the octave partition
//! `psi(u)^2 + psi(u + 1)^2 = 1` for `u in (-1, 0]`.

use std::fmt;
use std::str::FromStr;

use crate::error::WaveletError;

// =============================================================================
// Constants
// =============================================================================

/// Steepness of the Vow erf transition.
const VOW_STEEPNESS: f64 = 2.61;

/// Half width of the Shannon pass band in octaves.
const SHANNON_HALF_WIDTH: f64 = 0.5;

// =============================================================================
// Types
// =============================================================================

/// Radial wavelet profile family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WaveletFamily {
    /// Polynomial-smoothed cosine, seven times differentiable at the support ends.
    #[default]
    Held,
    /// Error-function transition.
    Vow,
    /// Plain cosine of the octave coordinate.
    Simoncelli,
    /// Ideal octave band (indicator function).
    Shannon,
}

impl WaveletFamily {
    pub const ALL: [WaveletFamily; 4] = [
        WaveletFamily::Held,
        WaveletFamily::Vow,
        WaveletFamily::Simoncelli,
        WaveletFamily::Shannon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WaveletFamily::Held => "Held",
            WaveletFamily::Vow => "Vow",
            WaveletFamily::Simoncelli => "Simoncelli",
            WaveletFamily::Shannon => "Shannon",
        }
    }

    /// Kernel value at a Nyquist-normalized radial frequency.
    ///
    /// Exactly zero at DC and outside `(1/4, 1]`. Negative or NaN inputs
    /// evaluate to zero.
    pub fn magnitude(self, freq_norm: f64) -> f64 {
        if freq_norm.is_nan() || freq_norm <= 0.0 {
            return 0.0;
        }
        self.octave_magnitude((2.0 * freq_norm).log2())
    }

    /// Kernel value at octave coordinate `u = log2(2 rho)`.
    ///
    /// Filter banks shift `u` by whole octaves, so evaluating here avoids
    /// round-off at the shared band edges.
    pub fn octave_magnitude(self, u: f64) -> f64 {
        if !(u > -1.0 && u <= 1.0) {
            return 0.0;
        }
        let t = u.abs();
        match self {
            WaveletFamily::Held => (std::f64::consts::FRAC_PI_2 * held_polynomial(t)).cos(),
            WaveletFamily::Vow => {
                let a = VOW_STEEPNESS;
                let e = libm::erf(a * (0.5 - t)) / libm::erf(a * 0.5);
                ((1.0 + e) * 0.5).max(0.0).sqrt()
            }
            WaveletFamily::Simoncelli => (std::f64::consts::FRAC_PI_2 * t).cos(),
            WaveletFamily::Shannon => {
                if u > -SHANNON_HALF_WIDTH && u <= SHANNON_HALF_WIDTH {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// `q(t) = t^4 (35 - 84t + 70t^2 - 20t^3)`; `q(t) + q(1 - t) = 1`.
#[inline]
fn held_polynomial(t: f64) -> f64 {
    let t2 = t * t;
    t2 * t2 * (35.0 - 84.0 * t + 70.0 * t2 - 20.0 * t2 * t)
}

impl fmt::Display for WaveletFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveletFamily {
    type Err = WaveletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WaveletFamily::ALL
            .into_iter()
            .find(|family| family.name() == s)
            .ok_or_else(|| {
                WaveletError::configuration(
                    "wavelet",
                    format!("unsupported wavelet function '{}' (Held, Vow, Simoncelli, Shannon)", s),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_octave() -> impl Iterator<Item = f64> {
        // u in (-1, 0]
        (0..200).map(|i| -1.0 + (i as f64 + 1.0) / 200.0)
    }

    #[test]
    fn test_zero_at_dc_and_outside_support() {
        for family in WaveletFamily::ALL {
            assert_eq!(family.magnitude(0.0), 0.0, "{} at DC", family);
            assert_eq!(family.magnitude(-0.3), 0.0);
            assert_eq!(family.magnitude(0.25), 0.0, "{} at lower edge", family);
            assert_eq!(family.magnitude(0.2), 0.0);
            assert_eq!(family.magnitude(1.2), 0.0);
            assert_eq!(family.magnitude(f64::NAN), 0.0);
        }
    }

    #[test]
    fn test_peak_at_half_nyquist() {
        for family in WaveletFamily::ALL {
            assert!((family.magnitude(0.5) - 1.0).abs() < 1e-15, "{}", family);
            for rho in [0.3, 0.4, 0.6, 0.8, 0.95] {
                assert!(family.magnitude(rho) <= 1.0 + 1e-15);
                assert!(family.magnitude(rho) >= 0.0);
            }
        }
    }

    #[test]
    fn test_octave_partition_of_unity() {
        for family in WaveletFamily::ALL {
            for u in sample_octave() {
                let lo = family.octave_magnitude(u);
                let hi = family.octave_magnitude(u + 1.0);
                assert!(
                    (lo * lo + hi * hi - 1.0).abs() < 1e-12,
                    "{} partition fails at u = {}",
                    family,
                    u
                );
            }
        }
    }

    #[test]
    fn test_upper_edge_vanishes() {
        for family in WaveletFamily::ALL {
            assert!(family.magnitude(1.0).abs() < 1e-15, "{} at Nyquist", family);
        }
    }

    #[test]
    fn test_held_polynomial_symmetry() {
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            assert!((held_polynomial(t) + held_polynomial(1.0 - t) - 1.0).abs() < 1e-12);
        }
        assert_eq!(held_polynomial(0.0), 0.0);
        assert!((held_polynomial(1.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_shannon_is_indicator() {
        let family = WaveletFamily::Shannon;
        assert_eq!(family.octave_magnitude(-0.5), 0.0);
        assert_eq!(family.octave_magnitude(-0.49), 1.0);
        assert_eq!(family.octave_magnitude(0.5), 1.0);
        assert_eq!(family.octave_magnitude(0.51), 0.0);
    }

    #[test]
    fn test_parse_and_display() {
        for family in WaveletFamily::ALL {
            let parsed: WaveletFamily = family.to_string().parse().unwrap();
            assert_eq!(parsed, family);
        }
        let err = "Morlet".parse::<WaveletFamily>().unwrap_err();
        assert!(err.is_configuration());
        assert!("held".parse::<WaveletFamily>().is_err());
        assert_eq!(WaveletFamily::default(), WaveletFamily::Held);
    }
}
