//! Positional argument parsing.
//!
//! The command line is
//! `inputImage outputImage levels bands [waveletFunction] rieszOrder [applyReconstructionFactors] [dimension]`.
//! The optional tokens are told apart by shape: an integer where the wavelet
//! name is expected is the Riesz order, `Apply`/`NoApply` is the
//! reconstruction flag and a trailing integer is the dimension.

use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use steerwave_core::WaveletFamily;

use crate::error::CliError;

/// Default dimension when none is given.
const DEFAULT_DIMENSION: usize = 3;

#[derive(Parser, Debug)]
#[command(
    name = "steerwave",
    version,
    about = "Steer wavelet sub-bands with a generalized Riesz structure tensor and reconstruct"
)]
pub struct Cli {
    /// Input image: single-page TIFF (2-D) or multi-page TIFF (3-D)
    pub input_image: PathBuf,

    /// Output image, written as 32-bit float TIFF
    pub output_image: PathBuf,

    /// Number of pyramid levels
    pub levels: usize,

    /// Band-pass sub-bands per level
    pub bands: usize,

    /// [waveletFunction] rieszOrder [Apply|NoApply] [dimension]
    #[arg(required = true, num_args = 1..=4, value_name = "ARGS")]
    pub rest: Vec<String>,
}

/// Fully resolved run options.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub input_image: PathBuf,
    pub output_image: PathBuf,
    pub levels: usize,
    pub bands: usize,
    pub wavelet: WaveletFamily,
    pub riesz_order: usize,
    pub apply_reconstruction_factors: bool,
    pub dimension: usize,
}

impl Cli {
    /// Parse `argv`. Help and version requests print and exit the process;
    /// every other parse failure becomes a one-line usage error.
    pub fn parse_args<I, T>(argv: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(argv).map_err(|err| match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => usage_error(&err),
        })
    }

    pub fn resolve(self) -> Result<RunOptions, CliError> {
        let mut tokens = self.rest.iter().map(String::as_str).peekable();

        let first = tokens
            .next()
            .ok_or_else(|| CliError::Usage("missing rieszOrder".to_string()))?;
        let (wavelet, riesz_order) = match first.parse::<usize>() {
            Ok(order) => (WaveletFamily::default(), order),
            Err(_) => {
                let wavelet = first
                    .parse::<WaveletFamily>()
                    .map_err(|_| CliError::UnsupportedWavelet(first.to_string()))?;
                let order_token = tokens.next().ok_or_else(|| {
                    CliError::Usage("missing rieszOrder after waveletFunction".to_string())
                })?;
                let order = order_token.parse::<usize>().map_err(|_| {
                    CliError::Usage(format!("rieszOrder must be an integer, got '{}'", order_token))
                })?;
                (wavelet, order)
            }
        };

        let apply_reconstruction_factors = match tokens.peek().copied() {
            Some("Apply") => {
                tokens.next();
                true
            }
            Some("NoApply") => {
                tokens.next();
                false
            }
            _ => true,
        };

        let dimension = match tokens.next() {
            None => DEFAULT_DIMENSION,
            Some(token) => {
                let dimension = token.parse::<usize>().map_err(|_| {
                    CliError::Usage(format!(
                        "unknown argument '{}': expected Apply, NoApply or a dimension",
                        token
                    ))
                })?;
                if !(2..=3).contains(&dimension) {
                    return Err(CliError::UnsupportedDimension(dimension));
                }
                dimension
            }
        };

        if let Some(extra) = tokens.next() {
            return Err(CliError::Usage(format!("unexpected argument '{}'", extra)));
        }

        Ok(RunOptions {
            input_image: self.input_image,
            output_image: self.output_image,
            levels: self.levels,
            bands: self.bands,
            wavelet,
            riesz_order,
            apply_reconstruction_factors,
            dimension,
        })
    }
}

/// First line of a clap diagnostic, without its `error: ` prefix.
fn usage_error(err: &clap::Error) -> CliError {
    let rendered = err.render().to_string();
    let line = rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("invalid arguments");
    CliError::Usage(line.strip_prefix("error: ").unwrap_or(line).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &[&str]) -> Result<RunOptions, CliError> {
        let argv = ["steerwave", "in.tif", "out.tif", "2", "1"]
            .iter()
            .chain(args.iter())
            .copied();
        Cli::parse_args(argv)?.resolve()
    }

    #[test]
    fn test_full_argument_list() {
        let options = resolve(&["Shannon", "2", "NoApply", "2"]).unwrap();
        assert_eq!(options.input_image, PathBuf::from("in.tif"));
        assert_eq!(options.levels, 2);
        assert_eq!(options.bands, 1);
        assert_eq!(options.wavelet, WaveletFamily::Shannon);
        assert_eq!(options.riesz_order, 2);
        assert!(!options.apply_reconstruction_factors);
        assert_eq!(options.dimension, 2);
    }

    #[test]
    fn test_defaults() {
        let options = resolve(&["1"]).unwrap();
        assert_eq!(options.wavelet, WaveletFamily::Held);
        assert_eq!(options.riesz_order, 1);
        assert!(options.apply_reconstruction_factors);
        assert_eq!(options.dimension, 3);
    }

    #[test]
    fn test_integer_in_wavelet_slot_is_order() {
        let options = resolve(&["3", "2"]).unwrap();
        assert_eq!(options.wavelet, WaveletFamily::Held);
        assert_eq!(options.riesz_order, 3);
        assert_eq!(options.dimension, 2);

        let options = resolve(&["2", "Apply"]).unwrap();
        assert_eq!(options.riesz_order, 2);
        assert!(options.apply_reconstruction_factors);
        assert_eq!(options.dimension, 3);
    }

    #[test]
    fn test_wavelet_without_flag() {
        let options = resolve(&["Vow", "1", "3"]).unwrap();
        assert_eq!(options.wavelet, WaveletFamily::Vow);
        assert!(options.apply_reconstruction_factors);
        assert_eq!(options.dimension, 3);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            resolve(&["Morlet", "1"]),
            Err(CliError::UnsupportedWavelet(_))
        ));
        assert!(matches!(
            resolve(&["Held", "1", "Apply", "4"]),
            Err(CliError::UnsupportedDimension(4))
        ));
        assert!(matches!(resolve(&["Held"]), Err(CliError::Usage(_))));
        assert!(matches!(resolve(&["Held", "x"]), Err(CliError::Usage(_))));
        assert!(matches!(resolve(&["1", "Maybe"]), Err(CliError::Usage(_))));
        assert!(matches!(resolve(&["1", "2", "Apply"]), Err(CliError::Usage(_))));
        assert!(matches!(resolve(&[]), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_parse_failures_are_one_line() {
        for argv in [
            vec!["steerwave", "in.tif", "out.tif"],
            vec!["steerwave", "in.tif", "out.tif", "two", "1", "1"],
            vec!["steerwave", "in.tif", "out.tif", "2", "1", "1", "--bogus"],
        ] {
            match Cli::parse_args(argv) {
                Err(CliError::Usage(message)) => {
                    assert!(!message.is_empty());
                    assert!(!message.contains('\n'), "multi-line usage error: {:?}", message);
                    assert!(!message.starts_with("error:"));
                }
                other => panic!("expected a usage error, got {:?}", other),
            }
        }
    }
}
