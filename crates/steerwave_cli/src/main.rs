mod args;
mod error;
mod io;

use args::{Cli, RunOptions};
use error::CliError;
use std::process::ExitCode;
use std::time::Instant;

use steerwave_core::{steerable_analysis, AnalysisConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = Cli::parse_args(std::env::args_os())
        .and_then(Cli::resolve)
        .and_then(|options| run(&options));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("steerwave: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn analysis_config(options: &RunOptions) -> AnalysisConfig<f64> {
    AnalysisConfig {
        levels: options.levels,
        high_pass_sub_bands: options.bands,
        wavelet: options.wavelet,
        riesz_order: options.riesz_order,
        apply_reconstruction_factors: options.apply_reconstruction_factors,
        dimension: options.dimension,
        ..AnalysisConfig::default()
    }
}

fn run(options: &RunOptions) -> Result<(), CliError> {
    let start = Instant::now();
    let config = analysis_config(options);
    config.validate()?;

    let image = io::read_image(&options.input_image, options.dimension)?;
    log::info!(
        "Loaded {} with shape {:?}",
        options.input_image.display(),
        image.shape()
    );
    log::info!(
        "{} wavelet, {} levels x {} bands, Riesz order {}, reconstruction factors {}",
        config.wavelet,
        config.levels,
        config.high_pass_sub_bands,
        config.riesz_order,
        if config.apply_reconstruction_factors {
            "on"
        } else {
            "off"
        }
    );

    let analysis = steerable_analysis(image.view(), &config)?;
    log::info!(
        "{} pyramid outputs, {} Riesz components per band",
        analysis.pyramid_outputs,
        analysis.riesz_components
    );

    io::write_image(&options.output_image, &analysis.reconstruction)?;
    log::info!(
        "Wrote {} in {:.2?}",
        options.output_image.display(),
        start.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use steerwave_core::WaveletFamily;

    #[test]
    fn test_run_end_to_end_2d() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("steerwave_main_{}_in.tif", std::process::id()));
        let output = dir.join(format!("steerwave_main_{}_out.tif", std::process::id()));
        let image = ArrayD::from_shape_fn(IxDyn(&[32, 32]), |idx| {
            ((idx[0] as f64) * 0.4).sin() + ((idx[1] as f64) * 0.7).cos()
        });
        io::write_image(&input, &image).unwrap();

        let options = RunOptions {
            input_image: input.clone(),
            output_image: output.clone(),
            levels: 2,
            bands: 1,
            wavelet: WaveletFamily::Simoncelli,
            riesz_order: 1,
            apply_reconstruction_factors: true,
            dimension: 2,
        };
        run(&options).unwrap();
        let written = io::read_image(&output, 2).unwrap();
        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&output).ok();

        assert_eq!(written.shape(), &[32, 32]);
        assert!(written.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_run_rejects_zero_bands() {
        let options = RunOptions {
            input_image: "unused.tif".into(),
            output_image: "unused_out.tif".into(),
            levels: 2,
            bands: 0,
            wavelet: WaveletFamily::Held,
            riesz_order: 1,
            apply_reconstruction_factors: true,
            dimension: 2,
        };
        assert!(matches!(run(&options), Err(CliError::Engine(_))));
    }

    #[test]
    fn test_run_rejects_oversized_riesz_order() {
        let options = RunOptions {
            input_image: "unused.tif".into(),
            output_image: "unused_out.tif".into(),
            levels: 2,
            bands: 1,
            wavelet: WaveletFamily::Held,
            riesz_order: usize::MAX,
            apply_reconstruction_factors: true,
            dimension: 3,
        };
        match run(&options) {
            Err(CliError::Engine(err)) => assert!(err.is_configuration()),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }
}
