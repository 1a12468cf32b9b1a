//! TIFF image input and output.
//!
//! A single-page TIFF is a 2-D image of shape `[height, width]`. A multi-page
//! TIFF is a volume of shape `[pages, height, width]`. Pixels are converted to
//! `f64` on read and written back as 32-bit float grayscale.

use ndarray::{ArrayD, Axis, IxDyn};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype::Gray32Float, TiffEncoder};
use tiff::ColorType;

use crate::error::CliError;

/// Read a grayscale TIFF as an image of the requested dimension.
pub fn read_image(path: &Path, dimension: usize) -> Result<ArrayD<f64>, CliError> {
    let tiff_err = |source| CliError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let invalid = |reason: String| CliError::Image {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_err)?;

    let mut pages: Vec<Vec<f64>> = Vec::new();
    let mut width = 0usize;
    let mut height = 0usize;

    loop {
        let (w, h) = decoder.dimensions().map_err(tiff_err)?;
        let color_type = decoder.colortype().map_err(tiff_err)?;
        if !matches!(
            color_type,
            ColorType::Gray(8) | ColorType::Gray(16) | ColorType::Gray(32) | ColorType::Gray(64)
        ) {
            return Err(invalid(format!(
                "unsupported TIFF color type {:?}, only grayscale is supported",
                color_type
            )));
        }

        if pages.is_empty() {
            width = w as usize;
            height = h as usize;
        } else if w as usize != width || h as usize != height {
            return Err(invalid(format!(
                "TIFF pages have inconsistent dimensions: expected {}x{}, got {}x{}",
                width, height, w, h
            )));
        }

        let page: Vec<f64> = match decoder.read_image().map_err(tiff_err)? {
            DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
            DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
            DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
            DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
            DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
            DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
            DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
            DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
            DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
            DecodingResult::F64(data) => data,
        };
        if page.len() != width * height {
            return Err(invalid(format!(
                "page {} holds {} samples, expected {}",
                pages.len(),
                page.len(),
                width * height
            )));
        }
        pages.push(page);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_err)?;
    }

    let shape: Vec<usize> = match (dimension, pages.len()) {
        (2, 1) => vec![height, width],
        (2, n) => {
            return Err(invalid(format!(
                "expected a single-page 2-D image, found {} pages",
                n
            )))
        }
        (3, n) => vec![n, height, width],
        (d, _) => return Err(CliError::UnsupportedDimension(d)),
    };
    log::debug!("Read {} as {:?}", path.display(), shape);

    let samples: Vec<f64> = pages.into_iter().flatten().collect();
    ArrayD::from_shape_vec(IxDyn(&shape), samples).map_err(|e| invalid(e.to_string()))
}

/// Write a 2-D image or 3-D volume as 32-bit float TIFF.
pub fn write_image(path: &Path, image: &ArrayD<f64>) -> Result<(), CliError> {
    let tiff_err = |source| CliError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let volume = match image.ndim() {
        2 => image.clone().insert_axis(Axis(0)),
        3 => image.clone(),
        d => {
            return Err(CliError::Image {
                path: path.to_path_buf(),
                reason: format!("cannot write a {}-D image", d),
            })
        }
    };
    let (pages, height, width) = (volume.shape()[0], volume.shape()[1], volume.shape()[2]);

    let file = File::create(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(tiff_err)?;

    for (page_idx, page) in volume.axis_iter(Axis(0)).enumerate() {
        let samples: Vec<f32> = page.iter().map(|&v| v as f32).collect();
        encoder
            .write_image::<Gray32Float>(width as u32, height as u32, &samples)
            .map_err(tiff_err)?;
        log::trace!("Wrote page {} of {}", page_idx + 1, pages);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("steerwave_io_{}_{}.tif", std::process::id(), name))
    }

    #[test]
    fn test_write_then_read_2d() {
        let path = temp_path("plane");
        let image = ArrayD::from_shape_fn(IxDyn(&[6, 10]), |idx| (idx[0] * 10 + idx[1]) as f64 * 0.5);
        write_image(&path, &image).unwrap();
        let back = read_image(&path, 2).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back, image);
    }

    #[test]
    fn test_write_then_read_volume() {
        let path = temp_path("volume");
        let image = ArrayD::from_shape_fn(IxDyn(&[3, 4, 5]), |idx| {
            (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64
        });
        write_image(&path, &image).unwrap();
        let back = read_image(&path, 3).unwrap();
        assert!(matches!(read_image(&path, 2), Err(CliError::Image { .. })));
        std::fs::remove_file(&path).ok();
        assert_eq!(back, image);
    }

    #[test]
    fn test_single_page_reads_as_thin_volume() {
        let path = temp_path("thin");
        let image = ArrayD::from_elem(IxDyn(&[4, 4]), 1.25);
        write_image(&path, &image).unwrap();
        let back = read_image(&path, 3).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back.shape(), &[1, 4, 4]);
    }

    #[test]
    fn test_missing_file() {
        let err = read_image(Path::new("/nonexistent/steerwave.tif"), 2).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
