//! PNG output for packed sheets, including reduced-density copies.

use std::fs;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{Result, SpriteError};

/// Write a sheet to a PNG file, creating parent directories.
pub fn write_sheet(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SpriteError::SheetWrite {
            path: path.to_path_buf(),
            message: format!("Failed to create directory: {}", e),
        })?;
    }

    image.save(path).map_err(|e| SpriteError::SheetWrite {
        path: path.to_path_buf(),
        message: format!("Failed to write PNG: {}", e),
    })
}

/// Shrink a sheet by an integer density factor.
///
/// Dimensions round up so that every source pixel keeps a destination.
pub fn downscale(image: &RgbaImage, density: u32) -> RgbaImage {
    if density <= 1 {
        return image.clone();
    }

    let width = image.width().div_ceil(density).max(1);
    let height = image.height().div_ceil(density).max(1);
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

/// File name of the high-density variant: `sprite-a.png` becomes `sprite-a@2x.png`.
pub fn density_name(file_name: &str, density: u32) -> String {
    match file_name.rfind('.') {
        Some(dot) => format!("{}@{}x{}", &file_name[..dot], density, &file_name[dot..]),
        None => format!("{}@{}x", file_name, density),
    }
}
