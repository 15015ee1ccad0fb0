//! Sprite sheet packer.
//!
//! Decodes every image of a group, lays them out with the chosen
//! [`Algorithm`], and composites them onto one transparent canvas.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{imageops, ImageBuffer, RgbaImage};

use crate::error::{Result, SpriteError};

use super::layout::{layout, Algorithm};

/// Input to one packing job.
#[derive(Debug, Clone, PartialEq)]
pub struct PackRequest {
    pub tag: String,
    /// Distinct image paths, in first-reference order.
    pub paths: Vec<PathBuf>,
    pub algorithm: Algorithm,
    pub padding: u32,
}

/// Where one image landed on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Sheet geometry: per-image placement plus overall size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedGeometry {
    pub coordinates: HashMap<PathBuf, Placement>,
    pub width: u32,
    pub height: u32,
}

impl PackedGeometry {
    pub fn placement(&self, path: &Path) -> Option<Placement> {
        self.coordinates.get(path).copied()
    }
}

/// A packed sheet ready to be written.
#[derive(Debug, Clone)]
pub struct PackedSheet {
    pub geometry: PackedGeometry,
    pub image: RgbaImage,
}

/// Turns a list of images into one sheet.
pub trait Packer: Send + Sync {
    fn pack(&self, request: &PackRequest) -> Result<PackedSheet>;
}

/// Packer backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagePacker;

impl Packer for ImagePacker {
    fn pack(&self, request: &PackRequest) -> Result<PackedSheet> {
        let images = request
            .paths
            .iter()
            .map(|path| {
                image::open(path)
                    .map(|img| img.to_rgba8())
                    .map_err(|e| SpriteError::Packing {
                        tag: request.tag.clone(),
                        message: format!("failed to decode {}: {}", path.display(), e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(compose(request, images))
    }
}

/// Lay out already-decoded images (one per request path) and composite them.
pub fn compose(request: &PackRequest, images: Vec<RgbaImage>) -> PackedSheet {
    let sizes: Vec<(u32, u32)> = images.iter().map(|img| img.dimensions()).collect();
    let placed = layout(&sizes, request.algorithm, request.padding);

    let mut canvas: RgbaImage = ImageBuffer::new(placed.width, placed.height);
    let mut coordinates = HashMap::with_capacity(images.len());

    for ((path, img), &(x, y)) in request.paths.iter().zip(&images).zip(&placed.positions) {
        imageops::replace(&mut canvas, img, i64::from(x), i64::from(y));
        coordinates.insert(
            path.clone(),
            Placement {
                x,
                y,
                width: img.width(),
                height: img.height(),
            },
        );
    }

    PackedSheet {
        geometry: PackedGeometry {
            coordinates,
            width: placed.width,
            height: placed.height,
        },
        image: canvas,
    }
}
