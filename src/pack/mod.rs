//! Sheet packing: layout strategies, compositing, and PNG output.

mod layout;
mod packer;
pub mod raster;

pub use layout::{layout, Algorithm, Layout};
pub use packer::{compose, ImagePacker, PackRequest, PackedGeometry, PackedSheet, Packer, Placement};
