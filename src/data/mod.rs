//! Training data: contiguous depth and label image blocks.

pub mod loader;

pub use loader::{load_training_data, LoadError, LoadOptions};

use half::f16;
use ndarray::Array3;

/// The image corpus a tree is trained on. Immutable once built.
///
/// Depth and label images are stored as contiguous row-major blocks of
/// `n_images * height * width` values each, in the same image order.
#[derive(Debug)]
pub struct TrainData {
    /// Image width in pixels.
    pub width: i32,
    /// Image height in pixels.
    pub height: i32,
    /// Camera vertical field of view, radians.
    pub fov: f32,
    /// Label alphabet size; valid labels are `0..n_labels`.
    pub n_labels: u8,
    /// Depth images, `[n_images, height, width]`, meters.
    pub depth_images: Array3<f16>,
    /// Label images, `[n_images, height, width]`.
    pub label_images: Array3<u8>,
}

impl TrainData {
    /// Assemble from flat image blocks.
    ///
    /// Both blocks must hold exactly `n_images * width * height` values.
    pub fn from_blocks(
        width: i32,
        height: i32,
        fov: f32,
        n_labels: u8,
        n_images: usize,
        depth: Vec<f16>,
        labels: Vec<u8>,
    ) -> Result<Self, LoadError> {
        if width <= 0 || height <= 0 {
            return Err(LoadError::BadGeometry { width, height });
        }
        let shape = (n_images, height as usize, width as usize);
        let depth_images = Array3::from_shape_vec(shape, depth)
            .map_err(|_| LoadError::BlockSize { which: "depth" })?;
        let label_images = Array3::from_shape_vec(shape, labels)
            .map_err(|_| LoadError::BlockSize { which: "label" })?;
        Ok(Self {
            width,
            height,
            fov,
            n_labels,
            depth_images,
            label_images,
        })
    }

    #[inline]
    pub fn n_images(&self) -> usize {
        self.depth_images.shape()[0]
    }

    /// Flat row-major view of one depth image.
    #[inline]
    pub fn depth_image(&self, image: usize) -> &[f16] {
        let wh = (self.width * self.height) as usize;
        let flat = self
            .depth_images
            .as_slice()
            .expect("depth block is contiguous by construction");
        &flat[image * wh..(image + 1) * wh]
    }

    /// Flat row-major view of one label image.
    #[inline]
    pub fn label_image(&self, image: usize) -> &[u8] {
        let wh = (self.width * self.height) as usize;
        let flat = self
            .label_images
            .as_slice()
            .expect("label block is contiguous by construction");
        &flat[image * wh..(image + 1) * wh]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_blocks_shape_check() {
        let depth = vec![f16::from_f32(1.0); 8];
        let labels = vec![0u8; 8];
        let data = TrainData::from_blocks(2, 2, 1.0, 2, 2, depth, labels).unwrap();
        assert_eq!(data.n_images(), 2);
        assert_eq!(data.depth_image(1).len(), 4);
        assert_eq!(data.label_image(0).len(), 4);

        let bad = TrainData::from_blocks(2, 2, 1.0, 2, 2, vec![f16::ZERO; 7], vec![0u8; 8]);
        assert!(bad.is_err());
    }
}
