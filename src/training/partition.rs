//! Pixel routing for committed splits.

use log::warn;

use crate::features::{sample_uv, UvPair};

use super::frontier::{NodeTrainData, Pixel};
use super::TrainContext;

/// Route a node's pixels into left/right sets under the chosen `(uv, t)`.
///
/// `expected` carries the `(left, right)` counts predicted by the winning
/// worker; under deterministic arithmetic the observed counts always match,
/// so a mismatch is logged and the vectors trimmed to what was actually
/// routed. Checkpoint restore passes `None` because it has no prediction.
pub fn collect_pixels(
    ctx: &TrainContext,
    node: &NodeTrainData,
    uv: UvPair,
    t: f32,
    expected: Option<(u32, u32)>,
) -> (Vec<Pixel>, Vec<Pixel>) {
    let n = node.pixels.len();
    let (l_cap, r_cap) = match expected {
        Some((l, r)) => (l as usize, r as usize),
        None => (n, n),
    };
    let mut l_pixels: Vec<Pixel> = Vec::with_capacity(l_cap);
    let mut r_pixels: Vec<Pixel> = Vec::with_capacity(r_cap);

    let width = ctx.data.width;
    let height = ctx.data.height;
    for pixel in &node.pixels {
        let depth_image = ctx.data.depth_image(pixel.image as usize);
        let depth = f32::from(depth_image[(pixel.y * width + pixel.x) as usize]);
        let value = sample_uv(depth_image, width, height, pixel.x, pixel.y, depth, uv);

        if value < t {
            l_pixels.push(*pixel);
        } else {
            r_pixels.push(*pixel);
        }
    }

    if let Some((l_n, r_n)) = expected {
        if l_pixels.len() != l_n as usize || r_pixels.len() != r_n as usize {
            warn!(
                "node {}: partition produced {}/{} pixels, predicted {}/{}",
                node.id,
                l_pixels.len(),
                r_pixels.len(),
                l_n,
                r_n
            );
        }
    }

    (l_pixels, r_pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainData;
    use crate::training::TrainParams;
    use half::f16;

    #[test]
    fn test_partition_routes_every_pixel() {
        // 2x2 image with depths 1, 2, 3, 4; u probes the pixel itself and v
        // is out of bounds, so the feature is depth - 1000.
        let data = TrainData::from_blocks(
            2,
            2,
            1.0,
            2,
            1,
            vec![1.0, 2.0, 3.0, 4.0]
                .into_iter()
                .map(f16::from_f32)
                .collect(),
            vec![0u8; 4],
        )
        .unwrap();
        let ctx = TrainContext::new(
            data,
            TrainParams {
                n_uv: 1,
                ..Default::default()
            },
        );

        let node = NodeTrainData {
            id: 0,
            depth: 0,
            pixels: vec![
                Pixel { x: 0, y: 0, image: 0 },
                Pixel { x: 1, y: 0, image: 0 },
                Pixel { x: 0, y: 1, image: 0 },
                Pixel { x: 1, y: 1, image: 0 },
            ],
        };

        let uv = [0.0, 0.0, -100.0, 0.0];
        // depth - 1000 < t=-997.5 keeps depths 1 and 2 on the left
        let (l, r) = collect_pixels(&ctx, &node, uv, -997.5, Some((2, 2)));
        assert_eq!(l.len() + r.len(), node.pixels.len());
        assert_eq!(l, vec![node.pixels[0], node.pixels[1]]);
        assert_eq!(r, vec![node.pixels[2], node.pixels[3]]);
    }
}
