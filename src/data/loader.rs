//! On-disk training corpus loader.
//!
//! A data directory holds a `meta.json` describing the image geometry and
//! camera, one or more index files, and a pair of raw image files per frame:
//!
//! ```text
//! <data_dir>/meta.json            { "width", "height", "n_labels", "vertical_fov" }
//! <data_dir>/<index>.index        one frame basename per line
//! <data_dir>/<name>.depth         width*height little-endian f16 values, meters
//! <data_dir>/<name>.labels        width*height label bytes
//! ```
//!
//! Frames are loaded in index order, optionally shuffled (seeded, so a run is
//! reproducible) and windowed by skip/limit before any file is read.

use std::fs;
use std::path::{Path, PathBuf};

use half::f16;
use log::info;
use rand::seq::SliceRandom;
use rand_mt::Mt19937GenRand32;
use serde::Deserialize;
use thiserror::Error;

use super::TrainData;

/// Errors surfaced while loading a training corpus.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {path}: {source}")]
    Meta {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid image geometry {width}x{height}")]
    BadGeometry { width: i32, height: i32 },

    #[error("label count must be in [1, 255]")]
    BadLabelCount,

    #[error("index '{0}' lists no usable frames")]
    EmptyIndex(String),

    #[error("{path}: expected {expected} bytes, got {actual}")]
    ImageSize {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("{which} block does not match the image geometry")]
    BlockSize { which: &'static str },
}

#[derive(Debug, Deserialize)]
struct DataMeta {
    width: i32,
    height: i32,
    n_labels: u8,
    vertical_fov: f32,
}

/// Frame selection applied before any image file is read.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Cap on the number of frames loaded.
    pub limit: u32,
    /// Number of leading frames to skip (after any shuffle).
    pub skip: u32,
    /// Shuffle the index order before windowing.
    pub shuffle: bool,
    /// Seed for the shuffle.
    pub seed: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limit: u32::MAX,
            skip: 0,
            shuffle: false,
            seed: 0,
        }
    }
}

/// Load the frames named by `<data_dir>/<index_name>.index`.
pub fn load_training_data(
    data_dir: &Path,
    index_name: &str,
    opts: &LoadOptions,
) -> Result<TrainData, LoadError> {
    let meta_path = data_dir.join("meta.json");
    let meta: DataMeta = serde_json::from_slice(&fs::read(&meta_path)?).map_err(|source| {
        LoadError::Meta {
            path: meta_path,
            source,
        }
    })?;

    if meta.width <= 0 || meta.height <= 0 {
        return Err(LoadError::BadGeometry {
            width: meta.width,
            height: meta.height,
        });
    }
    if meta.n_labels == 0 {
        return Err(LoadError::BadLabelCount);
    }

    let index_path = data_dir.join(format!("{index_name}.index"));
    let mut names: Vec<String> = fs::read_to_string(&index_path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect();

    if opts.shuffle {
        let mut rng = Mt19937GenRand32::new(opts.seed);
        names.shuffle(&mut rng);
    }

    let skip = opts.skip as usize;
    let names: Vec<String> = names
        .into_iter()
        .skip(skip)
        .take(opts.limit as usize)
        .collect();
    if names.is_empty() {
        return Err(LoadError::EmptyIndex(index_name.to_owned()));
    }

    let wh = (meta.width * meta.height) as usize;
    let mut depth = Vec::with_capacity(names.len() * wh);
    let mut labels = Vec::with_capacity(names.len() * wh);

    for name in &names {
        let depth_path = data_dir.join(format!("{name}.depth"));
        let bytes = fs::read(&depth_path)?;
        if bytes.len() != wh * 2 {
            return Err(LoadError::ImageSize {
                path: depth_path,
                expected: wh * 2,
                actual: bytes.len(),
            });
        }
        depth.extend(
            bytes
                .chunks_exact(2)
                .map(|c| f16::from_bits(u16::from_le_bytes([c[0], c[1]]))),
        );

        let label_path = data_dir.join(format!("{name}.labels"));
        let bytes = fs::read(&label_path)?;
        if bytes.len() != wh {
            return Err(LoadError::ImageSize {
                path: label_path,
                expected: wh,
                actual: bytes.len(),
            });
        }
        labels.extend_from_slice(&bytes);
    }

    info!(
        "loaded {} frames ({}x{}, {} labels)",
        names.len(),
        meta.width,
        meta.height,
        meta.n_labels
    );

    TrainData::from_blocks(
        meta.width,
        meta.height,
        meta.vertical_fov,
        meta.n_labels,
        names.len(),
        depth,
        labels,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_corpus(dir: &Path, names: &[&str], w: usize, h: usize) {
        let meta = format!(
            r#"{{"width": {w}, "height": {h}, "n_labels": 3, "vertical_fov": 1.0}}"#
        );
        fs::write(dir.join("meta.json"), meta).unwrap();

        let index: String = names.iter().map(|n| format!("{n}\n")).collect();
        fs::write(dir.join("train.index"), index).unwrap();

        for (i, name) in names.iter().enumerate() {
            let mut f = File::create(dir.join(format!("{name}.depth"))).unwrap();
            for _ in 0..w * h {
                f.write_all(&f16::from_f32(1.0 + i as f32).to_bits().to_le_bytes())
                    .unwrap();
            }
            fs::write(dir.join(format!("{name}.labels")), vec![i as u8; w * h]).unwrap();
        }
    }

    #[test]
    fn test_load_all_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path(), &["a", "b"], 3, 2);

        let data =
            load_training_data(dir.path(), "train", &LoadOptions::default()).unwrap();
        assert_eq!(data.n_images(), 2);
        assert_eq!(data.width, 3);
        assert_eq!(data.height, 2);
        assert_eq!(data.n_labels, 3);
        assert_eq!(f32::from(data.depth_image(1)[0]), 2.0);
        assert_eq!(data.label_image(1)[0], 1);
    }

    #[test]
    fn test_limit_and_skip() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path(), &["a", "b", "c"], 2, 2);

        let opts = LoadOptions {
            limit: 1,
            skip: 1,
            ..Default::default()
        };
        let data = load_training_data(dir.path(), "train", &opts).unwrap();
        assert_eq!(data.n_images(), 1);
        assert_eq!(data.label_image(0)[0], 1);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("f{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        write_corpus(dir.path(), &refs, 2, 2);

        let opts = LoadOptions {
            shuffle: true,
            seed: 7,
            ..Default::default()
        };
        let a = load_training_data(dir.path(), "train", &opts).unwrap();
        let b = load_training_data(dir.path(), "train", &opts).unwrap();
        assert_eq!(
            a.label_images.as_slice().unwrap(),
            b.label_images.as_slice().unwrap()
        );
    }

    #[test]
    fn test_short_depth_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path(), &["a"], 2, 2);
        fs::write(dir.path().join("a.depth"), [0u8; 3]).unwrap();

        let err = load_training_data(dir.path(), "train", &LoadOptions::default());
        assert!(matches!(err, Err(LoadError::ImageSize { .. })));
    }

    #[test]
    fn test_empty_window_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path(), &["a"], 2, 2);

        let opts = LoadOptions {
            skip: 5,
            ..Default::default()
        };
        let err = load_training_data(dir.path(), "train", &opts);
        assert!(matches!(err, Err(LoadError::EmptyIndex(_))));
    }
}
