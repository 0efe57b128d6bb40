//! The RDT artifact codec.
//!
//! # Format Structure
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       3     Magic ("RDT")
//! 3       1     Format version
//! 4       1     Tree depth
//! 5       1     Number of labels
//! 6       1     Background label index
//! 7       4     Vertical FOV, f32
//! 11      24*N  Node array, N = 2^depth - 1
//!               (4 x f32 uv, f32 t, u32 label_pr_idx)
//! ...     4*L*K Probability tables, K inferred from the file length
//! ```
//!
//! Everything is little-endian. A file written mid-training (checkpoint)
//! carries `u32::MAX` in the `label_pr_idx` of untrained slots; a finalized
//! artifact never does.
//!
//! A sibling human-readable dump of the same content is produced by
//! [`save_tree_json`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::repr::{Node, RdTree, TreeHeader};

/// Magic bytes identifying an RDT artifact.
pub const MAGIC: &[u8; 3] = b"RDT";

/// Current format version.
pub const RDT_VERSION: u8 = 3;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 11;

/// Size of one serialized node in bytes.
pub const NODE_SIZE: usize = 24;

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced while reading or writing RDT artifacts.
#[derive(Debug, Error)]
pub enum CodecError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the RDT magic.
    #[error("not an RDT file")]
    NotAnRdtFile,

    /// File was written by a newer format revision.
    #[error("unsupported RDT version {0}")]
    UnsupportedVersion(u8),

    /// File ended before the declared node array.
    #[error("file truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Structurally invalid content.
    #[error("malformed RDT file: {0}")]
    Malformed(String),
}

// ============================================================================
// Binary codec
// ============================================================================

/// Serialize a tree to a writer.
pub fn write_to<W: Write>(writer: &mut W, tree: &RdTree) -> Result<(), CodecError> {
    let header = &tree.header;
    writer.write_all(MAGIC)?;
    writer.write_all(&[
        header.version,
        header.depth,
        header.n_labels,
        header.background_label,
    ])?;
    writer.write_all(&header.fov.to_le_bytes())?;

    let mut buf = [0u8; NODE_SIZE];
    for node in &tree.nodes {
        for (i, c) in node.uv.iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&c.to_le_bytes());
        }
        buf[16..20].copy_from_slice(&node.t.to_le_bytes());
        buf[20..24].copy_from_slice(&node.label_pr_idx.to_le_bytes());
        writer.write_all(&buf)?;
    }

    for p in &tree.label_pr_tables {
        writer.write_all(&p.to_le_bytes())?;
    }

    Ok(())
}

/// Deserialize a tree from a reader.
pub fn read_from<R: Read>(reader: &mut R) -> Result<RdTree, CodecError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    if &bytes[0..3] != MAGIC {
        return Err(CodecError::NotAnRdtFile);
    }

    let version = bytes[3];
    if version > RDT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let header = TreeHeader {
        version,
        depth: bytes[4],
        n_labels: bytes[5],
        background_label: bytes[6],
        fov: f32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]),
    };

    if header.depth == 0 {
        return Err(CodecError::Malformed("zero tree depth".into()));
    }
    if header.n_labels == 0 {
        return Err(CodecError::Malformed("zero label count".into()));
    }

    let n_nodes = RdTree::n_nodes_for_depth(header.depth);
    let nodes_end = HEADER_SIZE + n_nodes * NODE_SIZE;
    if bytes.len() < nodes_end {
        return Err(CodecError::Truncated {
            expected: nodes_end,
            actual: bytes.len(),
        });
    }

    let mut nodes = Vec::with_capacity(n_nodes);
    for chunk in bytes[HEADER_SIZE..nodes_end].chunks_exact(NODE_SIZE) {
        let mut uv = [0.0f32; 4];
        for (i, c) in uv.iter_mut().enumerate() {
            *c = f32::from_le_bytes(chunk[i * 4..i * 4 + 4].try_into().unwrap());
        }
        nodes.push(Node {
            uv,
            t: f32::from_le_bytes(chunk[16..20].try_into().unwrap()),
            label_pr_idx: u32::from_le_bytes(chunk[20..24].try_into().unwrap()),
        });
    }

    let table_bytes = &bytes[nodes_end..];
    let table_stride = header.n_labels as usize * 4;
    if table_bytes.len() % table_stride != 0 {
        return Err(CodecError::Malformed(format!(
            "probability table region is {} bytes, not a multiple of {}",
            table_bytes.len(),
            table_stride
        )));
    }
    let label_pr_tables = table_bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect();

    Ok(RdTree {
        header,
        nodes,
        label_pr_tables,
    })
}

/// Save a tree to `path` in the binary RDT format.
pub fn save_tree<P: AsRef<Path>>(tree: &RdTree, path: P) -> Result<(), CodecError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(&mut writer, tree)?;
    writer.flush()?;
    Ok(())
}

/// Load a tree from `path`.
pub fn read_tree<P: AsRef<Path>>(path: P) -> Result<RdTree, CodecError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_from(&mut reader)
}

// ============================================================================
// JSON dump
// ============================================================================

#[derive(Serialize)]
struct JsonNode {
    u: [f32; 2],
    v: [f32; 2],
    t: f32,
    label_pr_idx: u32,
}

#[derive(Serialize)]
struct JsonTree<'a> {
    version: u8,
    depth: u8,
    n_labels: u8,
    background_label: u8,
    vertical_fov: f32,
    nodes: Vec<JsonNode>,
    label_pr_tables: Vec<&'a [f32]>,
}

/// Save a human-readable JSON rendition of the tree to `path`.
pub fn save_tree_json<P: AsRef<Path>>(tree: &RdTree, path: P) -> Result<(), CodecError> {
    let n_labels = tree.header.n_labels as usize;
    let dump = JsonTree {
        version: tree.header.version,
        depth: tree.header.depth,
        n_labels: tree.header.n_labels,
        background_label: tree.header.background_label,
        vertical_fov: tree.header.fov,
        nodes: tree
            .nodes
            .iter()
            .map(|n| JsonNode {
                u: [n.uv[0], n.uv[1]],
                v: [n.uv[2], n.uv[3]],
                t: n.t,
                label_pr_idx: n.label_pr_idx,
            })
            .collect(),
        label_pr_tables: tree.label_pr_tables.chunks(n_labels).collect(),
    };

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &dump)
        .map_err(|e| CodecError::Malformed(e.to_string()))?;
    writer.flush()?;
    Ok(())
}
