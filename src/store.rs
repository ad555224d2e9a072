//! Token files: `<prefix>_<sequence>.tvl`.
//!
//! One file per `LevelBlock`, encoded with bincode over a serde record. The
//! layout is private to this crate: the only promise is that `write_block`
//! and `read_block` of the same build agree. A leading format tag guards
//! against reading foreign files.
use crate::error::{RefineError, Result};
use crate::io::ensure_parent_dir;
use crate::level::{BlockTokens, LevelBlock, WorkingBuffer};
use crate::tensor::{pack, unpack};
use crate::types::Point;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File extension of token files.
pub const TOKEN_FILE_EXTENSION: &str = "tvl";

const FORMAT_TAG: u32 = 0x5456_4c01;

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    format: u32,
    scale: f64,
    scale_index: u64,
    points: Vec<[f64; 2]>,
    tensors: Vec<[f64; 3]>,
    resolved: Vec<bool>,
    selection: Vec<u64>,
    seeds: Option<Vec<[f64; 3]>>,
}

/// Contents of a token file after decoding.
#[derive(Debug)]
pub struct LoadedBlock {
    pub scale: f64,
    pub scale_index: usize,
    pub tokens: BlockTokens,
    pub selection: Vec<usize>,
    pub working: Option<WorkingBuffer>,
}

/// `<prefix>_<sequence>.tvl`
pub fn token_file_path(prefix: &str, sequence: u64) -> PathBuf {
    PathBuf::from(format!("{prefix}_{sequence}.{TOKEN_FILE_EXTENSION}"))
}

/// Writes the resident arrays and metadata of `block` to `path`.
///
/// Non-resident blocks are written as empty token lists, which never happens
/// through the driver (it only persists blocks it just loaded or built).
pub fn write_block(path: &Path, block: &LevelBlock) -> Result<()> {
    let empty = BlockTokens::default();
    let tokens = block.tokens().unwrap_or(&empty);
    let record = TokenFile {
        format: FORMAT_TAG,
        scale: block.scale(),
        scale_index: block.scale_index() as u64,
        points: tokens.points.iter().map(|p| [p.x, p.y]).collect(),
        tensors: tokens.tensors.iter().map(pack).collect(),
        resolved: tokens.resolved.clone(),
        selection: block.selection().iter().map(|&i| i as u64).collect(),
        seeds: block
            .working()
            .map(|w| w.seeds().iter().map(pack).collect()),
    };
    let bytes = bincode::serde::encode_to_vec(&record, bincode::config::standard()).map_err(
        |e| RefineError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    )?;
    ensure_parent_dir(path).map_err(|e| RefineError::io(path, e))?;
    fs::write(path, &bytes).map_err(|e| RefineError::io(path, e))?;
    debug!(
        "wrote {} tokens (scale index {}) to {} ({} bytes)",
        tokens.len(),
        block.scale_index(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

/// Reads a token file written by [`write_block`].
pub fn read_block(path: &Path) -> Result<LoadedBlock> {
    let bytes = fs::read(path).map_err(|e| RefineError::io(path, e))?;
    let (record, _): (TokenFile, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(|e| {
            RefineError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
    if record.format != FORMAT_TAG {
        return Err(RefineError::FormatMismatch {
            path: path.to_path_buf(),
            found: record.format,
        });
    }
    let n = record.points.len();
    if record.tensors.len() != n || record.resolved.len() != n {
        return Err(RefineError::Decode {
            path: path.to_path_buf(),
            message: format!(
                "array length mismatch: {} points, {} tensors, {} flags",
                n,
                record.tensors.len(),
                record.resolved.len()
            ),
        });
    }
    let tokens = BlockTokens {
        points: record.points.iter().map(|p| Point::new(p[0], p[1])).collect(),
        tensors: record.tensors.into_iter().map(unpack).collect(),
        resolved: record.resolved,
    };
    let working = record
        .seeds
        .map(|s| WorkingBuffer::new(s.into_iter().map(unpack).collect()));
    Ok(LoadedBlock {
        scale: record.scale,
        scale_index: record.scale_index as usize,
        tokens,
        selection: record.selection.into_iter().map(|i| i as usize).collect(),
        working,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellId;
    use crate::types::Tensor;

    #[test]
    fn written_block_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let mut block = LevelBlock::populate(
            CellId(0),
            1.5,
            vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
            Tensor::identity(),
        );
        {
            let tokens = block.tokens_mut().unwrap();
            tokens.tensors[1] = Tensor::new(2.0, 0.5, 0.5, 1.0);
            tokens.resolved[1] = true;
        }
        block.record_selection(1);

        let path = token_file_path(dir.path().join("run").to_str().unwrap(), 7);
        assert!(path.to_string_lossy().ends_with("run_7.tvl"));
        write_block(&path, &block).unwrap();

        let loaded = read_block(&path).unwrap();
        assert_eq!(loaded.scale, 1.5);
        assert_eq!(loaded.scale_index, 0);
        assert_eq!(&loaded.tokens, block.tokens().unwrap());
        assert_eq!(loaded.selection, vec![1]);
        assert_eq!(loaded.working.as_ref(), block.working());
    }

    #[test]
    fn released_working_buffer_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut block =
            LevelBlock::populate(CellId(0), 1.0, vec![Point::new(0.0, 0.0)], Tensor::identity());
        block.release_working();
        let path = dir.path().join("b_0.tvl");
        write_block(&path, &block).unwrap();
        assert!(read_block(&path).unwrap().working.is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_block(&dir.path().join("nope_0.tvl")).unwrap_err();
        assert!(matches!(err, RefineError::Io { .. }));
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk_0.tvl");
        fs::write(&path, [0xffu8; 3]).unwrap();
        assert!(read_block(&path).is_err());
    }
}
