//! Output directory layout and deterministic artifact naming.

use crate::cosim_error::CosimError;
use crate::topology::NodeRole;
use std::path::{Path, PathBuf};

/// Per-node output directory, created once during configuration.
///
/// Layout is `{dir}/{RoleName}{suffix}/` with `RoleName` one of
/// "MBS", "TIRE", "TERRAIN". All later data and checkpoint files for
/// the node land inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    out_dir: PathBuf,
    node_dir: PathBuf,
}

impl OutputLayout {
    /// Create the node subdirectory under `dir`, failing fast if the
    /// filesystem refuses.
    pub fn create(
        dir: impl AsRef<Path>,
        role: NodeRole,
        suffix: &str,
    ) -> Result<Self, CosimError> {
        let out_dir = dir.as_ref().to_path_buf();
        let node_dir = out_dir.join(format!("{}{suffix}", role.as_str()));
        std::fs::create_dir_all(&node_dir).map_err(|source| CosimError::OutputDir {
            path: node_dir.display().to_string(),
            source,
        })?;
        Ok(OutputLayout { out_dir, node_dir })
    }

    /// Top-level output directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// This node's own subdirectory.
    pub fn node_dir(&self) -> &Path {
        &self.node_dir
    }

    /// Resolve a checkpoint or data file name inside the node directory.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.node_dir.join(filename)
    }
}

/// Utility function for creating an output file name.
///
/// Produces `"{dir}/{root}_{frame}.{ext}"` with `frame` zero-padded to
/// `frame_digits` digits. Pure and deterministic for identical inputs.
pub fn output_filename(dir: &str, root: &str, ext: &str, frame: u32, frame_digits: usize) -> String {
    format!("{dir}/{root}_{frame:0frame_digits$}.{ext}")
}
