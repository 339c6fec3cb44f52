use std::fs;
use std::path::{Path, PathBuf};

use crate::dedup::DedupOptions;
use crate::errors::{DedupError, Result};
use crate::io::is_stdio;

/// Default location of the observed-UMI side file.
pub const DEFAULT_UNIQUE_UMIS_PATH: &str = "unique-umis.txt";

/// Everything a deduplication run needs, built once from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// Coordinate-sorted SAM input (`-` for stdin).
    pub input: PathBuf,
    /// UMI allow-list, one per line.
    pub umi_list: PathBuf,
    /// SAM output (`-` for stdout).
    pub output: PathBuf,
    /// Side file receiving every distinct UMI observed.
    pub unique_umis: PathBuf,
    pub options: DedupOptions,
    /// Show a spinner while processing.
    pub progress: bool,
}

impl Config {
    /// Check the paths before any processing starts.
    pub fn validate(&self) -> Result<()> {
        if !is_stdio(&self.input) {
            check_readable(&self.input)?;
        }
        check_readable(&self.umi_list)?;

        for (path, what) in [(&self.output, "output"), (&self.unique_umis, "UMI side file")] {
            if !is_stdio(path) && same_file(path, &self.input) {
                return Err(DedupError::Config {
                    path: path.clone(),
                    reason: format!("{what} would overwrite the input"),
                });
            }
        }
        if !is_stdio(&self.output) && same_file(&self.output, &self.unique_umis) {
            return Err(DedupError::Config {
                path: self.output.clone(),
                reason: "output and UMI side file are the same path".to_string(),
            });
        }
        if self.options.umi_length == 0 {
            return Err(DedupError::Config {
                path: self.umi_list.clone(),
                reason: "UMI length must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// True when SAM records go to stdout, so reports must use stderr.
    pub fn writes_to_stdout(&self) -> bool {
        is_stdio(&self.output)
    }
}

fn check_readable(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(|e| DedupError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !meta.is_file() {
        return Err(DedupError::Config {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    fs::File::open(path).map_err(|e| DedupError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
