use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use crate::io::open_input;

/// Immutable set of known UMI sequences.
#[derive(Debug, Default, Clone)]
pub struct UmiAllowList {
    umis: HashSet<String>,
}

impl UmiAllowList {
    /// Read one UMI per line. Surrounding whitespace is trimmed and blank lines
    /// are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut umis = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            let umi = line.trim();
            if !umi.is_empty() {
                umis.insert(umi.to_string());
            }
        }
        Ok(Self { umis })
    }

    /// Load the allow-list file at `path` (plain or `.gz`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_input(path)?;
        let list = Self::from_reader(reader)
            .with_context(|| format!("Failed to read UMI list {}", path.display()))?;
        if list.is_empty() {
            warn!("UMI list {} is empty; every record will be rejected", path.display());
        } else {
            info!("Loaded {} UMIs from {}", list.len(), path.display());
        }
        Ok(list)
    }

    pub fn contains(&self, umi: &str) -> bool {
        self.umis.contains(umi)
    }

    pub fn len(&self) -> usize {
        self.umis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.umis.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for UmiAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { umis: iter.into_iter().map(Into::into).collect() }
    }
}
