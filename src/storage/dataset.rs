//! Offline reader for a captured dataset

use std::fs;
use std::path::Path;

use crate::capture::ImageBuffer;
use crate::error::StorageError;
use crate::storage::writer::DatasetLayout;
use crate::storage::{bitmap, depth_png, log};
use crate::sync::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationRecord {
    pub timestamp: Timestamp,
    pub color: String,
    pub depth: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthRecord {
    pub timestamp: Timestamp,
    pub depth: String,
}

pub struct Dataset {
    layout: DatasetLayout,
}

impl Dataset {
    pub fn open(layout: DatasetLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Parse every non-empty line of a log. A missing log reads as empty.
    fn records<T>(
        path: &Path,
        arity: usize,
        build: impl Fn(Timestamp, Vec<&str>) -> T,
    ) -> Result<Vec<T>, StorageError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        let malformed = |line: usize, reason: String| StorageError::MalformedRecord {
            path: path.to_path_buf(),
            line,
            reason,
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                let (key, fields) = log::parse_record(line)
                    .ok_or_else(|| malformed(idx + 1, "missing tab separator".into()))?;
                let timestamp: Timestamp =
                    key.parse().map_err(|e| malformed(idx + 1, format!("{e}")))?;
                if fields.len() != arity {
                    return Err(malformed(
                        idx + 1,
                        format!("expected {arity} paths, found {}", fields.len()),
                    ));
                }
                Ok(build(timestamp, fields))
            })
            .collect()
    }

    pub fn associations(&self) -> Result<Vec<AssociationRecord>, StorageError> {
        Self::records(&self.layout.associations_path(), 2, |timestamp, fields| {
            AssociationRecord {
                timestamp,
                color: fields[0].to_owned(),
                depth: fields[1].to_owned(),
            }
        })
    }

    pub fn depth_records(&self) -> Result<Vec<DepthRecord>, StorageError> {
        Self::records(&self.layout.depth_log_path(), 1, |timestamp, fields| DepthRecord {
            timestamp,
            depth: fields[0].to_owned(),
        })
    }

    /// Load a bitmap named by either the association log or
    /// `rgb_timestamps.txt`
    pub fn load_color(&self, relative: &str) -> Result<ImageBuffer, StorageError> {
        bitmap::load_color_image(&self.layout.resolve_color(relative))
    }

    pub fn load_depth(&self, relative: &str) -> Result<ImageBuffer, StorageError> {
        depth_png::load_depth_image(&self.layout.resolve(relative))
    }

    /// Association records whose depth file was never written.
    ///
    /// The color path logs the pairing before the depth path has persisted
    /// anything, so these are expected when the depth side skipped a
    /// timestamp.
    pub fn dangling_associations(&self) -> Result<Vec<AssociationRecord>, StorageError> {
        Ok(self
            .associations()?
            .into_iter()
            .filter(|record| !self.layout.resolve(&record.depth).exists())
            .collect())
    }
}
