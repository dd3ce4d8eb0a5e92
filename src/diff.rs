//! Diff providers producing per-side change records
//!
//! The line diff itself comes from `similar` or from a pre-computed JSON dump;
//! this module only converts it into add/delete/placeholder records.

use anyhow::{Context, Result};
use serde::Deserialize;
use similar::{capture_diff_slices, Algorithm, DiffOp};
use std::path::{Path, PathBuf};

use crate::model::{ChangeKind, ChangeRecord, CharRange, IndexSpace, TextDiff};

/// Produces the change records between two versions of a file
pub trait DiffProvider {
    fn text_diff(&self, left: &str, right: &str) -> Result<TextDiff>;
}

/// Line diff computed in-process with `similar`
#[derive(Debug, Clone, Copy)]
pub struct SimilarDiffProvider {
    algorithm: Algorithm,
}

impl Default for SimilarDiffProvider {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Myers,
        }
    }
}

impl SimilarDiffProvider {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }
}

/// Emits records for one diff, tracking the shared padded row
#[derive(Default)]
struct RecordBuilder {
    left: Vec<ChangeRecord>,
    right: Vec<ChangeRecord>,
    row: usize,
}

impl RecordBuilder {
    fn equal(&mut self, len: usize) {
        self.row += len;
    }

    fn delete(&mut self, old_index: usize, old_len: usize) {
        for k in 0..old_len {
            self.left.push(ChangeRecord::delete(old_index + k));
            self.right.push(ChangeRecord::placeholder(self.row + k));
        }
        self.row += old_len;
    }

    fn insert(&mut self, new_index: usize, new_len: usize) {
        for k in 0..new_len {
            self.left.push(ChangeRecord::placeholder(self.row + k));
            self.right.push(ChangeRecord::add(new_index + k));
        }
        self.row += new_len;
    }

    /// Replaced lines are paired up; the longer side's tail is padded on the other side
    fn replace(&mut self, old: &[&str], old_index: usize, new: &[&str], new_index: usize) {
        let paired = old.len().min(new.len());
        for k in 0..paired {
            let (left_range, right_range) = changed_range(old[k], new[k]);
            let mut delete = ChangeRecord::delete(old_index + k);
            delete.range = left_range;
            let mut add = ChangeRecord::add(new_index + k);
            add.range = right_range;
            self.left.push(delete);
            self.right.push(add);
        }
        self.row += paired;

        if old.len() > paired {
            self.delete(old_index + paired, old.len() - paired);
        }
        if new.len() > paired {
            self.insert(new_index + paired, new.len() - paired);
        }
    }
}

impl DiffProvider for SimilarDiffProvider {
    fn text_diff(&self, left: &str, right: &str) -> Result<TextDiff> {
        let old_lines = split_lines(left);
        let new_lines = split_lines(right);

        let mut builder = RecordBuilder::default();
        for op in capture_diff_slices(self.algorithm, &old_lines, &new_lines) {
            match op {
                DiffOp::Equal { len, .. } => builder.equal(len),
                DiffOp::Delete {
                    old_index, old_len, ..
                } => builder.delete(old_index, old_len),
                DiffOp::Insert {
                    new_index, new_len, ..
                } => builder.insert(new_index, new_len),
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => builder.replace(
                    &old_lines[old_index..old_index + old_len],
                    old_index,
                    &new_lines[new_index..new_index + new_len],
                    new_index,
                ),
            }
        }

        Ok(TextDiff {
            left_file_contents: left.to_string(),
            right_file_contents: right.to_string(),
            left_diff_lines: builder.left,
            right_diff_lines: builder.right,
            index_space: IndexSpace::Source,
        })
    }
}

/// Reads a diff computed by an external service from a JSON file.
///
/// The file contents inside the dump take precedence, even when empty. The
/// `left`/`right` arguments are used only when the dump omits them.
#[derive(Debug, Clone)]
pub struct JsonDiffProvider {
    path: PathBuf,
}

impl JsonDiffProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Deserialize)]
struct DiffDump {
    left_file_contents: Option<String>,
    right_file_contents: Option<String>,
    #[serde(default)]
    left_diff_lines: Vec<ChangeRecord>,
    #[serde(default)]
    right_diff_lines: Vec<ChangeRecord>,
    #[serde(default)]
    index_space: IndexSpace,
}

impl DiffProvider for JsonDiffProvider {
    fn text_diff(&self, left: &str, right: &str) -> Result<TextDiff> {
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read diff file {}", self.path.display()))?;
        let dump: DiffDump = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid diff file {}", self.path.display()))?;

        Ok(TextDiff {
            left_file_contents: dump.left_file_contents.unwrap_or_else(|| left.to_string()),
            right_file_contents: dump.right_file_contents.unwrap_or_else(|| right.to_string()),
            left_diff_lines: dump.left_diff_lines,
            right_diff_lines: dump.right_diff_lines,
            index_space: dump.index_space,
        })
    }
}

/// Convert add/delete indices from padded space to source space.
///
/// Each add/delete index drops by the number of placeholders at lower padded
/// positions. Record order does not matter.
pub fn rebase_change_indices(records: &mut [ChangeRecord]) {
    let mut placeholders: Vec<usize> = records
        .iter()
        .filter(|r| r.kind == ChangeKind::Placeholder)
        .map(|r| r.line_index)
        .collect();
    placeholders.sort_unstable();

    for record in records.iter_mut().filter(|r| r.is_line_change()) {
        let below = placeholders.partition_point(|&p| p < record.line_index);
        record.line_index -= below;
    }
}

/// Changed char ranges of two paired lines, from their common prefix and suffix.
///
/// Returns `None` for a side whose whole line changed or that has no changed chars.
pub fn changed_range(old: &str, new: &str) -> (Option<CharRange>, Option<CharRange>) {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let prefix = old_chars
        .iter()
        .zip(&new_chars)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old_chars.len().min(new_chars.len()) - prefix;
    let suffix = old_chars
        .iter()
        .rev()
        .zip(new_chars.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let range = |len: usize| {
        let end = len - suffix;
        if prefix == end || (prefix == 0 && end == len) {
            None
        } else {
            Some(CharRange { start: prefix, end })
        }
    };

    (range(old_chars.len()), range(new_chars.len()))
}

fn split_lines(content: &str) -> Vec<&str> {
    content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}
