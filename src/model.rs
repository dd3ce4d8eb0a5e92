//! Render model for two versions of a file shown side by side
//!
//! A `ChangesView` is a flat list of rows: every code row is followed by the
//! comments row where threads for that line are anchored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which version of the file a block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "left" | "old" => Some(Self::Left),
            "right" | "new" => Some(Self::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a file, with and without highlighting markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based
    pub line_number: u32,
    pub clear_code: String,
    pub code: String,
}

/// Character range inside a line, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Delete,
    Placeholder,
}

/// A line-level change emitted by a diff provider for one side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// 0-based. Padded position for placeholders, source position otherwise.
    pub line_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<CharRange>,
}

impl ChangeRecord {
    pub fn add(line_index: usize) -> Self {
        Self {
            kind: ChangeKind::Add,
            line_index,
            range: None,
        }
    }

    pub fn delete(line_index: usize) -> Self {
        Self {
            kind: ChangeKind::Delete,
            line_index,
            range: None,
        }
    }

    pub fn placeholder(line_index: usize) -> Self {
        Self {
            kind: ChangeKind::Placeholder,
            line_index,
            range: None,
        }
    }

    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.range = Some(CharRange { start, end });
        self
    }

    pub fn is_line_change(&self) -> bool {
        matches!(self.kind, ChangeKind::Add | ChangeKind::Delete)
    }
}

/// Coordinate space of Add/Delete indices in a `TextDiff`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSpace {
    /// Position among the real lines of the file
    #[default]
    Source,
    /// Position in the placeholder-padded block
    Padded,
}

/// Two file versions and the per-side change records between them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDiff {
    pub left_file_contents: String,
    pub right_file_contents: String,
    #[serde(default)]
    pub left_diff_lines: Vec<ChangeRecord>,
    #[serde(default)]
    pub right_diff_lines: Vec<ChangeRecord>,
    #[serde(default)]
    pub index_space: IndexSpace,
}

impl TextDiff {
    pub fn diff_lines(&self, side: Side) -> &[ChangeRecord] {
        match side {
            Side::Left => &self.left_diff_lines,
            Side::Right => &self.right_diff_lines,
        }
    }

    pub fn contents(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.left_file_contents,
            Side::Right => &self.right_file_contents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
}

/// A discussion anchored to one line of one file version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub file_path: String,
    /// Identifies the file version (side) the thread was written against
    pub commit_id: String,
    pub line_number: u32,
    pub is_done: bool,
    pub comments: Vec<Comment>,
}

/// A thread as shown in a comments row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadFrame {
    pub thread: Thread,
}

/// One line of one side after alignment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockLine {
    pub clear_code: String,
    /// Code with highlighting markup
    pub code: String,
    /// `None` for placeholders
    pub line_number: Option<u32>,
    pub is_placeholder: bool,
    pub is_changed: bool,
    pub change: Option<CharRange>,
    pub threads: Vec<ThreadFrame>,
}

impl BlockLine {
    pub fn from_source(line: SourceLine) -> Self {
        Self {
            clear_code: line.clear_code,
            code: line.code,
            line_number: Some(line.line_number),
            ..Self::default()
        }
    }

    pub fn placeholder() -> Self {
        Self {
            is_placeholder: true,
            ..Self::default()
        }
    }

    /// Empty block of a comments row, carrying the code row's line number
    fn comments_for(code: &BlockLine) -> Self {
        Self {
            line_number: code.line_number,
            is_placeholder: true,
            ..Self::default()
        }
    }
}

/// A row of the rendered comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangesLine {
    Code {
        blocks: [BlockLine; 2],
        /// Index of the paired comments row
        comments_line: usize,
    },
    Comments {
        blocks: [BlockLine; 2],
    },
}

impl ChangesLine {
    pub fn code(left: BlockLine, right: BlockLine, comments_line: usize) -> Self {
        Self::Code {
            blocks: [left, right],
            comments_line,
        }
    }

    pub fn comments(left: &BlockLine, right: &BlockLine) -> Self {
        Self::Comments {
            blocks: [BlockLine::comments_for(left), BlockLine::comments_for(right)],
        }
    }

    pub fn blocks(&self) -> &[BlockLine; 2] {
        match self {
            Self::Code { blocks, .. } | Self::Comments { blocks } => blocks,
        }
    }

    pub fn blocks_mut(&mut self) -> &mut [BlockLine; 2] {
        match self {
            Self::Code { blocks, .. } | Self::Comments { blocks } => blocks,
        }
    }

    pub fn block(&self, side: Side) -> &BlockLine {
        &self.blocks()[side.index()]
    }

    pub fn is_comments_line(&self) -> bool {
        matches!(self, Self::Comments { .. })
    }

    /// Index of the comments row for a row stored at `index`
    pub fn comments_line(&self, index: usize) -> usize {
        match self {
            Self::Code { comments_line, .. } => *comments_line,
            Self::Comments { .. } => index,
        }
    }
}

/// Per-side map from line number to an index.
///
/// Maps to code rows in a group's lookup table and to group indices in the
/// open threads bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitMap {
    sides: [BTreeMap<u32, usize>; 2],
}

impl SplitMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, side: Side, line_number: u32) -> Option<usize> {
        self.sides[side.index()].get(&line_number).copied()
    }

    pub fn insert(&mut self, side: Side, line_number: u32, index: usize) {
        self.sides[side.index()].insert(line_number, index);
    }

    pub fn remove(&mut self, side: Side, line_number: u32) -> Option<usize> {
        self.sides[side.index()].remove(&line_number)
    }

    pub fn side(&self, side: Side) -> &BTreeMap<u32, usize> {
        &self.sides[side.index()]
    }

    pub fn len(&self) -> usize {
        self.sides.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.iter().all(BTreeMap::is_empty)
    }

    /// All `(side, line_number, index)` entries, left side first
    pub fn entries(&self) -> Vec<(Side, u32, usize)> {
        Side::BOTH
            .iter()
            .flat_map(|&side| {
                self.side(side)
                    .iter()
                    .map(move |(&line, &index)| (side, line, index))
            })
            .collect()
    }
}

/// Range of aligned rows shown together, `end` exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Section {
    pub start: usize,
    pub end: usize,
}

impl Section {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, row: usize) -> bool {
        self.start <= row && row < self.end
    }
}

/// Rows of one section plus their line number lookup table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeGroup {
    pub section: Section,
    pub lines: Vec<ChangesLine>,
    pub line_index: SplitMap,
    /// Rows exist above the section
    pub expand_up: bool,
    /// Rows exist below the section
    pub expand_down: bool,
}

/// Position of a row inside a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowRef {
    pub group: usize,
    pub row: usize,
}

/// Everything rendered for one file: the visible code groups in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangesView {
    pub groups: Vec<CodeGroup>,
    /// Aligned rows in the whole file, visible or not
    pub row_count: usize,
    /// Real lines per side in the whole file
    pub line_counts: [u32; 2],
}

impl ChangesView {
    /// Group and code row showing `line_number` of `side`
    pub fn locate(&self, side: Side, line_number: u32) -> Option<RowRef> {
        self.groups.iter().enumerate().find_map(|(group, code_group)| {
            code_group
                .line_index
                .get(side, line_number)
                .map(|row| RowRef { group, row })
        })
    }

    /// Is `line_number` a real line of `side`, visible or not?
    pub fn has_line(&self, side: Side, line_number: u32) -> bool {
        line_number >= 1 && line_number <= self.line_counts[side.index()]
    }

    pub fn sections(&self) -> Vec<Section> {
        self.groups.iter().map(|g| g.section).collect()
    }
}
