//! Error types for building and annotating file changes
//!
//! Alignment errors are fatal for the current render. Anchor errors only skip
//! the offending thread.

use thiserror::Error;

use crate::model::Side;

/// Structural failures while aligning two versions of a file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("highlighted and clear lines don't match ({clear} clear, {highlighted} highlighted)")]
    LineCountMismatch { clear: usize, highlighted: usize },

    #[error("placeholder at {index} is out of range for {side} block of {len} lines")]
    PlaceholderOutOfRange { side: Side, index: usize, len: usize },

    #[error("change at line index {index} is out of range for {side} block of {len} lines")]
    ChangeOutOfRange { side: Side, index: usize, len: usize },

    #[error("blocks should have the same amount of lines (left {left}, right {right})")]
    BlockLengthMismatch { left: usize, right: usize },

    #[error("no changes line for {side} line {line_number}")]
    MissingLineIndex { side: Side, line_number: u32 },

    #[error("no changes line at index {0}")]
    MissingRow(usize),

    #[error("section {start}..{end} is out of range for {len} rows")]
    SectionOutOfRange { start: usize, end: usize, len: usize },

    #[error("no code group at index {0}")]
    MissingGroup(usize),

    #[error("no thread {thread_index} below changes line {line_index}")]
    MissingThread { line_index: usize, thread_index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    #[error("undefined side for thread {thread_id} (commit {commit_id})")]
    UndefinedSide { thread_id: String, commit_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedOperation {
    #[error("comment cannot be added to an uncommitted file ({side} side)")]
    UncommittedFile { side: Side },
}

/// Any failure from a thread anchoring operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Anchor(#[from] AnchorError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperation),
}
