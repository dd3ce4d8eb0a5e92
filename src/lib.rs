//! sidelines - side-by-side file changes with anchored comment threads
//!
//! Aligns two versions of a file into rows of left/right lines padded with
//! placeholders, marks changed lines, and attaches review threads below the
//! lines they were written on.

pub mod align;
pub mod config;
pub mod diff;
pub mod error;
pub mod export;
pub mod model;
pub mod revision;
pub mod section;
pub mod storage;
pub mod syntax;
pub mod template;
pub mod threads;
pub mod tokenize;

pub use align::build_changes;
pub use error::{AlignmentError, AnchorError, ThreadError, UnsupportedOperation};
pub use model::{ChangesLine, ChangesView, CodeGroup, Section, Side, TextDiff, Thread};
pub use threads::CodeChanges;
