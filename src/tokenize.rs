//! Splits file content into lines paired with their highlighted rendition

use crate::error::AlignmentError;
use crate::model::{BlockLine, SourceLine};
use crate::syntax::Highlighter;

/// Pair raw lines with highlighted lines. The highlighter must keep the line count.
pub fn tokenize(clear: &str, markup: &str) -> Result<Vec<SourceLine>, AlignmentError> {
    let clear_lines: Vec<&str> = clear.split('\n').collect();
    let highlighted_lines: Vec<&str> = markup.split('\n').collect();

    if clear_lines.len() != highlighted_lines.len() {
        return Err(AlignmentError::LineCountMismatch {
            clear: clear_lines.len(),
            highlighted: highlighted_lines.len(),
        });
    }

    Ok(clear_lines
        .into_iter()
        .zip(highlighted_lines)
        .enumerate()
        .map(|(index, (clear_code, code))| SourceLine {
            line_number: index as u32 + 1,
            clear_code: clear_code.strip_suffix('\r').unwrap_or(clear_code).to_string(),
            code: code.strip_suffix('\r').unwrap_or(code).to_string(),
        })
        .collect())
}

/// Highlight `content` and wrap each line as an unaligned block line
pub fn block_lines(
    content: &str,
    language: &str,
    highlighter: &dyn Highlighter,
) -> Result<Vec<BlockLine>, AlignmentError> {
    let markup = highlighter.highlight(content, language);
    let lines = tokenize(content, &markup)?;
    Ok(lines.into_iter().map(BlockLine::from_source).collect())
}
