//! Alignment of two file versions into one list of changes lines
//!
//! The pipeline pads each side with placeholders, marks changed lines and then
//! zips both sides into code rows, each followed by its comments row. Rows are
//! zipped per section, so a view may show only the context around changes.

use log::debug;

use crate::diff::rebase_change_indices;
use crate::error::AlignmentError;
use crate::model::{
    BlockLine, ChangeKind, ChangeRecord, ChangesLine, ChangesView, CodeGroup, IndexSpace, Section,
    Side, SplitMap, TextDiff,
};
use crate::section;
use crate::syntax::Highlighter;
use crate::tokenize::block_lines;

/// Insert a placeholder line for every placeholder record of one side.
///
/// Records are applied in ascending position, so each index is already the
/// final (padded) position of the placeholder.
pub fn insert_placeholders(
    side: Side,
    records: &[ChangeRecord],
    blocks: &mut Vec<BlockLine>,
) -> Result<(), AlignmentError> {
    let mut positions: Vec<usize> = records
        .iter()
        .filter(|r| r.kind == ChangeKind::Placeholder)
        .map(|r| r.line_index)
        .collect();
    positions.sort_unstable();

    for index in positions {
        if index > blocks.len() {
            return Err(AlignmentError::PlaceholderOutOfRange {
                side,
                index,
                len: blocks.len(),
            });
        }
        blocks.insert(index, BlockLine::placeholder());
    }

    Ok(())
}

/// Mark the lines referenced by add/delete records as changed.
///
/// Record indices count real lines only, placeholders are skipped.
pub fn apply_changes(
    side: Side,
    records: &[ChangeRecord],
    blocks: &mut [BlockLine],
) -> Result<(), AlignmentError> {
    let positions: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.is_placeholder)
        .map(|(i, _)| i)
        .collect();

    for record in records.iter().filter(|r| r.is_line_change()) {
        let Some(&position) = positions.get(record.line_index) else {
            return Err(AlignmentError::ChangeOutOfRange {
                side,
                index: record.line_index,
                len: positions.len(),
            });
        };
        let block = &mut blocks[position];
        block.is_changed = true;
        block.change = record.range;
    }

    Ok(())
}

/// Zip the rows of `section` into code rows and comments rows.
///
/// Row indices and the line index map are local to the returned group.
pub fn synchronize(
    left: &[BlockLine],
    right: &[BlockLine],
    section: Section,
) -> Result<CodeGroup, AlignmentError> {
    if left.len() != right.len() {
        return Err(AlignmentError::BlockLengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    if section.start > section.end || section.end > left.len() {
        return Err(AlignmentError::SectionOutOfRange {
            start: section.start,
            end: section.end,
            len: left.len(),
        });
    }

    let mut lines = Vec::with_capacity(section.len() * 2);
    let mut line_index = SplitMap::new();

    for (left_line, right_line) in left[section.start..section.end]
        .iter()
        .zip(&right[section.start..section.end])
    {
        let code_index = lines.len();
        for (side, block) in [(Side::Left, left_line), (Side::Right, right_line)] {
            if let (false, Some(line_number)) = (block.is_placeholder, block.line_number) {
                line_index.insert(side, line_number, code_index);
            }
        }

        lines.push(ChangesLine::code(
            left_line.clone(),
            right_line.clone(),
            code_index + 1,
        ));
        lines.push(ChangesLine::comments(left_line, right_line));
    }

    Ok(CodeGroup {
        section,
        lines,
        line_index,
        expand_up: section.start >= 1,
        expand_down: section.end < left.len(),
    })
}

/// Both sides padded to the same length, with changed lines marked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignedBlocks {
    pub left: Vec<BlockLine>,
    pub right: Vec<BlockLine>,
}

impl AlignedBlocks {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn whole_file(&self) -> Section {
        Section::new(0, self.len())
    }

    /// Rows where either side changed or is padded
    pub fn changed_rows(&self) -> Vec<usize> {
        self.left
            .iter()
            .zip(&self.right)
            .enumerate()
            .filter(|(_, (l, r))| {
                l.is_changed || r.is_changed || l.is_placeholder || r.is_placeholder
            })
            .map(|(row, _)| row)
            .collect()
    }

    /// Sections with `context` rows around every change
    pub fn sections(&self, context: usize) -> Vec<Section> {
        section::sections(&self.changed_rows(), context, self.len())
    }

    /// One code group per section
    pub fn view(&self, sections: &[Section]) -> Result<ChangesView, AlignmentError> {
        let groups = sections
            .iter()
            .map(|&section| synchronize(&self.left, &self.right, section))
            .collect::<Result<Vec<_>, _>>()?;

        let real_lines = |blocks: &[BlockLine]| {
            blocks.iter().filter(|b| !b.is_placeholder).count() as u32
        };
        Ok(ChangesView {
            groups,
            row_count: self.len(),
            line_counts: [real_lines(&self.left), real_lines(&self.right)],
        })
    }
}

/// Tokenize, pad and mark both sides of a text diff
pub fn align(
    text_diff: &TextDiff,
    language: &str,
    highlighter: &dyn Highlighter,
) -> Result<AlignedBlocks, AlignmentError> {
    let (left_records, mut left) = padded_side(text_diff, Side::Left, language, highlighter)?;
    let (right_records, mut right) = padded_side(text_diff, Side::Right, language, highlighter)?;

    if left.len() != right.len() {
        return Err(AlignmentError::BlockLengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    apply_changes(Side::Left, &left_records, &mut left)?;
    apply_changes(Side::Right, &right_records, &mut right)?;

    debug!(
        "aligned {} rows ({} left changes, {} right changes)",
        left.len(),
        left_records.iter().filter(|r| r.is_line_change()).count(),
        right_records.iter().filter(|r| r.is_line_change()).count(),
    );

    Ok(AlignedBlocks { left, right })
}

/// Run the whole pipeline for a text diff, showing the whole file as one group
pub fn build_changes(
    text_diff: &TextDiff,
    language: &str,
    highlighter: &dyn Highlighter,
) -> Result<ChangesView, AlignmentError> {
    let blocks = align(text_diff, language, highlighter)?;
    blocks.view(&[blocks.whole_file()])
}

fn padded_side(
    text_diff: &TextDiff,
    side: Side,
    language: &str,
    highlighter: &dyn Highlighter,
) -> Result<(Vec<ChangeRecord>, Vec<BlockLine>), AlignmentError> {
    let mut records = text_diff.diff_lines(side).to_vec();
    if text_diff.index_space == IndexSpace::Padded {
        rebase_change_indices(&mut records);
    }

    let mut blocks = block_lines(text_diff.contents(side), language, highlighter)?;
    insert_placeholders(side, &records, &mut blocks)?;
    Ok((records, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::PlainHighlighter;

    fn lines(text: &str) -> Vec<BlockLine> {
        block_lines(text, "clean", &PlainHighlighter).unwrap()
    }

    fn example_diff() -> TextDiff {
        TextDiff {
            left_file_contents: "a\nb\nc".to_string(),
            right_file_contents: "a\nx\nb\nc".to_string(),
            left_diff_lines: vec![ChangeRecord::placeholder(1)],
            right_diff_lines: vec![ChangeRecord::add(1).with_range(0, 1)],
            index_space: IndexSpace::Source,
        }
    }

    #[test]
    fn test_placeholders_inserted_in_ascending_order() {
        let mut blocks = lines("a\nb");
        let records = vec![ChangeRecord::placeholder(3), ChangeRecord::placeholder(1)];
        insert_placeholders(Side::Left, &records, &mut blocks).unwrap();

        let shape: Vec<bool> = blocks.iter().map(|b| b.is_placeholder).collect();
        assert_eq!(shape, vec![false, true, false, true]);
    }

    #[test]
    fn test_placeholder_out_of_range() {
        let mut blocks = lines("a");
        let err = insert_placeholders(Side::Right, &[ChangeRecord::placeholder(5)], &mut blocks)
            .unwrap_err();
        assert!(matches!(err, AlignmentError::PlaceholderOutOfRange { index: 5, .. }));
    }

    #[test]
    fn test_apply_changes_skips_placeholders() {
        let mut blocks = lines("a\nb");
        insert_placeholders(Side::Left, &[ChangeRecord::placeholder(0)], &mut blocks).unwrap();
        apply_changes(Side::Left, &[ChangeRecord::delete(1)], &mut blocks).unwrap();

        assert!(!blocks[1].is_changed);
        assert!(blocks[2].is_changed);
        assert_eq!(blocks[2].clear_code, "b");
    }

    #[test]
    fn test_apply_changes_out_of_range() {
        let mut blocks = lines("a");
        let err = apply_changes(Side::Left, &[ChangeRecord::delete(1)], &mut blocks).unwrap_err();
        assert!(matches!(err, AlignmentError::ChangeOutOfRange { index: 1, len: 1, .. }));
    }

    #[test]
    fn test_example_alignment() {
        let view = build_changes(&example_diff(), "clean", &PlainHighlighter).unwrap();
        let group = &view.groups[0];
        assert_eq!(group.lines.len(), 8);

        let code_rows: Vec<&ChangesLine> =
            group.lines.iter().filter(|l| !l.is_comments_line()).collect();
        assert_eq!(code_rows.len(), 4);

        let left_second = code_rows[1].block(Side::Left);
        let right_second = code_rows[1].block(Side::Right);
        assert!(left_second.is_placeholder);
        assert_eq!(right_second.clear_code, "x");
        assert!(right_second.is_changed);
        assert!(!code_rows[2].block(Side::Right).is_changed);
        assert_eq!(code_rows[3].block(Side::Left).clear_code, "c");
    }

    #[test]
    fn test_unequal_lengths_fail() {
        let mut diff = example_diff();
        diff.left_diff_lines.clear();
        let err = build_changes(&diff, "clean", &PlainHighlighter).unwrap_err();
        assert_eq!(err, AlignmentError::BlockLengthMismatch { left: 3, right: 4 });
    }

    #[test]
    fn test_rows_interleave() {
        let view = build_changes(&example_diff(), "clean", &PlainHighlighter).unwrap();
        for (i, pair) in view.groups[0].lines.chunks(2).enumerate() {
            assert!(!pair[0].is_comments_line());
            assert!(pair[1].is_comments_line());
            assert_eq!(pair[0].comments_line(2 * i), 2 * i + 1);
            assert_eq!(pair[1].comments_line(2 * i + 1), 2 * i + 1);
        }
    }

    #[test]
    fn test_line_index_is_complete() {
        let view = build_changes(&example_diff(), "clean", &PlainHighlighter).unwrap();
        let group = &view.groups[0];
        for side in Side::BOTH {
            let mut expected = 0;
            for (index, line) in group.lines.iter().enumerate() {
                let block = line.block(side);
                if line.is_comments_line() || block.is_placeholder {
                    continue;
                }
                let line_number = block.line_number.unwrap();
                assert_eq!(group.line_index.get(side, line_number), Some(index));
                expected += 1;
            }
            assert_eq!(group.line_index.side(side).len(), expected);
        }
        assert_eq!(group.line_index.get(Side::Right, 2), Some(2));
        assert_eq!(group.line_index.get(Side::Left, 2), Some(4));
        assert_eq!(view.line_counts, [3, 4]);
    }

    fn padded_diff(left_diff_lines: Vec<ChangeRecord>) -> TextDiff {
        // Deleted "b" sits after a placeholder in padded space.
        TextDiff {
            left_file_contents: "a\nb".to_string(),
            right_file_contents: "a\nz\nq".to_string(),
            left_diff_lines,
            right_diff_lines: vec![ChangeRecord::add(1), ChangeRecord::add(2)],
            index_space: IndexSpace::Padded,
        }
    }

    #[test]
    fn test_padded_indices_are_rebased() {
        let diff = padded_diff(vec![ChangeRecord::placeholder(1), ChangeRecord::delete(2)]);
        let view = build_changes(&diff, "clean", &PlainHighlighter).unwrap();
        let lines = &view.groups[0].lines;
        assert_eq!(lines[4].block(Side::Left).clear_code, "b");
        assert!(lines[4].block(Side::Left).is_changed);
        assert!(lines[2].block(Side::Left).is_placeholder);
    }

    #[test]
    fn test_padded_indices_grouped_by_kind() {
        let interleaved = padded_diff(vec![ChangeRecord::placeholder(1), ChangeRecord::delete(2)]);
        let grouped = padded_diff(vec![ChangeRecord::delete(2), ChangeRecord::placeholder(1)]);

        let expected = build_changes(&interleaved, "clean", &PlainHighlighter).unwrap();
        let view = build_changes(&grouped, "clean", &PlainHighlighter).unwrap();
        assert_eq!(view, expected);
    }

    fn long_diff() -> TextDiff {
        let left: Vec<String> = (1..=30).map(|n| format!("line {}", n)).collect();
        let mut right = left.clone();
        right[2] = "changed 3".to_string();
        right[24] = "changed 25".to_string();
        TextDiff {
            left_file_contents: left.join("\n"),
            right_file_contents: right.join("\n"),
            left_diff_lines: vec![ChangeRecord::delete(2), ChangeRecord::delete(24)],
            right_diff_lines: vec![ChangeRecord::add(2), ChangeRecord::add(24)],
            index_space: IndexSpace::Source,
        }
    }

    #[test]
    fn test_view_per_section() {
        let blocks = align(&long_diff(), "clean", &PlainHighlighter).unwrap();
        assert_eq!(blocks.changed_rows(), vec![2, 24]);

        let sections = blocks.sections(5);
        assert_eq!(sections, vec![Section::new(0, 8), Section::new(19, 30)]);

        let view = blocks.view(&sections).unwrap();
        assert_eq!(view.groups.len(), 2);
        assert_eq!(view.row_count, 30);

        let first = &view.groups[0];
        assert_eq!(first.lines.len(), 16);
        assert!(!first.expand_up);
        assert!(first.expand_down);
        assert_eq!(first.line_index.get(Side::Right, 3), Some(4));
        assert_eq!(first.line_index.get(Side::Right, 9), None);

        // Row indices restart in every group.
        let second = &view.groups[1];
        assert!(second.expand_up);
        assert!(!second.expand_down);
        assert_eq!(second.line_index.get(Side::Left, 20), Some(0));
        assert_eq!(second.line_index.get(Side::Left, 25), Some(10));
        assert!(second.lines[10].block(Side::Left).is_changed);

        assert_eq!(view.locate(Side::Left, 25).map(|r| (r.group, r.row)), Some((1, 10)));
        assert_eq!(view.locate(Side::Left, 12), None);
        assert!(view.has_line(Side::Left, 12));
        assert!(!view.has_line(Side::Left, 31));
    }

    #[test]
    fn test_section_out_of_range() {
        let blocks = align(&example_diff(), "clean", &PlainHighlighter).unwrap();
        let err = blocks.view(&[Section::new(2, 9)]).unwrap_err();
        assert_eq!(err, AlignmentError::SectionOutOfRange { start: 2, end: 9, len: 4 });
    }
}
