//! Sections of context around changes
//!
//! A section is a range of aligned rows. Changes closer than twice the
//! context share a section, and sections that touch after expanding merge.

use crate::model::Section;

/// Default context kept around each change
pub const LINES_AROUND_CHANGE: usize = 5;

/// Rows revealed by one expand step
pub const EXPAND_AMOUNT: usize = 5;

/// Sections covering `context` rows around each changed row.
///
/// `changed_rows` must be ascending. Rows are clamped to `0..row_count`.
pub fn sections(changed_rows: &[usize], context: usize, row_count: usize) -> Vec<Section> {
    let mut sections = Vec::new();
    let Some(&first) = changed_rows.first() else {
        return sections;
    };

    let mut start = first;
    let mut last = first;
    for &row in &changed_rows[1..] {
        if row - last > context * 2 {
            sections.push(around(start, last, context, row_count));
            start = row;
        }
        last = row;
    }
    sections.push(around(start, last, context, row_count));

    merge_sections(&sections)
}

fn around(first: usize, last: usize, context: usize, row_count: usize) -> Section {
    Section::new(
        first.saturating_sub(context),
        (last + 1 + context).min(row_count),
    )
}

/// Sort and merge sections whose rows overlap or touch
pub fn merge_sections(sections: &[Section]) -> Vec<Section> {
    let mut sorted: Vec<Section> = sections.iter().copied().filter(|s| !s.is_empty()).collect();
    sorted.sort();

    let mut merged: Vec<Section> = Vec::with_capacity(sorted.len());
    for section in sorted {
        match merged.last_mut() {
            Some(previous) if previous.end >= section.start => {
                previous.end = previous.end.max(section.end);
            }
            _ => merged.push(section),
        }
    }
    merged
}

/// Index of the section containing `row`
pub fn group_index(sections: &[Section], row: usize) -> Option<usize> {
    sections.iter().position(|s| s.contains(row))
}

/// Reveal `amount` more rows above section `group`
pub fn expand_up(sections: &[Section], group: usize, amount: usize) -> Vec<Section> {
    let mut expanded = sections.to_vec();
    if let Some(section) = expanded.get_mut(group) {
        section.start = section.start.saturating_sub(amount);
    }
    merge_sections(&expanded)
}

/// Reveal `amount` more rows below section `group`
pub fn expand_down(
    sections: &[Section],
    group: usize,
    amount: usize,
    row_count: usize,
) -> Vec<Section> {
    let mut expanded = sections.to_vec();
    if let Some(section) = expanded.get_mut(group) {
        section.end = (section.end + amount).min(row_count);
    }
    merge_sections(&expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_around_changes() {
        assert!(sections(&[], 5, 100).is_empty());
        assert_eq!(sections(&[2], 5, 100), vec![Section::new(0, 8)]);
        assert_eq!(sections(&[50], 5, 53), vec![Section::new(45, 53)]);
    }

    #[test]
    fn test_close_changes_share_a_section() {
        // 10 rows apart is still within twice the context.
        assert_eq!(sections(&[20, 30], 5, 100), vec![Section::new(15, 36)]);
        // Sections that only touch after adding context merge as well.
        assert_eq!(
            sections(&[20, 31, 60], 5, 100),
            vec![Section::new(15, 37), Section::new(55, 66)]
        );
    }

    #[test]
    fn test_merge_sections() {
        let merged = merge_sections(&[
            Section::new(30, 40),
            Section::new(0, 10),
            Section::new(10, 12),
            Section::new(35, 50),
            Section::new(60, 60),
        ]);
        assert_eq!(merged, vec![Section::new(0, 12), Section::new(30, 50)]);
    }

    #[test]
    fn test_expand_merges_neighbours() {
        let sections = vec![Section::new(0, 8), Section::new(12, 20)];
        let down = expand_down(&sections, 0, EXPAND_AMOUNT, 30);
        assert_eq!(down, vec![Section::new(0, 20)]);

        let up = expand_up(&sections, 1, 2);
        assert_eq!(up, vec![Section::new(0, 8), Section::new(10, 20)]);

        let clamped = expand_down(&sections, 1, 50, 30);
        assert_eq!(clamped[1], Section::new(12, 30));
        assert_eq!(expand_up(&sections, 7, 5), sections);
    }

    #[test]
    fn test_group_index() {
        let sections = vec![Section::new(0, 8), Section::new(12, 20)];
        assert_eq!(group_index(&sections, 7), Some(0));
        assert_eq!(group_index(&sections, 8), None);
        assert_eq!(group_index(&sections, 12), Some(1));
    }
}
