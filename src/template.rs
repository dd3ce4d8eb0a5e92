//! Per-line presentation helpers used by the exporters

use crate::model::{BlockLine, ChangesLine, Side};
use crate::syntax::escape_html;

/// CSS class describing a block line's background
pub fn line_background(changes_line: &ChangesLine, side: Side, block: &BlockLine) -> &'static str {
    if changes_line.is_comments_line() {
        "comments"
    } else if block.is_placeholder {
        "placeholder"
    } else if block.is_changed {
        match side {
            Side::Left => "left-file",
            Side::Right => "right-file",
        }
    } else {
        "common-line"
    }
}

/// Escaped line with its changed chars wrapped in a highlighting span.
///
/// Lines without a partial change are returned escaped as a whole.
pub fn highlight_changes(block: &BlockLine, side: Side) -> String {
    let class_name = match side {
        Side::Left => "hl-left",
        Side::Right => "hl-right",
    };

    let chars: Vec<char> = block.clear_code.chars().collect();
    let Some(range) = block.change else {
        return escape_html(&block.clear_code);
    };
    let end = range.end.min(chars.len());
    let start = range.start.min(end);
    if start == end || (start == 0 && end == chars.len()) {
        return escape_html(&block.clear_code);
    }

    let left_part: String = chars[..start].iter().collect();
    let changed_part: String = chars[start..end].iter().collect();
    let right_part: String = chars[end..].iter().collect();

    format!(
        "{}<span class=\"{}\">{}</span>{}",
        escape_html(&left_part),
        class_name,
        escape_html(&changed_part),
        escape_html(&right_part)
    )
}

/// Does the block line carry no threads?
pub fn is_empty(block: &BlockLine) -> bool {
    block.threads.is_empty()
}

/// Is `line_index` the last code row of a group, with nothing in its comments row?
pub fn is_last_line(lines: &[ChangesLine], line_index: usize) -> bool {
    if lines.len() < 2 || line_index != lines.len() - 2 {
        return false;
    }
    lines[line_index + 1].blocks().iter().all(is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CharRange, CodeGroup};

    fn changed(text: &str, start: usize, end: usize) -> BlockLine {
        BlockLine {
            clear_code: text.to_string(),
            line_number: Some(1),
            is_changed: true,
            change: Some(CharRange { start, end }),
            ..BlockLine::default()
        }
    }

    #[test]
    fn test_highlight_changes_wraps_changed_part() {
        let block = changed("I think x > y here", 2, 7);
        assert_eq!(
            highlight_changes(&block, Side::Right),
            "I <span class=\"hl-right\">think</span> x &gt; y here"
        );
    }

    #[test]
    fn test_highlight_whole_line_is_plain() {
        let block = changed("a < b", 0, 5);
        assert_eq!(highlight_changes(&block, Side::Left), "a &lt; b");
        let empty = changed("abc", 1, 1);
        assert_eq!(highlight_changes(&empty, Side::Left), "abc");
    }

    #[test]
    fn test_line_background() {
        let code = BlockLine {
            line_number: Some(1),
            ..BlockLine::default()
        };
        let row = ChangesLine::code(code.clone(), BlockLine::placeholder(), 1);
        let comments = ChangesLine::comments(&code, &code);

        assert_eq!(line_background(&row, Side::Left, &code), "common-line");
        assert_eq!(line_background(&row, Side::Right, &BlockLine::placeholder()), "placeholder");
        assert_eq!(line_background(&row, Side::Right, &changed("x", 0, 1)), "right-file");
        assert_eq!(line_background(&comments, Side::Left, &code), "comments");
    }

    #[test]
    fn test_is_last_line() {
        let code = BlockLine {
            line_number: Some(1),
            ..BlockLine::default()
        };
        let group = CodeGroup {
            lines: vec![
                ChangesLine::code(code.clone(), code.clone(), 1),
                ChangesLine::comments(&code, &code),
            ],
            ..CodeGroup::default()
        };
        assert!(is_last_line(&group.lines, 0));
        assert!(!is_last_line(&group.lines, 1));
    }
}
