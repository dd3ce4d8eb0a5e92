//! Export functionality for file changes
//!
//! Renders a `CodeChanges` view side by side as plain text, as an HTML table,
//! as JSON, or lists its threads as markdown.

use anyhow::Result;
use unicode_width::UnicodeWidthChar;

use crate::model::{BlockLine, ChangesLine, Side, ThreadFrame};
use crate::syntax::escape_html;
use crate::template::{highlight_changes, is_last_line, line_background};
use crate::threads::CodeChanges;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Html,
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "html" => Some(Self::Html),
            "json" => Some(Self::Json),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Main export function that handles format selection
pub fn export(changes: &CodeChanges, format: ExportFormat, column_width: usize) -> Result<String> {
    match format {
        ExportFormat::Text => Ok(export_text(changes, column_width)),
        ExportFormat::Html => Ok(export_html(changes)),
        ExportFormat::Json => export_json(changes),
        ExportFormat::Markdown => Ok(export_markdown(changes)),
    }
}

/// Side-by-side text with thread summaries below their lines
pub fn export_text(changes: &CodeChanges, column_width: usize) -> String {
    let mut output = String::new();
    let mut shown_until = 0usize;

    for group in changes.groups() {
        push_hidden(&mut output, group.section.start - shown_until);
        shown_until = group.section.end;
        let lines = &group.lines;

        for line in lines {
            match line {
                ChangesLine::Code {
                    blocks,
                    comments_line,
                } => {
                    let has_threads = |side: Side| {
                        lines
                            .get(*comments_line)
                            .is_some_and(|c| !c.block(side).threads.is_empty())
                    };
                    let left =
                        text_cell(&blocks[0], Side::Left, has_threads(Side::Left), column_width);
                    let right =
                        text_cell(&blocks[1], Side::Right, has_threads(Side::Right), column_width);
                    output.push_str(format!("{} │ {}", left, right).trim_end());
                    output.push('\n');
                }
                ChangesLine::Comments { blocks } => {
                    for side in Side::BOTH {
                        for frame in &blocks[side.index()].threads {
                            output.push_str(&thread_summary(frame, side));
                            output.push('\n');
                        }
                    }
                }
            }
        }
    }
    push_hidden(&mut output, changes.view().row_count - shown_until);

    output
}

fn push_hidden(output: &mut String, rows: usize) {
    if rows > 0 {
        output.push_str(&format!("  ⋯ {} hidden\n", plural(rows, "row")));
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn text_cell(block: &BlockLine, side: Side, has_threads: bool, width: usize) -> String {
    if block.is_placeholder {
        return " ".repeat(width + 8);
    }

    let marker = if has_threads { '●' } else { ' ' };
    let sign = match (block.is_changed, side) {
        (false, _) => ' ',
        (true, Side::Left) => '-',
        (true, Side::Right) => '+',
    };
    let line_no = block.line_number.unwrap_or(0);
    format!(
        "{}{:>4} {} {}",
        marker,
        line_no,
        sign,
        fit(&block.clear_code, width)
    )
}

fn thread_summary(frame: &ThreadFrame, side: Side) -> String {
    let thread = &frame.thread;
    let status = if thread.is_done { " [done]" } else { "" };
    let mut summary = format!(
        "      ↳ {} L{} #{}{}",
        side, thread.line_number, thread.id, status
    );
    for comment in &thread.comments {
        summary.push_str(&format!("\n          {}: {}", comment.author, comment.content));
    }
    if thread.comments.is_empty() {
        summary.push_str("\n          (draft)");
    }
    summary
}

/// Truncate or pad to exactly `width` display columns
fn fit(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0usize;
    for c in text.chars() {
        let c = if c == '\t' { ' ' } else { c };
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

/// HTML table, one row per changes line
pub fn export_html(changes: &CodeChanges) -> String {
    let mut output = String::from("<table class=\"code-changes\">\n");
    let mut shown_until = 0usize;

    for (group_index, group) in changes.groups().iter().enumerate() {
        push_expand_row(&mut output, group.section.start - shown_until, group_index);
        shown_until = group.section.end;
        let lines = &group.lines;

        for (index, line) in lines.iter().enumerate() {
            if line.is_comments_line() && line.blocks().iter().all(|b| b.threads.is_empty()) {
                continue;
            }

            let last = if is_last_line(lines, index) { " last-line" } else { "" };
            output.push_str(&format!("  <tr class=\"changes-line{}\">\n", last));
            for side in Side::BOTH {
                let block = line.block(side);
                let class = line_background(line, side, block);
                let number = match (line.is_comments_line(), block.line_number) {
                    (false, Some(n)) if !block.is_placeholder => n.to_string(),
                    _ => String::new(),
                };
                output.push_str(&format!("    <td class=\"line-number\">{}</td>\n", number));
                output.push_str(&format!(
                    "    <td class=\"{}\">{}</td>\n",
                    class,
                    html_cell(line, block, side)
                ));
            }
            output.push_str("  </tr>\n");
        }
    }
    push_expand_row(
        &mut output,
        changes.view().row_count - shown_until,
        changes.groups().len(),
    );

    output.push_str("</table>\n");
    output
}

fn push_expand_row(output: &mut String, rows: usize, group_index: usize) {
    if rows > 0 {
        output.push_str(&format!(
            "  <tr class=\"expand\" data-group=\"{}\"><td colspan=\"4\">⋯ {} hidden</td></tr>\n",
            group_index,
            plural(rows, "row")
        ));
    }
}

fn html_cell(line: &ChangesLine, block: &BlockLine, side: Side) -> String {
    if line.is_comments_line() {
        return block
            .threads
            .iter()
            .map(|frame| {
                let comments: String = frame
                    .thread
                    .comments
                    .iter()
                    .map(|c| {
                        format!(
                            "<p><b>{}</b>: {}</p>",
                            escape_html(&c.author),
                            escape_html(&c.content)
                        )
                    })
                    .collect();
                format!(
                    "<div class=\"thread\" data-id=\"{}\">{}</div>",
                    escape_html(&frame.thread.id),
                    comments
                )
            })
            .collect();
    }
    if block.is_changed && block.change.is_some() {
        highlight_changes(block, side)
    } else {
        block.code.clone()
    }
}

/// The full render model as JSON
pub fn export_json(changes: &CodeChanges) -> Result<String> {
    serde_json::to_string_pretty(changes.view()).map_err(Into::into)
}

/// Threads of the view, grouped by side
pub fn export_markdown(changes: &CodeChanges) -> String {
    let mut output = String::from("# Threads\n\n");
    let mut any = false;

    for side in Side::BOTH {
        let anchored: Vec<&ThreadFrame> = changes
            .groups()
            .iter()
            .flat_map(|g| g.lines.iter())
            .filter(|l| l.is_comments_line())
            .flat_map(|l| l.block(side).threads.iter())
            .collect();
        if anchored.is_empty() {
            continue;
        }
        any = true;

        let commit = changes.commit_id(side).unwrap_or("working tree");
        output.push_str(&format!("## {} ({})\n\n", side, &commit[..7.min(commit.len())]));
        for frame in anchored {
            let thread = &frame.thread;
            let status = if thread.is_done { " ✔" } else { "" };
            output.push_str(&format!("### L{}{}\n\n", thread.line_number, status));
            for comment in &thread.comments {
                output.push_str(&format!("- **{}**: {}\n", comment.author, comment.content));
            }
            output.push('\n');
        }
    }

    if !any {
        output.push_str("No threads\n");
    }
    output
}
