//! Anchoring of comment threads onto the comments rows of a changes view
//!
//! Threads are owned by the store. The view keeps clones of them in the
//! comments row below the line they belong to, plus an "open threads" map
//! (line number -> code group) so that a refresh can find them again quickly.
//! Threads on lines outside every visible section are not shown.

use log::{debug, warn};

use crate::error::{AlignmentError, AnchorError, ThreadError, UnsupportedOperation};
use crate::model::{ChangesView, CodeGroup, Comment, RowRef, Side, SplitMap, Thread, ThreadFrame};

/// Render model of one file view plus its thread bookkeeping
#[derive(Debug, Clone)]
pub struct CodeChanges {
    view: ChangesView,
    file_path: String,
    commit_ids: [Option<String>; 2],
    open_threads: SplitMap,
    next_draft: u64,
}

impl CodeChanges {
    /// `None` commit ids mark uncommitted (working copy) sides
    pub fn new(view: ChangesView, left_commit: Option<String>, right_commit: Option<String>) -> Self {
        Self {
            view,
            file_path: String::new(),
            commit_ids: [left_commit, right_commit],
            open_threads: SplitMap::new(),
            next_draft: 1,
        }
    }

    /// File the drafts created by this view belong to
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn view(&self) -> &ChangesView {
        &self.view
    }

    pub fn groups(&self) -> &[CodeGroup] {
        &self.view.groups
    }

    /// Open threads per side, mapped to the index of their code group
    pub fn open_threads(&self) -> &SplitMap {
        &self.open_threads
    }

    pub fn commit_id(&self, side: Side) -> Option<&str> {
        self.commit_ids[side.index()].as_deref()
    }

    /// Side whose commit id matches the thread's
    pub fn side_of(&self, thread: &Thread) -> Result<Side, AnchorError> {
        Side::BOTH
            .into_iter()
            .find(|&side| self.commit_id(side) == Some(thread.commit_id.as_str()))
            .ok_or_else(|| AnchorError::UndefinedSide {
                thread_id: thread.id.clone(),
                commit_id: thread.commit_id.clone(),
            })
    }

    /// Threads anchored below a line
    pub fn threads_at(&self, line_number: u32, side: Side) -> &[ThreadFrame] {
        self.view
            .locate(side, line_number)
            .and_then(|at| self.comments_block(at, side))
            .map(|frames| frames.as_slice())
            .unwrap_or(&[])
    }

    /// Anchor a thread below its line and return the code row.
    ///
    /// Returns `None` when the line exists but no section shows it.
    pub fn anchor(&mut self, thread: &Thread) -> Result<Option<RowRef>, ThreadError> {
        let side = self.side_of(thread)?;
        let line_number = thread.line_number;

        let Some(at) = self.view.locate(side, line_number) else {
            if self.view.has_line(side, line_number) {
                debug!("Thread {} is out of view ({} line {})", thread.id, side, line_number);
                return Ok(None);
            }
            return Err(AlignmentError::MissingLineIndex { side, line_number }.into());
        };

        self.comments_block_mut(at, side)?.push(ThreadFrame {
            thread: thread.clone(),
        });
        self.open_threads.insert(side, line_number, at.group);

        Ok(Some(at))
    }

    /// Replace all anchored threads with `threads`.
    ///
    /// Drafts (threads without comments) are not stored yet and stay where they
    /// are. Threads whose side cannot be resolved are skipped and returned.
    pub fn refresh(&mut self, threads: &[Thread]) -> Result<Vec<AnchorError>, AlignmentError> {
        for (side, line_number, group) in self.open_threads.entries() {
            let row = self.row_in_group(group, side, line_number)?;
            let frames = self.comments_block_mut(RowRef { group, row }, side)?;
            frames.retain(|frame| frame.thread.comments.is_empty());
            if frames.is_empty() {
                self.open_threads.remove(side, line_number);
            }
        }

        let mut skipped = Vec::new();
        let mut anchored = 0usize;
        for thread in threads {
            match self.anchor(thread) {
                Ok(Some(_)) => anchored += 1,
                Ok(None) => {}
                Err(ThreadError::Anchor(err)) => {
                    warn!("Skipping thread {}: {}", thread.id, err);
                    skipped.push(err);
                }
                Err(ThreadError::Alignment(err)) => return Err(err),
                Err(ThreadError::Unsupported(err)) => {
                    warn!("Skipping thread {}: {}", thread.id, err);
                }
            }
        }

        debug!(
            "refreshed {} of {} threads on {} lines",
            anchored,
            threads.len(),
            self.open_threads.len()
        );
        Ok(skipped)
    }

    /// Start a new thread on a visible line and anchor it before it is stored.
    ///
    /// Non-empty `content` becomes the first comment, written by `author`.
    pub fn create_and_anchor(
        &mut self,
        line_number: u32,
        side: Side,
        author: &str,
        content: &str,
    ) -> Result<Thread, ThreadError> {
        let Some(commit_id) = self.commit_id(side).map(str::to_string) else {
            return Err(UnsupportedOperation::UncommittedFile { side }.into());
        };
        if self.view.locate(side, line_number).is_none() {
            return Err(AlignmentError::MissingLineIndex { side, line_number }.into());
        }

        let id = format!("draft-{}", self.next_draft);
        self.next_draft += 1;

        let comments = if content.is_empty() {
            Vec::new()
        } else {
            vec![Comment {
                id: format!("{}-1", id),
                author: author.to_string(),
                content: content.to_string(),
                created_at: String::new(),
            }]
        };

        let thread = Thread {
            id,
            file_path: self.file_path.clone(),
            commit_id,
            line_number,
            is_done: false,
            comments,
        };
        self.anchor(&thread)?;
        Ok(thread)
    }

    /// Remove one thread from the comments row of the row at `at`
    pub fn close(
        &mut self,
        at: RowRef,
        side: Side,
        thread_index: usize,
    ) -> Result<Thread, ThreadError> {
        let line_number = self
            .group(at.group)?
            .lines
            .get(at.row)
            .ok_or(AlignmentError::MissingRow(at.row))?
            .block(side)
            .line_number;

        let frames = self.comments_block_mut(at, side)?;
        if thread_index >= frames.len() {
            return Err(AlignmentError::MissingThread {
                line_index: at.row,
                thread_index,
            }
            .into());
        }
        let frame = frames.remove(thread_index);
        let now_empty = frames.is_empty();

        if let (true, Some(line_number)) = (now_empty, line_number) {
            self.open_threads.remove(side, line_number);
        }
        Ok(frame.thread)
    }

    fn group(&self, group: usize) -> Result<&CodeGroup, AlignmentError> {
        self.view
            .groups
            .get(group)
            .ok_or(AlignmentError::MissingGroup(group))
    }

    fn row_in_group(
        &self,
        group: usize,
        side: Side,
        line_number: u32,
    ) -> Result<usize, AlignmentError> {
        self.group(group)?
            .line_index
            .get(side, line_number)
            .ok_or(AlignmentError::MissingLineIndex { side, line_number })
    }

    fn comments_block(&self, at: RowRef, side: Side) -> Option<&Vec<ThreadFrame>> {
        let lines = &self.view.groups.get(at.group)?.lines;
        let line = lines.get(at.row)?;
        let comments = lines.get(line.comments_line(at.row))?;
        Some(&comments.block(side).threads)
    }

    fn comments_block_mut(
        &mut self,
        at: RowRef,
        side: Side,
    ) -> Result<&mut Vec<ThreadFrame>, AlignmentError> {
        let lines = &mut self
            .view
            .groups
            .get_mut(at.group)
            .ok_or(AlignmentError::MissingGroup(at.group))?
            .lines;
        let comments_index = lines
            .get(at.row)
            .ok_or(AlignmentError::MissingRow(at.row))?
            .comments_line(at.row);
        let comments = lines
            .get_mut(comments_index)
            .ok_or(AlignmentError::MissingRow(comments_index))?;
        Ok(&mut comments.blocks_mut()[side.index()].threads)
    }
}

/// Threads of `file_path` written against either displayed commit
pub fn local_threads<'a>(
    threads: &'a [Thread],
    file_path: &str,
    left_commit: Option<&str>,
    right_commit: Option<&str>,
) -> Vec<&'a Thread> {
    threads
        .iter()
        .filter(|thread| {
            let is_current_commit = Some(thread.commit_id.as_str()) == left_commit
                || Some(thread.commit_id.as_str()) == right_commit;
            thread.file_path == file_path && is_current_commit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{align, build_changes};
    use crate::model::{ChangeRecord, IndexSpace, Section, TextDiff};
    use crate::syntax::PlainHighlighter;

    fn changes() -> CodeChanges {
        let diff = TextDiff {
            left_file_contents: "a\nb\nc".to_string(),
            right_file_contents: "a\nx\nb\nc".to_string(),
            left_diff_lines: vec![ChangeRecord::placeholder(1)],
            right_diff_lines: vec![ChangeRecord::add(1)],
            index_space: IndexSpace::Source,
        };
        let view = build_changes(&diff, "clean", &PlainHighlighter).unwrap();
        CodeChanges::new(view, Some("c1".to_string()), Some("c2".to_string()))
    }

    fn thread(id: &str, commit_id: &str, line_number: u32) -> Thread {
        Thread {
            id: id.to_string(),
            file_path: "src/lib.rs".to_string(),
            commit_id: commit_id.to_string(),
            line_number,
            is_done: false,
            comments: vec![Comment {
                id: format!("{}-c", id),
                author: "alice".to_string(),
                content: "why?".to_string(),
                created_at: "2024-01-01".to_string(),
            }],
        }
    }

    fn anchored_ids(changes: &CodeChanges) -> Vec<(usize, usize, Side, String)> {
        let mut ids = Vec::new();
        for (group, code_group) in changes.groups().iter().enumerate() {
            for (index, line) in code_group.lines.iter().enumerate() {
                for side in Side::BOTH {
                    for frame in &line.block(side).threads {
                        ids.push((group, index, side, frame.thread.id.clone()));
                    }
                }
            }
        }
        ids
    }

    #[test]
    fn test_anchor_places_thread_in_comments_row() {
        let mut changes = changes();
        let at = changes.view().locate(Side::Right, 2).unwrap();
        assert_eq!(at.row, 2);
        let anchored = changes.anchor(&thread("t1", "c2", 2)).unwrap();
        assert_eq!(anchored, Some(at));

        let lines = &changes.groups()[at.group].lines;
        let comments = &lines[lines[at.row].comments_line(at.row)];
        assert!(comments.is_comments_line());
        assert_eq!(comments.block(Side::Right).threads[0].thread.id, "t1");
        assert!(comments.block(Side::Left).threads.is_empty());
        assert_eq!(changes.open_threads().get(Side::Right, 2), Some(at.group));
        assert_eq!(changes.threads_at(2, Side::Right).len(), 1);
    }

    #[test]
    fn test_anchor_unknown_commit_is_undefined_side() {
        let mut changes = changes();
        let err = changes.anchor(&thread("t1", "other", 1)).unwrap_err();
        assert!(matches!(err, ThreadError::Anchor(AnchorError::UndefinedSide { .. })));
        assert!(anchored_ids(&changes).is_empty());
    }

    #[test]
    fn test_anchor_missing_line_is_alignment_error() {
        let mut changes = changes();
        let err = changes.anchor(&thread("t1", "c1", 40)).unwrap_err();
        assert!(matches!(
            err,
            ThreadError::Alignment(AlignmentError::MissingLineIndex { line_number: 40, .. })
        ));
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let threads = vec![thread("t1", "c1", 1), thread("t2", "c2", 2), thread("t3", "c2", 2)];

        let mut once = changes();
        once.refresh(&threads).unwrap();
        let mut twice = changes();
        twice.refresh(&threads).unwrap();
        twice.refresh(&threads).unwrap();

        assert_eq!(anchored_ids(&once), anchored_ids(&twice));
        assert_eq!(once.open_threads(), twice.open_threads());
        assert_eq!(anchored_ids(&twice).len(), 3);
    }

    #[test]
    fn test_refresh_drops_stale_threads() {
        let mut changes = changes();
        changes.refresh(&[thread("t1", "c1", 1), thread("t2", "c2", 3)]).unwrap();
        changes.refresh(&[thread("t2", "c2", 3)]).unwrap();

        let ids = anchored_ids(&changes);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].3, "t2");
        assert_eq!(changes.open_threads().get(Side::Left, 1), None);
    }

    #[test]
    fn test_refresh_skips_unknown_side() {
        let mut changes = changes();
        let skipped = changes
            .refresh(&[thread("t1", "elsewhere", 1), thread("t2", "c1", 1)])
            .unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(anchored_ids(&changes).len(), 1);
    }

    #[test]
    fn test_refresh_keeps_drafts() {
        let mut changes = changes();
        let draft = changes.create_and_anchor(3, Side::Left, "bob", "").unwrap();
        assert!(draft.comments.is_empty());

        changes.refresh(&[thread("t1", "c1", 3)]).unwrap();
        let at_line: Vec<&str> = changes
            .threads_at(3, Side::Left)
            .iter()
            .map(|f| f.thread.id.as_str())
            .collect();
        assert_eq!(at_line, vec![draft.id.as_str(), "t1"]);
    }

    #[test]
    fn test_create_and_anchor_with_content() {
        let mut changes = changes();
        let mut changes = changes.with_file_path("src/lib.rs");
        let created = changes.create_and_anchor(2, Side::Right, "bob", "typo").unwrap();
        assert_eq!(created.commit_id, "c2");
        assert_eq!(created.file_path, "src/lib.rs");
        assert_eq!(created.comments[0].content, "typo");
        assert_eq!(created.comments[0].author, "bob");
        assert_eq!(changes.threads_at(2, Side::Right)[0].thread, created);
    }

    #[test]
    fn test_create_on_uncommitted_side_is_unsupported() {
        let diff = TextDiff {
            left_file_contents: "a".to_string(),
            right_file_contents: "a".to_string(),
            ..TextDiff::default()
        };
        let view = build_changes(&diff, "clean", &PlainHighlighter).unwrap();
        let mut changes = CodeChanges::new(view, Some("c1".to_string()), None);

        let err = changes.create_and_anchor(1, Side::Right, "bob", "hi").unwrap_err();
        assert_eq!(
            err,
            ThreadError::Unsupported(UnsupportedOperation::UncommittedFile { side: Side::Right })
        );
        assert!(changes.open_threads().is_empty());
        assert!(anchored_ids(&changes).is_empty());
    }

    #[test]
    fn test_close_last_thread_clears_open_entry() {
        let mut changes = changes();
        let at = changes.anchor(&thread("t1", "c1", 1)).unwrap().unwrap();
        changes.anchor(&thread("t2", "c1", 1)).unwrap();

        let removed = changes.close(at, Side::Left, 0).unwrap();
        assert_eq!(removed.id, "t1");
        assert_eq!(changes.open_threads().get(Side::Left, 1), Some(at.group));

        // Closing through the comments row works too.
        let comments_row = changes.groups()[at.group].lines[at.row].comments_line(at.row);
        let comments_at = RowRef {
            group: at.group,
            row: comments_row,
        };
        changes.close(comments_at, Side::Left, 0).unwrap();
        assert!(changes.threads_at(1, Side::Left).is_empty());
        assert_eq!(changes.open_threads().get(Side::Left, 1), None);
    }

    #[test]
    fn test_close_out_of_range() {
        let mut changes = changes();
        let row = |group, row| RowRef { group, row };
        assert!(changes.close(row(0, 99), Side::Left, 0).is_err());
        assert!(changes.close(row(0, 0), Side::Left, 0).is_err());
        assert_eq!(
            changes.close(row(3, 0), Side::Left, 0).unwrap_err(),
            ThreadError::Alignment(AlignmentError::MissingGroup(3))
        );
    }

    fn sectioned_changes() -> CodeChanges {
        let left: Vec<String> = (1..=40).map(|n| format!("line {}", n)).collect();
        let mut right = left.clone();
        right[1] = "two".to_string();
        right[35] = "thirty-six".to_string();
        let diff = TextDiff {
            left_file_contents: left.join("\n"),
            right_file_contents: right.join("\n"),
            left_diff_lines: vec![ChangeRecord::delete(1), ChangeRecord::delete(35)],
            right_diff_lines: vec![ChangeRecord::add(1), ChangeRecord::add(35)],
            index_space: IndexSpace::Source,
        };
        let blocks = align(&diff, "clean", &PlainHighlighter).unwrap();
        let view = blocks.view(&blocks.sections(5)).unwrap();
        CodeChanges::new(view, Some("c1".to_string()), Some("c2".to_string()))
    }

    #[test]
    fn test_threads_outside_sections_are_skipped() {
        let mut changes = sectioned_changes();
        assert_eq!(
            changes.view().sections(),
            vec![Section::new(0, 7), Section::new(30, 40)]
        );

        let skipped = changes
            .refresh(&[thread("t1", "c2", 2), thread("t2", "c2", 20), thread("t3", "c1", 36)])
            .unwrap();
        assert!(skipped.is_empty());

        let ids = anchored_ids(&changes);
        assert_eq!(ids.len(), 2);
        assert_eq!((ids[0].0, ids[0].3.as_str()), (0, "t1"));
        assert_eq!((ids[1].0, ids[1].3.as_str()), (1, "t3"));
        assert_eq!(changes.open_threads().get(Side::Left, 36), Some(1));
        assert_eq!(changes.open_threads().get(Side::Right, 20), None);
        assert_eq!(changes.threads_at(36, Side::Left)[0].thread.id, "t3");

        // Refreshing clears threads in every group.
        changes.refresh(&[]).unwrap();
        assert!(anchored_ids(&changes).is_empty());
        assert!(changes.open_threads().is_empty());
    }

    #[test]
    fn test_hidden_and_missing_lines() {
        let mut changes = sectioned_changes();
        assert_eq!(changes.anchor(&thread("t1", "c2", 20)).unwrap(), None);
        assert!(matches!(
            changes.anchor(&thread("t2", "c2", 41)).unwrap_err(),
            ThreadError::Alignment(AlignmentError::MissingLineIndex { line_number: 41, .. })
        ));
        assert!(changes.create_and_anchor(20, Side::Right, "bob", "hi").is_err());
    }

    #[test]
    fn test_local_threads_filter() {
        let mut other_file = thread("t2", "c1", 1);
        other_file.file_path = "README.md".to_string();
        let threads = vec![thread("t1", "c1", 1), other_file, thread("t3", "c9", 1)];

        let local = local_threads(&threads, "src/lib.rs", Some("c1"), Some("c2"));
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, "t1");
    }
}
