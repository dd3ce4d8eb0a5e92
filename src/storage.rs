//! SQLite storage layer for comment threads
//!
//! Uses WAL mode for concurrent access and stores repos by hash for privacy.
//! Other processes writing to the same database are picked up by `watch`.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use crate::model::{Comment, Thread};

const SCHEMA: &str = r#"
-- Repo lookup table (privacy: store hash, not absolute path)
CREATE TABLE IF NOT EXISTS repos (
    id INTEGER PRIMARY KEY,
    repo_hash TEXT NOT NULL UNIQUE,
    display_name TEXT
);

CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY,
    repo_id INTEGER NOT NULL REFERENCES repos(id),
    file_path TEXT NOT NULL,
    commit_id TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    is_done INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,

    CHECK (line_number > 0)
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    author TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_repo_file ON threads(repo_id, file_path);
CREATE INDEX IF NOT EXISTS idx_thread_comments ON comments(thread_id);
"#;

pub struct Storage {
    conn: Connection,
    path: PathBuf,
}

impl Storage {
    /// Default database location in the platform config directory
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("sidelines");
        Ok(config_dir.join("threads.db"))
    }

    /// Opens or creates the database at the default location
    pub fn open_default() -> Result<Self> {
        Self::open(&Self::default_path()?)
    }

    /// Opens or creates the database at the specified path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let conn = Connection::open(path).context("Failed to open database")?;

        // Enable WAL mode for concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_secs(30))?;

        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generates a hash for a repository path
    pub fn hash_repo_path(path: &Path) -> String {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Gets or creates a repo entry, returns the repo_id
    pub fn get_or_create_repo(&self, repo_path: &Path, display_name: Option<&str>) -> Result<i64> {
        let repo_hash = Self::hash_repo_path(repo_path);

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM repos WHERE repo_hash = ?1",
                params![repo_hash],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            if let Some(name) = display_name {
                self.conn.execute(
                    "UPDATE repos SET display_name = ?1 WHERE id = ?2",
                    params![name, id],
                )?;
            }
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO repos (repo_hash, display_name) VALUES (?1, ?2)",
            params![repo_hash, display_name],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Stores a new thread with its first comment
    pub fn add_thread(
        &self,
        repo_id: i64,
        file_path: &str,
        commit_id: &str,
        line_number: u32,
        author: &str,
        content: &str,
    ) -> Result<Thread> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO threads (repo_id, file_path, commit_id, line_number) VALUES (?1, ?2, ?3, ?4)",
            params![repo_id, file_path, commit_id, line_number],
        )
        .context("Failed to insert thread")?;
        let thread_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO comments (thread_id, author, content) VALUES (?1, ?2, ?3)",
            params![thread_id, author, content],
        )?;
        tx.commit()?;

        info!("Added thread #{} at {}:{}", thread_id, file_path, line_number);
        self.get_thread(thread_id)?
            .context("Thread disappeared right after insert")
    }

    /// Appends a comment to an existing thread, returns the comment id
    pub fn add_comment(&self, thread_id: i64, author: &str, content: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO comments (thread_id, author, content) VALUES (?1, ?2, ?3)",
                params![thread_id, author, content],
            )
            .with_context(|| format!("Failed to add comment to thread #{}", thread_id))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_comment(&self, comment_id: i64, content: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE comments SET content = ?1 WHERE id = ?2",
            params![content, comment_id],
        )?;
        if updated == 0 {
            anyhow::bail!("Comment #{} not found", comment_id);
        }
        Ok(())
    }

    /// Deletes a comment; a thread losing its last comment is deleted too.
    ///
    /// Returns whether the thread was deleted.
    pub fn delete_comment(&self, comment_id: i64) -> Result<bool> {
        let thread_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT thread_id FROM comments WHERE id = ?1",
                params![comment_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(thread_id) = thread_id else {
            anyhow::bail!("Comment #{} not found", comment_id);
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;
        let remaining: i64 = tx.query_row(
            "SELECT COUNT(*) FROM comments WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        let delete_thread = remaining == 0;
        if delete_thread {
            tx.execute("DELETE FROM threads WHERE id = ?1", params![thread_id])?;
        }
        tx.commit()?;

        Ok(delete_thread)
    }

    /// Mark a thread as done or reopen it
    pub fn resolve_thread(&self, thread_id: i64, is_done: bool) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE threads SET is_done = ?1 WHERE id = ?2",
            params![is_done, thread_id],
        )?;
        if updated == 0 {
            anyhow::bail!("Thread #{} not found", thread_id);
        }
        Ok(())
    }

    pub fn get_thread(&self, thread_id: i64) -> Result<Option<Thread>> {
        let thread = self
            .conn
            .query_row(
                r#"
                SELECT id, file_path, commit_id, line_number, is_done
                FROM threads
                WHERE id = ?1
                "#,
                params![thread_id],
                Self::row_to_thread,
            )
            .optional()?;

        match thread {
            Some(mut thread) => {
                thread.comments = self.comments_for(thread_id)?;
                Ok(Some(thread))
            }
            None => Ok(None),
        }
    }

    /// Lists threads for a repo, optionally filtered by file
    pub fn list_threads(&self, repo_id: i64, file_path: Option<&str>) -> Result<Vec<Thread>> {
        let mut sql = String::from(
            r#"
            SELECT id, file_path, commit_id, line_number, is_done
            FROM threads
            WHERE repo_id = ?1
            "#,
        );

        if file_path.is_some() {
            sql.push_str(" AND file_path = ?2");
        }

        sql.push_str(" ORDER BY file_path, line_number, id");

        let mut stmt = self.conn.prepare(&sql)?;

        let rows = if let Some(fp) = file_path {
            stmt.query_map(params![repo_id, fp], Self::row_to_thread)?
        } else {
            stmt.query_map(params![repo_id], Self::row_to_thread)?
        };

        let mut threads = rows
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to fetch threads")?;

        for thread in &mut threads {
            let id: i64 = thread.id.parse().context("Invalid thread id")?;
            thread.comments = self.comments_for(id)?;
        }

        Ok(threads)
    }

    /// Deletes all done threads for a repo
    pub fn clear_done(&self, repo_id: i64) -> Result<usize> {
        let count = self.conn.execute(
            "DELETE FROM threads WHERE repo_id = ?1 AND is_done = 1",
            params![repo_id],
        )?;
        Ok(count)
    }

    fn comments_for(&self, thread_id: i64) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, author, content, created_at
            FROM comments
            WHERE thread_id = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![thread_id], |row| {
            Ok(Comment {
                id: row.get::<_, i64>(0)?.to_string(),
                author: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to fetch comments")
    }

    fn row_to_thread(row: &rusqlite::Row) -> rusqlite::Result<Thread> {
        Ok(Thread {
            id: row.get::<_, i64>(0)?.to_string(),
            file_path: row.get(1)?,
            commit_id: row.get(2)?,
            line_number: row.get(3)?,
            is_done: row.get(4)?,
            comments: Vec::new(),
        })
    }
}

/// Push-style feed of a file's threads, fed by filesystem events on the database
pub struct ThreadSubscription {
    _watcher: RecommendedWatcher,
    rx: Receiver<Vec<Thread>>,
}

impl ThreadSubscription {
    /// Blocks until the thread list changes. `None` once the feed is gone.
    pub fn recv(&self) -> Option<Vec<Thread>> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Vec<Thread>> {
        self.rx.try_recv().ok()
    }
}

/// Watch the database at `db_path` and deliver the thread list of one file
/// every time it changes.
pub fn watch(db_path: &Path, repo_id: i64, file_path: &str) -> Result<ThreadSubscription> {
    let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = event_tx.send(res);
        },
        Config::default(),
    )?;

    // WAL writes land in sibling files, so watch the whole directory.
    let dir = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    let storage = Storage::open(db_path)?;
    let mut last = storage.list_threads(repo_id, Some(file_path))?;
    let file_path = file_path.to_string();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        while let Ok(event) = event_rx.recv() {
            if let Err(e) = event {
                warn!("Database watch error: {}", e);
                continue;
            }
            // Coalesce bursts of events from a single write.
            while event_rx.recv_timeout(Duration::from_millis(50)).is_ok() {}

            match storage.list_threads(repo_id, Some(&file_path)) {
                Ok(threads) if threads != last => {
                    debug!("Thread list of {} changed", file_path);
                    last = threads.clone();
                    if tx.send(threads).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to reload threads: {:#}", e),
            }
        }
    });

    Ok(ThreadSubscription {
        _watcher: watcher,
        rx,
    })
}
