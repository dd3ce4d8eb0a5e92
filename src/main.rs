//! sidelines - side-by-side file changes with persistent comment threads
//!
//! A CLI tool for viewing two versions of a file aligned line by line, with
//! review threads stored in SQLite and anchored below the lines they discuss.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use std::path::{Path, PathBuf};

use sidelines::align::align;
use sidelines::config::Config;
use sidelines::diff::{DiffProvider, JsonDiffProvider, SimilarDiffProvider};
use sidelines::export::{export, ExportFormat};
use sidelines::model::{Side, Thread};
use sidelines::revision::{find_repo_root, RevisionSource};
use sidelines::storage::{watch, Storage};
use sidelines::syntax::{language_for_path, Highlighter, PlainHighlighter, SyntectHighlighter};
use sidelines::threads::{local_threads, CodeChanges};

#[derive(Parser)]
#[command(name = "sidelines")]
#[command(about = "Side-by-side file changes with persistent comment threads")]
#[command(version)]
struct Cli {
    /// Disable syntax highlighting
    #[arg(long, global = true)]
    no_highlight: bool,

    /// Comment author (default: from config)
    #[arg(long, global = true)]
    author: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Which two versions of a file to compare
#[derive(clap::Args, Clone)]
struct Revisions {
    /// Left revision
    #[arg(long, default_value = "HEAD")]
    from: String,

    /// Right revision (default: working tree)
    #[arg(long)]
    to: Option<String>,

    /// Read change records from a JSON diff dump instead of diffing
    #[arg(long)]
    diff_json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a file's changes with their threads
    Show {
        /// File path (relative to repo root)
        file: String,

        #[command(flatten)]
        revisions: Revisions,

        /// Output format: text, html, json or markdown (md)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Width of each side in text output
        #[arg(short, long)]
        width: Option<usize>,

        /// Rows of context around changes (default: whole file)
        #[arg(short = 'C', long)]
        context: Option<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a file's changes and re-render whenever its threads change
    Watch {
        file: String,

        #[command(flatten)]
        revisions: Revisions,

        #[arg(short, long)]
        width: Option<usize>,

        #[arg(short = 'C', long)]
        context: Option<usize>,
    },

    /// Add, reply to, edit, delete or resolve comments
    #[command(subcommand)]
    Comment(CommentCommand),

    /// List threads for the repository
    Threads {
        /// Filter by file path
        #[arg(short, long)]
        file: Option<String>,

        /// Delete resolved threads instead of listing
        #[arg(long)]
        clear_done: bool,
    },

    /// Print the highlighting language used for a file
    Language { file: String },

    /// Write the default config file
    InitConfig,
}

#[derive(Subcommand)]
enum CommentCommand {
    /// Start a new thread on a line
    Add {
        file: String,

        /// Line number on the chosen side
        #[arg(short, long)]
        line: u32,

        /// Side: left (old) or right (new). Right needs --to, since the
        /// working tree has no commit to anchor on
        #[arg(short, long, default_value = "left")]
        side: String,

        #[command(flatten)]
        revisions: Revisions,

        content: String,
    },

    /// Add a comment to an existing thread
    Reply { thread: i64, content: String },

    /// Replace the text of a comment
    Edit { comment: i64, content: String },

    /// Delete a comment (the thread goes with its last comment)
    Delete { comment: i64 },

    /// Mark a thread as done
    Resolve {
        thread: i64,

        /// Mark it as not done again
        #[arg(long)]
        reopen: bool,
    },
}

/// Everything the commands need about the current repository
struct Workspace {
    config: Config,
    repo_path: PathBuf,
    storage: Storage,
    repo_id: i64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load()?.with_overrides(cli.no_highlight, cli.author.clone(), None, None);

    match &cli.command {
        Commands::Language { file } => {
            println!("{}", language_for_path(file));
            return Ok(());
        }
        Commands::InitConfig => {
            let path = Config::create_default()?;
            println!("Wrote {}", path.display());
            return Ok(());
        }
        _ => {}
    }

    let ctx = open_context(config)?;

    match cli.command {
        Commands::Show {
            file,
            revisions,
            format,
            width,
            context,
            output,
        } => {
            let context = context.or(ctx.config.context_lines);
            cmd_show(&ctx, &file, &revisions, &format, width, context, output)?
        }
        Commands::Watch {
            file,
            revisions,
            width,
            context,
        } => {
            let context = context.or(ctx.config.context_lines);
            cmd_watch(&ctx, &file, &revisions, width, context)?
        }
        Commands::Comment(command) => cmd_comment(&ctx, command)?,
        Commands::Threads { file, clear_done } => {
            cmd_threads(&ctx, file.as_deref(), clear_done)?
        }
        Commands::Language { .. } | Commands::InitConfig => {}
    }

    Ok(())
}

fn open_context(config: Config) -> Result<Workspace> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let repo_path = find_repo_root(&cwd)?;

    let db_path = match &config.database {
        Some(path) => path.clone(),
        None => Storage::default_path()?,
    };
    let storage = Storage::open(&db_path)?;

    // Get display name from repo directory name
    let display_name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());
    let repo_id = storage.get_or_create_repo(&repo_path, display_name.as_deref())?;

    Ok(Workspace {
        config,
        repo_path,
        storage,
        repo_id,
    })
}

/// Path of `file` relative to the repository root, with `/` separators
fn repo_relative(repo_path: &Path, file: &str) -> String {
    let absolute = std::env::current_dir()
        .map(|cwd| cwd.join(file))
        .and_then(|p| p.canonicalize());
    let relative = absolute
        .ok()
        .and_then(|p| {
            let root = repo_path.canonicalize().ok()?;
            p.strip_prefix(root).ok().map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from(file));
    relative.to_string_lossy().replace('\\', "/")
}

fn highlighter(config: &Config) -> Result<Box<dyn Highlighter>> {
    if config.syntax_highlighting {
        Ok(Box::new(SyntectHighlighter::new(config.syntax_theme.as_deref())?))
    } else {
        Ok(Box::new(PlainHighlighter))
    }
}

/// Load both versions, align them and anchor the stored threads.
///
/// With `context` set only the rows around changes are kept.
fn load_changes(
    ctx: &Workspace,
    file_path: &str,
    revisions: &Revisions,
    context: Option<usize>,
) -> Result<CodeChanges> {
    let source = RevisionSource::open(&ctx.repo_path)?;
    let (left, right) = source.load_pair(
        file_path,
        Some(revisions.from.as_str()),
        revisions.to.as_deref(),
    )?;

    let text_diff = match &revisions.diff_json {
        Some(path) => {
            JsonDiffProvider::new(path.clone()).text_diff(&left.content, &right.content)?
        }
        None => SimilarDiffProvider::default().text_diff(&left.content, &right.content)?,
    };

    let language = language_for_path(file_path);
    let highlighter = highlighter(&ctx.config)?;
    let blocks = align(&text_diff, language, highlighter.as_ref())
        .context("file changes could not be rendered")?;
    let sections = match context {
        Some(context) => blocks.sections(context),
        None => vec![blocks.whole_file()],
    };
    let view = blocks
        .view(&sections)
        .context("file changes could not be rendered")?;
    debug!(
        "{} rows in {} groups for {} ({})",
        view.row_count,
        view.groups.len(),
        file_path,
        language
    );

    let mut changes = CodeChanges::new(view, left.commit_id, right.commit_id).with_file_path(file_path);
    let stored = ctx.storage.list_threads(ctx.repo_id, Some(file_path))?;
    refresh(&mut changes, &stored)?;
    Ok(changes)
}

fn refresh(changes: &mut CodeChanges, stored: &[Thread]) -> Result<()> {
    let threads: Vec<Thread> = local_threads(
        stored,
        changes.file_path(),
        changes.commit_id(Side::Left),
        changes.commit_id(Side::Right),
    )
    .into_iter()
    .cloned()
    .collect();

    changes
        .refresh(&threads)
        .context("file changes could not be rendered")?;
    Ok(())
}

fn cmd_show(
    ctx: &Workspace,
    file: &str,
    revisions: &Revisions,
    format: &str,
    width: Option<usize>,
    context: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let export_format = ExportFormat::from_str(format)
        .context("Invalid format. Use: text, html, json or markdown (md)")?;

    let file_path = repo_relative(&ctx.repo_path, file);
    let changes = load_changes(ctx, &file_path, revisions, context)?;
    let column_width = width.unwrap_or(ctx.config.column_width);
    let content = export(&changes, export_format, column_width)?;

    if let Some(path) = output {
        std::fs::write(&path, &content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        println!("Exported to {}", path.display());
    } else {
        print!("{}", content);
    }

    Ok(())
}

fn cmd_watch(
    ctx: &Workspace,
    file: &str,
    revisions: &Revisions,
    width: Option<usize>,
    context: Option<usize>,
) -> Result<()> {
    let file_path = repo_relative(&ctx.repo_path, file);
    let mut changes = load_changes(ctx, &file_path, revisions, context)?;
    let column_width = width.unwrap_or(ctx.config.column_width);

    let subscription = watch(ctx.storage.path(), ctx.repo_id, &file_path)?;
    loop {
        // Clear screen and move cursor home
        print!("\x1b[2J\x1b[H");
        print!("{}", export(&changes, ExportFormat::Text, column_width)?);

        let Some(threads) = subscription.recv() else {
            return Ok(());
        };
        refresh(&mut changes, &threads)?;
    }
}

fn cmd_comment(ctx: &Workspace, command: CommentCommand) -> Result<()> {
    let author = ctx.config.author.as_str();

    match command {
        CommentCommand::Add {
            file,
            line,
            side,
            revisions,
            content,
        } => {
            let side = Side::from_str(&side).context("Invalid side. Use: left or right")?;
            let file_path = repo_relative(&ctx.repo_path, &file);
            // Threads may go on any line, not only the ones near changes
            let mut changes = load_changes(ctx, &file_path, &revisions, None)?;

            let draft = changes.create_and_anchor(line, side, author, &content)?;
            let thread = ctx.storage.add_thread(
                ctx.repo_id,
                &draft.file_path,
                &draft.commit_id,
                draft.line_number,
                author,
                &content,
            )?;
            println!("Added thread #{} on {} line {}", thread.id, side, line);
        }
        CommentCommand::Reply { thread, content } => {
            ctx.storage
                .get_thread(thread)?
                .with_context(|| format!("Thread #{} not found", thread))?;
            let id = ctx.storage.add_comment(thread, author, &content)?;
            println!("Added comment #{} to thread #{}", id, thread);
        }
        CommentCommand::Edit { comment, content } => {
            ctx.storage.update_comment(comment, &content)?;
            println!("Updated comment #{}", comment);
        }
        CommentCommand::Delete { comment } => {
            if ctx.storage.delete_comment(comment)? {
                println!("Deleted comment #{} and its thread", comment);
            } else {
                println!("Deleted comment #{}", comment);
            }
        }
        CommentCommand::Resolve { thread, reopen } => {
            ctx.storage.resolve_thread(thread, !reopen)?;
            let state = if reopen { "reopened" } else { "resolved" };
            println!("Thread #{} {}", thread, state);
        }
    }

    Ok(())
}

fn cmd_threads(ctx: &Workspace, file: Option<&str>, clear_done: bool) -> Result<()> {
    if clear_done {
        let count = ctx.storage.clear_done(ctx.repo_id)?;
        println!("Cleared {} resolved threads", count);
        return Ok(());
    }

    let threads = ctx.storage.list_threads(ctx.repo_id, file)?;
    if threads.is_empty() {
        println!("No threads found");
        return Ok(());
    }

    let mut current_file = String::new();

    for thread in threads {
        if thread.file_path != current_file {
            if !current_file.is_empty() {
                println!();
            }
            println!("{}:", thread.file_path);
            current_file = thread.file_path.clone();
        }

        let done = if thread.is_done { " [done]" } else { "" };
        let commit = &thread.commit_id[..7.min(thread.commit_id.len())];
        println!("  #{} L{} @{}{}", thread.id, thread.line_number, commit, done);
        for comment in &thread.comments {
            println!("    #{} {}: {}", comment.id, comment.author, comment.content);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_add_defaults_to_left() {
        let cli = Cli::try_parse_from(["sidelines", "comment", "add", "a.rs", "-l", "3", "Why?"])
            .unwrap();
        let Commands::Comment(CommentCommand::Add { side, revisions, .. }) = cli.command else {
            panic!("expected comment add");
        };
        assert_eq!(side, "left");
        assert_eq!(revisions.from, "HEAD");
        assert_eq!(revisions.to, None);
    }

    #[test]
    fn test_context_flag() {
        let cli = Cli::try_parse_from(["sidelines", "show", "a.rs", "-C", "3"]).unwrap();
        let Commands::Show { context, .. } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(context, Some(3));
    }
}
