//! File versions loaded from git
//!
//! A committed version is identified by its commit id, which is also what
//! threads record as their side. The working tree has no commit id.

use anyhow::{Context, Result};
use git2::{Oid, Repository};
use log::debug;
use std::path::{Path, PathBuf};

/// Contents of a file at one revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVersion {
    /// `None` for the working tree
    pub commit_id: Option<String>,
    pub content: String,
}

/// Reads file versions out of a git repository
pub struct RevisionSource {
    repo: Repository,
}

impl RevisionSource {
    pub fn open(repo_path: &Path) -> Result<Self> {
        let repo = Repository::open(repo_path)
            .with_context(|| format!("Failed to open repository {}", repo_path.display()))?;
        Ok(Self { repo })
    }

    pub fn workdir(&self) -> Result<PathBuf> {
        self.repo
            .workdir()
            .map(PathBuf::from)
            .context("Repository has no working directory")
    }

    /// Load `file_path` at `rev`, or from the working tree when `rev` is `None`.
    ///
    /// A file missing at a revision or from the working tree loads as empty
    /// content. Other read errors are returned.
    pub fn load(&self, file_path: &str, rev: Option<&str>) -> Result<FileVersion> {
        let Some(rev) = rev else {
            let path = self.workdir()?.join(file_path);
            let content = match std::fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!("{} does not exist in the working tree", file_path);
                    String::new()
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Failed to read {}", path.display()))
                }
            };
            return Ok(FileVersion {
                commit_id: None,
                content,
            });
        };

        let commit = self
            .repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .with_context(|| format!("Commit not found: {}", rev))?;
        let tree = commit.tree()?;

        let content = match tree.get_path(Path::new(file_path)) {
            Ok(entry) => {
                let blob = entry
                    .to_object(&self.repo)?
                    .peel_to_blob()
                    .with_context(|| format!("{} is not a file at {}", file_path, rev))?;
                String::from_utf8_lossy(blob.content()).into_owned()
            }
            Err(_) => {
                debug!("{} does not exist at {}", file_path, rev);
                String::new()
            }
        };

        Ok(FileVersion {
            commit_id: Some(commit.id().to_string()),
            content,
        })
    }

    /// Load both sides, swapping them if the left commit is newer than the right one
    pub fn load_pair(
        &self,
        file_path: &str,
        left_rev: Option<&str>,
        right_rev: Option<&str>,
    ) -> Result<(FileVersion, FileVersion)> {
        let left = self.load(file_path, left_rev)?;
        let right = self.load(file_path, right_rev)?;

        if self.is_newer(&left, &right)? {
            debug!("Swapping left and right versions of {}", file_path);
            return Ok((right, left));
        }
        Ok((left, right))
    }

    fn is_newer(&self, left: &FileVersion, right: &FileVersion) -> Result<bool> {
        match (&left.commit_id, &right.commit_id) {
            // Working tree is always the newest version.
            (None, Some(_)) => Ok(true),
            (Some(l), Some(r)) if l != r => {
                let l = Oid::from_str(l)?;
                let r = Oid::from_str(r)?;
                Ok(self.repo.graph_descendant_of(l, r)?)
            }
            _ => Ok(false),
        }
    }
}

/// Find the git repository root from a path
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    let repo = Repository::discover(start).context("Not in a git repository")?;

    repo.workdir()
        .map(PathBuf::from)
        .context("Repository has no working directory")
}
