use crate::command::{CommandError, CommandLine, CommandRunner};
use git2::Repository;
use log::{debug, info};
use mockall::automock;
use std::{
    fmt::{self, Display},
    path::Path,
};
use thiserror::Error;

/// The git step that was run on the checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Pulled,
}

impl Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Cloned => write!(f, "cloned"),
            SyncAction::Pulled => write!(f, "pulled"),
        }
    }
}

/// What happened to the checkout during a sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    pub action: SyncAction,
    /// The HEAD commit before the sync, if there was a readable checkout.
    pub before: Option<String>,
    /// The HEAD commit after the sync.
    pub after: Option<String>,
}

impl SyncOutcome {
    /// Returns true, if the HEAD moved.
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// A custom error describing the error cases for syncing a checkout.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Git ran, but returned a non-zero exit code. The parameters are the
    /// command, the exit code and the output of git.
    #[error("{0} returned non-zero exit code {1}: {2}")]
    NonZeroExitcode(CommandLine, i32, String),
    /// Git couldn't be started at all.
    #[error("{0}")]
    CommandFailure(#[from] CommandError),
}

/// Keeps a local checkout in sync with its remote.
#[automock]
pub trait Synchronizer: Send + Sync {
    /// Clone `url` into `directory` if it doesn't exist, otherwise pull the latest changes.
    fn sync(&self, directory: &Path, url: &str) -> Result<SyncOutcome, SyncError>;
}

/// Shorten the commit hash to 7 characters.
pub fn shorthash(sha: &str) -> &str {
    sha.get(0..7).unwrap_or(sha)
}

/// Read the commit HEAD points to. Returns `None`, if it isn't a valid repository
/// or there are no commits in it.
pub fn head_commit(directory: &Path) -> Option<String> {
    let repo = Repository::open(directory).ok()?;
    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

/// A synchronizer calling the `git` binary.
///
/// The remote of an existing checkout is never compared against the url,
/// it is pulled from whatever is configured in it.
pub struct GitSynchronizer<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GitSynchronizer<R> {
    pub fn new(runner: R) -> Self {
        GitSynchronizer { runner }
    }

    fn git(&self, args: Vec<String>) -> Result<(), SyncError> {
        let result = self.runner.run("git", &args)?;

        if result.success() {
            result.output.lines().for_each(|line| {
                debug!("{line}");
            });
            Ok(())
        } else {
            Err(SyncError::NonZeroExitcode(
                CommandLine::new("git", &args),
                result.code,
                result.output,
            ))
        }
    }
}

impl<R: CommandRunner> Synchronizer for GitSynchronizer<R> {
    fn sync(&self, directory: &Path, url: &str) -> Result<SyncOutcome, SyncError> {
        let path = directory.to_string_lossy().to_string();

        if !directory.is_dir() {
            info!("Cloning repository {url} into {path}.");
            self.git(vec!["clone".to_string(), url.to_string(), path])?;

            Ok(SyncOutcome {
                action: SyncAction::Cloned,
                before: None,
                after: head_commit(directory),
            })
        } else {
            info!("Pulling latest changes in {path}.");
            let before = head_commit(directory);
            self.git(vec!["-C".to_string(), path, "pull".to_string()])?;

            Ok(SyncOutcome {
                action: SyncAction::Pulled,
                before,
                after: head_commit(directory),
            })
        }
    }
}
