use log::{debug, info};
use std::{
    collections::BTreeMap,
    env,
    path::{Path, PathBuf},
};

/// The checkouts are created here, if `REPOS_BASE_DIR` is not set.
pub const DEFAULT_BASE_DIR: &str = "/repos";
/// The container runtime binary, if `CONTAINER_RUNTIME` is not set.
pub const DEFAULT_CONTAINER_RUNTIME: &str = "docker";

/// Everything needed to redeploy a single repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// The git remote to clone from.
    pub url: String,
    /// The local checkout, `{base_dir}/{repository name}`.
    pub directory: PathBuf,
    /// Containers carrying this label are restarted after an update.
    pub label: String,
}

/// The immutable configuration, built once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    repositories: BTreeMap<String, RepositoryConfig>,
    container_runtime: String,
}

/// Extract the repository name from its git URL.
///
/// Both URL forms are supported: `https://host/user/foo.git` and
/// `git@host:user/foo.git` resolve to `foo`. Returns `None` if there is
/// no usable name in the URL.
pub fn extract_repo_name(url: &str) -> Option<&str> {
    let url = url.trim_end_matches('/');
    let segment = url.rsplit('/').next().unwrap_or(url);
    // Scp-like urls without a path (`git@host:foo.git`)
    let segment = segment.rsplit(':').next().unwrap_or(segment);
    let name = segment.strip_suffix(".git").unwrap_or(segment);

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

impl Config {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Self {
        Config::from_vars(|key| env::var(key).ok())
    }

    /// Load the configuration with a custom variable lookup.
    ///
    /// Every identifier in `REPOS` needs a `REPO_URL_{id}` and a `CONTAINER_LABEL_{id}`,
    /// incomplete repositories are skipped silently. Empty values count as missing.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base_dir = get("REPOS_BASE_DIR").unwrap_or_else(|| DEFAULT_BASE_DIR.to_string());
        let container_runtime =
            get("CONTAINER_RUNTIME").unwrap_or_else(|| DEFAULT_CONTAINER_RUNTIME.to_string());

        let mut repositories = BTreeMap::new();
        let ids = get("REPOS").unwrap_or_default();
        for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            let url = get(&format!("REPO_URL_{id}"));
            let label = get(&format!("CONTAINER_LABEL_{id}"));
            let directory = url
                .as_deref()
                .and_then(extract_repo_name)
                .map(|name| Path::new(&base_dir).join(name));

            match (url, label, directory) {
                (Some(url), Some(label), Some(directory)) => {
                    repositories.insert(
                        id.to_string(),
                        RepositoryConfig {
                            url,
                            directory,
                            label,
                        },
                    );
                }
                _ => debug!("Repository {id} is not configured completely, skipping."),
            }
        }

        Config {
            repositories,
            container_runtime,
        }
    }

    /// Create a configuration from already resolved repositories.
    #[cfg(test)]
    pub fn with_repositories(repositories: BTreeMap<String, RepositoryConfig>) -> Self {
        Config {
            repositories,
            container_runtime: DEFAULT_CONTAINER_RUNTIME.to_string(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&RepositoryConfig> {
        self.repositories.get(id)
    }

    pub fn repositories(&self) -> impl Iterator<Item = (&String, &RepositoryConfig)> {
        self.repositories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn container_runtime(&self) -> &str {
        &self.container_runtime
    }

    /// Print the loaded repositories.
    pub fn log_summary(&self) {
        if self.repositories.is_empty() {
            info!("There are no repositories configured, every webhook will be rejected.");
        }
        for (id, repository) in &self.repositories {
            info!(
                "Watching {id}: {} in {} (containers labelled {}).",
                repository.url,
                repository.directory.display(),
                repository.label
            );
        }
    }
}
