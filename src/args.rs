use gumdrop::Options;

/// Listen for git push webhooks, update the repository and restart its containers.
///
/// The repositories are configured with environment variables (REPOS, REPO_URL_{id},
/// CONTAINER_LABEL_{id}, REPOS_BASE_DIR), which can be set in the env file too.
#[derive(Debug, Options)]
pub struct Args {
    /// Load environment variables from this file, if it exists.
    #[options(default = ".env", meta = "PATH")]
    pub env_file: String,

    /// Increase verbosity, can be set multiple times (-v debug, -vv tracing)
    #[options(count)]
    pub verbose: u8,

    /// Only print errors.
    #[options()]
    pub quiet: bool,

    /// Print the current version.
    #[options(short = "V")]
    pub version: bool,

    /// Print this help.
    #[options()]
    pub help: bool,
}

pub fn parse_args() -> Args {
    Args::parse_args_default_or_exit()
}
