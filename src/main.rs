use args::parse_args;
use log::{debug, info, SetLoggerError};
use logger::init_logger;
use rehook_bin::{
    command::ProcessRunner,
    config::Config,
    containers::CliRuntime,
    server::{ServerError, WebhookServer, LISTEN_ADDRESS},
    signal::shutdown_on_signals,
    sync::GitSynchronizer,
    webhook::WebhookHandler,
};
use std::{path::Path, process, sync::Arc};
use thiserror::Error;

mod args;
mod logger;

#[derive(Debug, Error)]
pub enum MainError {
    #[error("Timezone offset cannot be determined for logging.")]
    FailedLoggerTimezones,
    #[error(transparent)]
    FailedLogger(#[from] SetLoggerError),
    #[error("Cannot load env file {0}: {1}")]
    FailedEnvFile(String, dotenvy::Error),
    #[error(transparent)]
    FailedServer(#[from] ServerError),
}

/// Load the env file, a missing file is fine, the variables can come from the environment.
fn load_env_file(path: &str) -> Result<(), MainError> {
    if !Path::new(path).exists() {
        debug!("There is no env file at {path}, using the environment only.");
        return Ok(());
    }

    dotenvy::from_path(path).map_err(|err| MainError::FailedEnvFile(path.to_string(), err))?;
    debug!("Loaded environment variables from {path}.");

    Ok(())
}

fn main_inner() -> Result<(), MainError> {
    let args = parse_args();
    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logger(&args)?;
    load_env_file(&args.env_file)?;

    let config = Config::from_env();
    config.log_summary();

    let runtime = CliRuntime::new(config.container_runtime(), ProcessRunner);
    let handler = WebhookHandler::new(
        config,
        Box::new(GitSynchronizer::new(ProcessRunner)),
        Box::new(runtime),
    );

    let server = WebhookServer::bind(LISTEN_ADDRESS)?;
    shutdown_on_signals(server.shutdown_handle());
    server.listen(Arc::new(handler));

    info!("Finished running.");

    Ok(())
}

fn main() {
    if let Err(err) = main_inner() {
        eprintln!("{err}");
        process::exit(1);
    }
}
