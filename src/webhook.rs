use crate::{
    config::Config,
    containers::{restart_by_label, ContainerError, ContainerRuntime},
    sync::{shorthash, SyncAction, SyncError, Synchronizer},
};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;

/// The part of the push event we care about, every other field is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct PushEvent {
    #[serde(default)]
    pub repository: Option<PushRepository>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PushRepository {
    #[serde(default)]
    pub name: Option<String>,
}

impl PushEvent {
    /// Read the repository name from a JSON value. Missing fields and
    /// unexpected types both result in `None`.
    pub fn repository_name(value: serde_json::Value) -> Option<String> {
        let event: PushEvent = serde_json::from_value(value).ok()?;
        event.repository?.name
    }
}

/// A custom error describing the ways a webhook delivery can fail.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The body is not valid JSON (or not even UTF-8).
    #[error("Invalid payload")]
    InvalidPayload(#[source] serde_json::Error),
    /// The repository name is missing or it is not configured.
    #[error("Repository not supported")]
    UnsupportedRepository,
    /// Git returned a non-zero exit code.
    #[error("Git command failed: {0}")]
    SyncFailure(String),
    /// Anything else that failed while syncing or restarting.
    #[error("Error: {0}")]
    OperationalFailure(String),
}

impl From<SyncError> for WebhookError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::NonZeroExitcode(_, _, _) => WebhookError::SyncFailure(value.to_string()),
            SyncError::CommandFailure(_) => WebhookError::OperationalFailure(value.to_string()),
        }
    }
}

impl From<ContainerError> for WebhookError {
    fn from(value: ContainerError) -> Self {
        WebhookError::OperationalFailure(value.to_string())
    }
}

impl WebhookError {
    pub fn status(&self) -> u16 {
        match self {
            WebhookError::InvalidPayload(_) | WebhookError::UnsupportedRepository => 400,
            WebhookError::SyncFailure(_) | WebhookError::OperationalFailure(_) => 500,
        }
    }
}

/// The HTTP response for a webhook delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl From<WebhookError> for WebhookResponse {
    fn from(value: WebhookError) -> Self {
        WebhookResponse {
            status: value.status(),
            body: value.to_string(),
        }
    }
}

/// Handles push events: syncs the checkout, then restarts the containers.
///
/// Deliveries for the same repository are handled one at a time, different
/// repositories can be updated in parallel.
pub struct WebhookHandler {
    config: Config,
    synchronizer: Box<dyn Synchronizer>,
    runtime: Box<dyn ContainerRuntime>,
    locks: HashMap<String, Mutex<()>>,
}

impl WebhookHandler {
    pub fn new(
        config: Config,
        synchronizer: Box<dyn Synchronizer>,
        runtime: Box<dyn ContainerRuntime>,
    ) -> Self {
        let locks = config
            .repositories()
            .map(|(id, _)| (id.clone(), Mutex::new(())))
            .collect();

        WebhookHandler {
            config,
            synchronizer,
            runtime,
            locks,
        }
    }

    /// Handle a raw request body and turn the outcome into a response.
    pub fn handle(&self, body: &[u8]) -> WebhookResponse {
        match self.handle_inner(body) {
            Ok(name) => WebhookResponse {
                status: 200,
                body: format!("Updated and restarted containers for {name}"),
            },
            Err(err) => {
                match &err {
                    WebhookError::InvalidPayload(source) => {
                        warn!("Received an invalid payload: {source}.")
                    }
                    WebhookError::UnsupportedRepository => debug!("Repository not supported."),
                    _ => error!("Failed: {err}."),
                }
                err.into()
            }
        }
    }

    fn handle_inner(&self, body: &[u8]) -> Result<String, WebhookError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(WebhookError::InvalidPayload)?;
        let name = PushEvent::repository_name(value).ok_or(WebhookError::UnsupportedRepository)?;
        let repository = self
            .config
            .get(&name)
            .ok_or(WebhookError::UnsupportedRepository)?;

        info!("Received push for {name}.");

        // Held until the containers are restarted, so deliveries can't race on the checkout.
        let _guard = self
            .locks
            .get(&name)
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        let outcome = self.synchronizer.sync(&repository.directory, &repository.url)?;
        match (outcome.action, &outcome.before, &outcome.after) {
            (SyncAction::Pulled, Some(before), Some(after)) if before != after => info!(
                "Updated {name} from {} to {}.",
                shorthash(before),
                shorthash(after)
            ),
            (SyncAction::Pulled, _, _) => info!("{name} is already up to date."),
            (SyncAction::Cloned, _, after) => info!(
                "Cloned {name} at {}.",
                after.as_deref().map(shorthash).unwrap_or("unknown commit")
            ),
        }

        let restarted = restart_by_label(self.runtime.as_ref(), &repository.label)?;
        debug!("Restarted {restarted} containers for {name}.");

        Ok(name)
    }
}
