//! Listen for git push webhooks, update the local checkout and restart its containers.
//!
//! ## How it works
//!
//! `rehook` is configured once from the environment with a list of repositories.
//! Every repository has a git URL, a local checkout directory and a container label.
//! When a push webhook arrives for a known repository, the checkout is
//! **synchronized** (cloned or pulled) and then every container carrying the label
//! is **restarted**.
//!
//! ```ignore
//! +---------+       +------+       +---------+
//! | webhook | ----> | sync | ----> | restart |
//! +---------+       +------+       +---------+
//! ```
//!

/// Running external programs with captured output.
pub mod command;
/// The repository configuration, loaded from environment variables.
pub mod config;
/// Restarting the containers of a repository (e.g. [with docker](containers::CliRuntime)).
pub mod containers;
/// The HTTP listener.
pub mod server;
/// Graceful shutdown on termination signals.
pub mod signal;
/// Cloning or pulling the local checkouts.
pub mod sync;
/// Handling the push events.
pub mod webhook;
