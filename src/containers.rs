use crate::command::{CommandError, CommandLine, CommandRunner};
use log::{debug, info};
use mockall::automock;
use thiserror::Error;

/// A running container, as reported by the runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
}

/// A custom error describing the error cases for the container runtime.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The runtime couldn't be started.
    #[error("{0}")]
    CommandFailure(#[from] CommandError),
    /// The runtime returned a non-zero exit code, the parameters are
    /// the command, the exit code and the output.
    #[error("{0} returned non-zero exit code {1}: {2}")]
    NonZeroExitcode(CommandLine, i32, String),
}

/// The container runtime that can restart the services of a repository.
#[automock]
pub trait ContainerRuntime: Send + Sync {
    /// List the running containers carrying the label.
    fn list_by_label(&self, label: &str) -> Result<Vec<Container>, ContainerError>;
    /// Restart a single container.
    fn restart(&self, container: &Container) -> Result<(), ContainerError>;
}

/// Restart every running container carrying the label.
///
/// Returns the number of restarted containers. Finding no containers is fine,
/// but the first failed restart stops the remaining ones.
pub fn restart_by_label(runtime: &dyn ContainerRuntime, label: &str) -> Result<usize, ContainerError> {
    let containers = runtime.list_by_label(label)?;
    if containers.is_empty() {
        info!("No containers found with label: {label}.");
        return Ok(0);
    }

    for container in &containers {
        info!("Restarting container {}.", container.name);
        runtime.restart(container)?;
    }

    Ok(containers.len())
}

const LIST_FORMAT: &str = "{{.ID}}\t{{.Names}}";

/// A container runtime driven through its command line (`docker` or `podman`).
pub struct CliRuntime<R: CommandRunner> {
    binary: String,
    runner: R,
}

impl<R: CommandRunner> CliRuntime<R> {
    pub fn new(binary: &str, runner: R) -> Self {
        CliRuntime {
            binary: binary.to_string(),
            runner,
        }
    }

    fn run(&self, args: Vec<String>) -> Result<String, ContainerError> {
        let result = self.runner.run(&self.binary, &args)?;

        if result.success() {
            Ok(result.output)
        } else {
            Err(ContainerError::NonZeroExitcode(
                CommandLine::new(&self.binary, &args),
                result.code,
                result.output,
            ))
        }
    }
}

fn parse_container_list(output: &str) -> Vec<Container> {
    output
        .lines()
        .filter_map(|line| {
            let (id, name) = line.trim().split_once('\t')?;
            Some(Container {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

impl<R: CommandRunner> ContainerRuntime for CliRuntime<R> {
    fn list_by_label(&self, label: &str) -> Result<Vec<Container>, ContainerError> {
        let output = self.run(vec![
            "ps".to_string(),
            "--filter".to_string(),
            format!("label={label}"),
            "--format".to_string(),
            LIST_FORMAT.to_string(),
        ])?;
        let containers = parse_container_list(&output);
        debug!("Found {} containers with label {label}.", containers.len());

        Ok(containers)
    }

    fn restart(&self, container: &Container) -> Result<(), ContainerError> {
        self.run(vec!["restart".to_string(), container.id.clone()])?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, MockCommandRunner};
    use log::Level;
    use mockall::Sequence;

    fn container(id: &str, name: &str) -> Container {
        Container {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn it_should_parse_the_container_list() {
        let containers = parse_container_list("abc123\tweb\ndef456\tworker\n\nmalformed\n");

        assert_eq!(vec![container("abc123", "web"), container("def456", "worker")], containers);
    }

    #[test]
    fn it_should_list_containers_by_label() -> Result<(), ContainerError> {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, args| {
                program == "podman"
                    && args.to_vec()
                        == vec![
                            String::from("ps"),
                            String::from("--filter"),
                            String::from("label=app.foo"),
                            String::from("--format"),
                            String::from(LIST_FORMAT),
                        ]
            })
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    code: 0,
                    output: String::from("abc123\tfoo-web-1"),
                })
            });

        let runtime = CliRuntime::new("podman", runner);
        let containers = runtime.list_by_label("app.foo")?;

        assert_eq!(vec![container("abc123", "foo-web-1")], containers);

        Ok(())
    }

    #[test]
    fn it_should_restart_by_id() -> Result<(), ContainerError> {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, args| {
                program == "docker"
                    && args.to_vec() == vec![String::from("restart"), String::from("abc123")]
            })
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    code: 0,
                    output: String::from("abc123"),
                })
            });

        let runtime = CliRuntime::new("docker", runner);
        runtime.restart(&container("abc123", "web"))?;

        Ok(())
    }

    #[test]
    fn it_should_fail_if_the_runtime_fails() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_, _| {
            Ok(CommandOutput {
                code: 1,
                output: String::from("Cannot connect to the Docker daemon"),
            })
        });

        let runtime = CliRuntime::new("docker", runner);
        let result = runtime.list_by_label("app.foo");

        assert!(
            matches!(result, Err(ContainerError::NonZeroExitcode(_, 1, _))),
            "{result:?} should be NonZeroExitcode"
        );
    }

    #[test]
    fn it_should_restart_every_labelled_container() -> Result<(), ContainerError> {
        let mut seq = Sequence::new();
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_by_label()
            .withf(|label| label == "app.foo")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![container("1", "web"), container("2", "worker")]));
        runtime
            .expect_restart()
            .withf(|c| c.id == "1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runtime
            .expect_restart()
            .withf(|c| c.id == "2")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let restarted = restart_by_label(&runtime, "app.foo")?;
        assert_eq!(2, restarted);

        Ok(())
    }

    #[test]
    fn it_should_not_fail_without_containers() -> Result<(), ContainerError> {
        testing_logger::setup();

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_by_label()
            .times(1)
            .returning(|_| Ok(vec![]));
        runtime.expect_restart().times(0);

        let restarted = restart_by_label(&runtime, "app.foo")?;
        assert_eq!(0, restarted);

        testing_logger::validate(|captured_logs| {
            assert!(captured_logs.iter().any(|log| log.level == Level::Info
                && log.body == "No containers found with label: app.foo."));
        });

        Ok(())
    }

    #[test]
    fn it_should_stop_on_the_first_failed_restart() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_by_label()
            .times(1)
            .returning(|_| Ok(vec![container("1", "web"), container("2", "worker")]));
        runtime
            .expect_restart()
            .withf(|c| c.id == "1")
            .times(1)
            .returning(|c| {
                Err(ContainerError::NonZeroExitcode(
                    CommandLine(vec![String::from("docker"), String::from("restart"), c.id.clone()]),
                    1,
                    String::from("no such container"),
                ))
            });
        runtime.expect_restart().withf(|c| c.id == "2").times(0);

        let result = restart_by_label(&runtime, "app.foo");

        assert!(
            matches!(result, Err(ContainerError::NonZeroExitcode(_, 1, _))),
            "{result:?} should be NonZeroExitcode"
        );
    }
}
