//! Shell command execution
//!
//! The dump/restore pipeline leans on shell plumbing (pipes, redirection,
//! remote `ssh` quoting), so commands run through `sh -c`. Credentials
//! travel via the environment (`PGPASSWORD`), never on the command line,
//! so logging the command text is safe.

use crate::error::RestorerError;
use tokio::process::{Child, Command};

fn shell(cmd: &str, envs: &[(&'static str, String)]) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    for (key, value) in envs {
        command.env(key, value);
    }
    command
}

/// Spawn without waiting; the caller owns the child. The child is killed
/// if its handle is dropped before being awaited, so an error elsewhere
/// in the pipeline cannot leak a running transfer.
pub(crate) fn spawn_shell(
    cmd: &str,
    envs: &[(&'static str, String)],
) -> Result<Child, RestorerError> {
    tracing::info!(command = %cmd, "spawning command");
    shell(cmd, envs)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RestorerError::CommandSpawn {
            command: cmd.to_string(),
            source,
        })
}

/// Run to completion; non-zero exit is an error.
pub(crate) async fn run_shell(
    cmd: &str,
    envs: &[(&'static str, String)],
) -> Result<(), RestorerError> {
    tracing::info!(command = %cmd, "running command");
    let status = shell(cmd, envs)
        .status()
        .await
        .map_err(|source| RestorerError::CommandSpawn {
            command: cmd.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(RestorerError::CommandFailed {
            command: cmd.to_string(),
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_shell_success() {
        run_shell("true", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_shell_reports_exit_status() {
        let err = run_shell("exit 3", &[]).await.unwrap_err();
        match err {
            RestorerError::CommandFailed { command, status } => {
                assert_eq!(command, "exit 3");
                assert_eq!(status, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_env_is_passed_through() {
        run_shell("test \"$PGPASSWORD\" = hunter2", &[("PGPASSWORD", "hunter2".to_string())])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_spawned_child_can_be_awaited() {
        let mut child = spawn_shell("exit 0", &[]).unwrap();
        let status = child.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_dropped_child_does_not_keep_running() {
        let child = spawn_shell("sleep 30", &[]).unwrap();
        let pid = child.id().unwrap();
        drop(child);
        std::thread::sleep(std::time::Duration::from_millis(200));

        // Dead: either fully reaped or a zombie awaiting reaping.
        let running = match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => false,
            Ok(stat) => {
                let state = stat.rsplit(") ").next().and_then(|rest| rest.chars().next());
                state != Some('Z')
            }
        };
        assert!(!running);
    }
}
