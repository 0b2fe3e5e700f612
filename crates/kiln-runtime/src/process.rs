use std::path::Path;

/// Abstraction over entrypoint process execution for testability.
///
/// Production code uses [`RealRunner`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner: Send + Sync {
    /// Launch `program` in `cwd` and wait for it, returning its exit code.
    async fn run(&self, program: &str, args: &[String], cwd: &Path)
    -> Result<i32, ProcessError>;
}

/// Runner that spawns the entrypoint as a child with inherited stdio.
pub struct RealRunner;

impl ProcessRunner for RealRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<i32, ProcessError> {
        use std::process::Stdio;

        let status = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ProcessError::Spawn {
                program: program.to_owned(),
                source: e,
            })?;

        Ok(exit_code(status))
    }
}

/// Exit code of a finished child, folding signal deaths into `128 + N`.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to launch '{program}' — is it installed on this machine?")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}
