// Subprocess seam for counter sampling. ProcessRunner is the real one; tests script their own.

use std::future::Future;
use std::process::Stdio;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner: Send + Sync {
    /// `args[0]` is the program, the rest its arguments.
    fn run(&self, args: &[String]) -> impl Future<Output = std::io::Result<CommandOutput>> + Send;
}

/// Spawns the program with tokio. The child is killed if the future is dropped (timeout).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, args: &[String]) -> std::io::Result<CommandOutput> {
        let (program, rest) = args.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
        })?;
        let output = tokio::process::Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
