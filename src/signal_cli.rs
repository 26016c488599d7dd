use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long a single signal-cli call may run before it is killed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to start signal-cli: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("process killed as timeout reached")]
    Timeout,

    #[error("failed to kill signal-cli after timeout: {0}")]
    Kill(#[source] std::io::Error),

    /// Non-zero exit. Carries whatever the tool wrote to stderr.
    #[error("{0}")]
    Failed(String),

    #[error("failed to read signal-cli output: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle on the external signal-cli program.
#[derive(Debug, Clone)]
pub struct SignalCli {
    program: PathBuf,
    config_dir: PathBuf,
    timeout: Duration,
}

impl SignalCli {
    pub fn new(program: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config_dir: config_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `<program> --config <dir> -u <number> <args...>`.
    pub async fn invoke(&self, number: &str, args: &[String]) -> Result<String, CliError> {
        if let Some(subcommand) = args.first() {
            debug!("signal-cli {} for {}", subcommand, number);
        }
        self.execute(self.command_args(number, args)).await
    }

    fn command_args(&self, number: &str, args: &[String]) -> Vec<OsString> {
        let mut cmd: Vec<OsString> = vec![
            "--config".into(),
            self.config_dir.clone().into_os_string(),
            "-u".into(),
            number.into(),
        ];
        cmd.extend(args.iter().map(OsString::from));
        cmd
    }

    /// Spawns the program once with `args` and waits for it, up to the timeout.
    ///
    /// Returns stdout verbatim on success. A non-zero exit yields
    /// [`CliError::Failed`] with the captured stderr. If the deadline passes
    /// first the child is killed and reaped before [`CliError::Timeout`] is
    /// returned.
    pub async fn execute<I, S>(&self, args: I) -> Result<String, CliError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CliError::Spawn)?;

        let mut stdout = drain(child.stdout.take());
        let mut stderr = drain(child.stderr.take());

        // The deadline covers draining the pipes too: a process the tool left
        // behind can keep them open after the tool itself has exited.
        let finished = tokio::select! {
            result = async {
                let status = child.wait().await?;
                let out = collect(&mut stdout).await?;
                let err = collect(&mut stderr).await?;
                Ok::<_, CliError>((status, out, err))
            } => Some(result),
            _ = tokio::time::sleep(self.timeout) => None,
        };

        let Some(result) = finished else {
            stdout.abort();
            stderr.abort();
            // Already reaped if only the pipes were still open.
            if !matches!(child.try_wait(), Ok(Some(_))) {
                child.kill().await.map_err(CliError::Kill)?;
            }
            warn!(
                "{} killed after {:?}",
                self.program.display(),
                self.timeout
            );
            return Err(CliError::Timeout);
        };
        let (status, stdout, stderr) = result?;

        if !status.success() {
            let detail = stderr.trim_end();
            warn!("{} failed with {}: {}", self.program.display(), status, detail);
            return Err(CliError::Failed(if detail.is_empty() {
                format!("signal-cli exited with {}", status)
            } else {
                detail.to_string()
            }));
        }

        Ok(stdout)
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn collect(reader: &mut JoinHandle<std::io::Result<Vec<u8>>>) -> Result<String, CliError> {
    let bytes = reader.await.map_err(std::io::Error::other)??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
