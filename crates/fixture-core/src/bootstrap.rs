//! Bootstrap command line for a cluster syncing from the fixture repository
//!
//! The command runs as a child process with a hard time limit. Transport
//! specific arguments come from the [`Authenticator`] that reaches the same
//! remote, so bootstrap and fixture flows always agree on credentials.

use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use fixture_git::Authenticator;

use crate::config::{BootstrapConfig, DEFAULT_COMPONENTS_EXTRA};
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const REDACTED_PREFIXES: [&str; 1] = ["--password="];

/// A fully resolved bootstrap command.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapInvocation {
    program: String,
    base_args: Vec<String>,
    components_extra: Vec<String>,
    confirm_prompt: bool,
    current_dir: Option<PathBuf>,
}

impl BootstrapInvocation {
    /// Build `bootstrap git --url=<url> <transport args> --kubeconfig=<k>
    /// --path=<p>` for `program`.
    ///
    /// SSH key material is written into `key_dir`, which must outlive the
    /// run.
    pub fn new(
        program: &str,
        remote_url: &str,
        auth: &dyn Authenticator,
        key_dir: &Path,
        kubeconfig: Option<&Path>,
        path: &str,
    ) -> Result<Self> {
        let transport = auth.bootstrap_args(key_dir)?;

        let mut base_args = vec![
            "bootstrap".to_string(),
            "git".to_string(),
            format!("--url={remote_url}"),
        ];
        base_args.extend(transport.args);
        if let Some(kubeconfig) = kubeconfig {
            base_args.push(format!("--kubeconfig={}", kubeconfig.display()));
        }
        base_args.push(format!("--path={path}"));

        Ok(Self {
            program: program.to_string(),
            base_args,
            components_extra: DEFAULT_COMPONENTS_EXTRA.iter().map(|c| c.to_string()).collect(),
            confirm_prompt: transport.confirm_prompt,
            current_dir: None,
        })
    }

    /// Build from the `[bootstrap]` configuration section.
    pub fn from_config(
        config: &BootstrapConfig,
        remote_url: &str,
        auth: &dyn Authenticator,
        key_dir: &Path,
    ) -> Result<Self> {
        let invocation = Self::new(
            &config.program,
            remote_url,
            auth,
            key_dir,
            config.kubeconfig.as_deref(),
            &config.path,
        )?;
        Ok(invocation.components_extra(&config.components_extra))
    }

    /// Replace the extra components; an empty list omits the flag.
    pub fn components_extra<S: AsRef<str>>(mut self, components: &[S]) -> Self {
        self.components_extra = components.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector, secrets included.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.base_args.clone();
        if !self.components_extra.is_empty() {
            args.push("--components-extra".to_string());
            args.push(self.components_extra.join(","));
        }
        args
    }

    /// The program asks for confirmation and gets `y` on stdin.
    pub fn needs_confirmation(&self) -> bool {
        self.confirm_prompt
    }

    /// Run to completion or until `timeout`, returning combined output.
    ///
    /// The child is killed when the limit passes. A non-zero exit carries
    /// stdout followed by stderr.
    pub fn run(&self, timeout: Duration) -> Result<String> {
        let command_line = self.to_string();
        tracing::info!(command = %command_line, timeout = ?timeout, "running bootstrap");

        let mut command = Command::new(&self.program);
        command
            .args(self.args())
            .stdin(if self.confirm_prompt {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::io(format!("spawning `{}`", self.program), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The program may exit before reading; the exit status tells.
            if let Err(e) = stdin.write_all(b"y\n") {
                tracing::debug!(error = %e, "confirmation not consumed");
            }
        }
        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());

        let status = match wait_with_deadline(&mut child, timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(command = %command_line, "bootstrap exceeded its time limit, killing");
                if let Err(e) = child.kill() {
                    tracing::debug!(error = %e, "kill after timeout failed");
                }
                let _ = child.wait();
                let _ = collect(stdout);
                let _ = collect(stderr);
                return Err(Error::Timeout {
                    operation: format!("`{}`", self.program),
                    after: timeout,
                });
            }
            Err(e) => return Err(Error::io(format!("waiting for `{}`", self.program), e)),
        };

        let mut output = collect(stdout);
        output.push_str(&collect(stderr));

        if status.success() {
            tracing::info!(command = %self.program, "bootstrap finished");
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                command: command_line,
                status: status.to_string(),
                output,
            })
        }
    }
}

impl fmt::Display for BootstrapInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        if self.confirm_prompt {
            f.write_str(" <<< y")?;
        }
        for arg in self.args() {
            match REDACTED_PREFIXES.iter().find(|p| arg.starts_with(**p)) {
                Some(prefix) => write!(f, " {prefix}<redacted>")?,
                None => write!(f, " {arg}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BootstrapInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BootstrapInvocation")
            .field(&self.to_string())
            .finish()
    }
}

/// Poll until the child exits or `timeout` passes (`Ok(None)`).
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Drain a pipe on its own thread so a chatty child never blocks.
fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
