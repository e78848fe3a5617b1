//
// compiler/subprocess.rs
//
// Invocations of the external `aelys` binary
//

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Handle on an installed compiler binary.
#[derive(Debug, Clone)]
pub struct AelysCompiler {
    binary: PathBuf,
    /// Working directory for `asm`; the script's directory when unset
    working_dir: Option<PathBuf>,
}

impl AelysCompiler {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, path: PathBuf) -> Self {
        self.working_dir = Some(path);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Compile `file` to assembly: `aelys asm <file> --stdout <args>`.
    ///
    /// `args` is split on whitespace. Returns stdout on success. On a non-zero
    /// exit the error message is stderr verbatim, or a generic status message
    /// when stderr is empty.
    pub async fn asm(&self, file: &Path, args: &str, cancel: &CancellationToken) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("asm").arg(file).arg("--stdout");
        cmd.args(args.split_whitespace());

        let script_dir = file.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(wd) = self.working_dir.as_deref().or(script_dir) {
            cmd.current_dir(wd);
        }

        cmd.stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        log::info!(
            "Running {} asm {} --stdout {}",
            self.binary.display(),
            file.display(),
            args
        );
        let child = cmd
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn {}: {e}", self.binary.display()))?;

        let output = tokio::select! {
            result = child.wait_with_output() => {
                result.map_err(|e| anyhow!("Failed to run {}: {e}", self.binary.display()))?
            }
            _ = cancel.cancelled() => bail!("ASM generation cancelled"),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.trim().is_empty() {
                bail!("aelys asm exited with {}", output.status);
            }
            bail!("{}", stderr.trim_end());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Prefix needed to invoke a quoted program path in the integrated terminal.
/// PowerShell requires the `&` call operator.
pub fn call_operator(windows: bool) -> &'static str {
    if windows {
        "& "
    } else {
        ""
    }
}

/// Terminal line that runs a script: `"<bin>" <args> "<file>"`.
pub fn run_command_line(binary: &Path, run_args: &str, file: &Path, windows: bool) -> String {
    let args = run_args.trim();
    let mut line = format!("{}\"{}\"", call_operator(windows), binary.display());
    if !args.is_empty() {
        line.push(' ');
        line.push_str(args);
    }
    line.push_str(&format!(" \"{}\"", file.display()));
    line
}

/// Terminal line that starts the REPL: `"<bin>" repl`.
pub fn repl_command_line(binary: &Path, windows: bool) -> String {
    format!("{}\"{}\" repl", call_operator(windows), binary.display())
}
