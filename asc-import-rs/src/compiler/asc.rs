use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context};
use futures::future::BoxFuture;
use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Compiler, Sink, StringOutput};

/// [`Compiler`] backed by the `asc` command line compiler.
#[derive(Debug, Clone)]
pub struct AscCli {
    executable: PathBuf,
}

impl AscCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.stdin(Stdio::null());
        command
    }
}

impl Default for AscCli {
    fn default() -> Self {
        Self::new("asc")
    }
}

impl Compiler for AscCli {
    fn initialize(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let output = self
                .command()
                .arg("--version")
                .output()
                .await
                .with_context(|| format!("failed to start {}", self.executable.display()))?;
            if !output.status.success() {
                bail!(
                    "{} --version exited with {}: {}",
                    self.executable.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            info!(
                "Using {} ({})",
                self.executable.display(),
                String::from_utf8_lossy(&output.stdout).trim()
            );
            Ok(())
        })
    }

    fn compile_string<'a>(
        &'a self,
        source_path: &'a Path,
        source: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<StringOutput>> {
        Box::pin(async move {
            // The command line compiler only reads files. A source that exists
            // on disk is compiled in place so its relative imports resolve;
            // anything else goes through the scratch directory.
            let scratch = tempfile::Builder::new()
                .prefix("asc-import-src-")
                .tempdir()
                .context("failed to create scratch directory")?;
            let binary_path = scratch.path().join("output.wasm");
            let in_place = tokio::fs::metadata(source_path)
                .await
                .map(|metadata| metadata.is_file())
                .unwrap_or(false);
            let input = if in_place {
                source_path.to_path_buf()
            } else {
                let file_name = source_path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("input.ts"));
                let input = scratch.path().join(file_name);
                tokio::fs::write(&input, source)
                    .await
                    .with_context(|| format!("failed to write {}", input.display()))?;
                input
            };

            // Leading arguments (as-bind entry and flag) precede the source
            debug!("Compiling {} with {:?}", input.display(), args);
            let output = self
                .command()
                .args(args)
                .arg(&input)
                .arg("--binaryFile")
                .arg(&binary_path)
                .output()
                .await
                .with_context(|| format!("failed to start {}", self.executable.display()))?;

            let binary = match tokio::fs::read(&binary_path).await {
                Ok(binary) if output.status.success() => Some(binary),
                _ => None,
            };
            Ok(StringOutput {
                binary,
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }

    fn run<'a>(
        &'a self,
        args: &'a [String],
        mut stdout: Sink,
        mut stderr: Sink,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let mut child = self
                .command()
                .args(args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .with_context(|| format!("failed to start {}", self.executable.display()))?;
            let mut child_stdout = child.stdout.take().context("compiler stdout not captured")?;
            let mut child_stderr = child.stderr.take().context("compiler stderr not captured")?;

            let (status, copied_out, copied_err) = tokio::join!(
                child.wait(),
                tokio::io::copy(&mut child_stdout, &mut stdout),
                tokio::io::copy(&mut child_stderr, &mut stderr),
            );
            copied_out.context("failed to forward compiler stdout")?;
            copied_err.context("failed to forward compiler stderr")?;
            stdout.shutdown().await?;
            stderr.shutdown().await?;

            let status = status?;
            if !status.success() {
                bail!("{} exited with {}", self.executable.display(), status);
            }
            Ok(())
        })
    }
}
