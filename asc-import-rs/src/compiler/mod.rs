//! Compiler invocation.
//!
//! [`Compiler`] is the seam to the external AssemblyScript compiler. It
//! exposes the two entry points the compiler offers: a string entry point
//! that returns the binary directly, and a process-style entry point driven
//! by command line arguments that writes its outputs to files.
//!
//! [`CompilerAdapter`] owns the readiness gate and turns a [`CompileRequest`]
//! into a [`CompileOutput`] using either entry point.

mod asc;

pub use asc::AscCli;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use log::{debug, warn};
use regex::Regex;
use tokio::io::AsyncWrite;
use tokio::sync::OnceCell;

use crate::collector::stream_collector;
use crate::config::CompileMode;
use crate::error::{AscError, Result};
use crate::options::{serialize_options, CompilerOptions};

lazy_static! {
    /// Readiness gates for `asc` executables, shared by every adapter in the
    /// process that drives the same executable.
    static ref ASC_GATES: Mutex<HashMap<PathBuf, Arc<ReadinessGate>>> = Mutex::new(HashMap::new());
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\[([^\[\]]*)\]").unwrap();
}

/// Byte sink the process-style entry point writes an output stream into.
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Result of the string entry point.
#[derive(Debug, Clone, Default)]
pub struct StringOutput {
    /// `None` (or empty) when compilation failed.
    pub binary: Option<Vec<u8>>,
    pub diagnostics: String,
}

pub trait Compiler: Send + Sync {
    /// One-time setup. Called at most once per [`ReadinessGate`].
    fn initialize(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Compiles `source` (the text of `source_path`) with the given option
    /// arguments.
    fn compile_string<'a>(
        &'a self,
        source_path: &'a Path,
        source: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<StringOutput>>;

    /// Runs the compiler with a full argument list. The returned future is
    /// the completion callback: it resolves once the compiler is done, with
    /// an error if it reported failure. Both sinks are closed on return.
    fn run<'a>(
        &'a self,
        args: &'a [String],
        stdout: Sink,
        stderr: Sink,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// A one-time asynchronous initialization shared by all invocations.
///
/// Callers arriving before the first initialization completes all wait for
/// that same initialization. The outcome, failure included, is kept for the
/// lifetime of the gate.
#[derive(Debug, Default)]
pub struct ReadinessGate {
    state: OnceCell<std::result::Result<(), String>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait(&self, compiler: &dyn Compiler) -> Result<()> {
        let outcome = self
            .state
            .get_or_init(|| async {
                debug!("Initializing compiler");
                compiler
                    .initialize()
                    .await
                    .map_err(|err| format!("{:#}", err))
            })
            .await;
        outcome.clone().map_err(AscError::Compiler)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state.get(), Some(Ok(())))
    }
}

/// Everything needed to compile one source file.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub source_path: PathBuf,
    /// File name of the source without its final extension. Names the
    /// emitted binary and source map.
    pub asset_base_name: String,
    pub options: CompilerOptions,
    pub file_extension: Option<String>,
    /// URL template for the source map; `[name]` is the map's file name.
    pub source_map_url_pattern: Option<String>,
    /// Extra entry file compiled ahead of the source for as-bind.
    pub as_bind_entry: Option<PathBuf>,
}

impl CompileRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let asset_base_name = asset_base_name(&source_path);
        Self {
            source_path,
            asset_base_name,
            options: CompilerOptions::new(),
            file_extension: None,
            source_map_url_pattern: None,
            as_bind_entry: None,
        }
    }

    pub fn binary_file_name(&self) -> String {
        format!("{}.wasm", self.asset_base_name)
    }

    pub fn source_map_file_name(&self) -> String {
        format!("{}.wasm.map", self.asset_base_name)
    }

    /// Leading arguments shared by both entry points when as-bind is enabled.
    fn as_bind_args(&self) -> Vec<String> {
        match &self.as_bind_entry {
            Some(entry) => vec![
                entry.to_string_lossy().into_owned(),
                "--exportRuntime".to_string(),
            ],
            None => Vec::new(),
        }
    }

    fn option_args(&self) -> Vec<String> {
        serialize_options(&self.options, self.file_extension.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub binary: Vec<u8>,
    pub source_map: Option<Vec<u8>>,
}

pub type CompileResult = Result<CompileOutput>;

/// Base name of `path` with its final extension removed
/// (`lib/sub.traction.ts` -> `sub.traction`).
pub fn asset_base_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name[..dot].to_string(),
        _ => file_name,
    }
}

/// Substitutes `[name]` in a URL pattern. Any other placeholder is a
/// configuration error.
pub fn render_url_pattern(pattern: &str, name: &str) -> Result<String> {
    if let Some(unknown) = PLACEHOLDER_RE
        .captures_iter(pattern)
        .map(|caps| caps[1].to_string())
        .find(|placeholder| placeholder != "name")
    {
        return Err(AscError::Config(format!(
            "unknown placeholder `[{}]` in URL pattern `{}`",
            unknown, pattern
        )));
    }
    Ok(pattern.replace("[name]", name))
}

/// Invokes a [`Compiler`] behind its readiness gate.
#[derive(Clone)]
pub struct CompilerAdapter {
    compiler: Arc<dyn Compiler>,
    gate: Arc<ReadinessGate>,
}

impl CompilerAdapter {
    /// Adapter with a readiness gate of its own.
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self::with_gate(compiler, Arc::new(ReadinessGate::new()))
    }

    pub fn with_gate(compiler: Arc<dyn Compiler>, gate: Arc<ReadinessGate>) -> Self {
        Self { compiler, gate }
    }

    /// Adapter for the `asc` executable at `executable`. The readiness gate is
    /// process-wide per executable.
    pub fn asc(executable: impl Into<PathBuf>) -> Self {
        let executable = executable.into();
        let gate = {
            let mut gates = ASC_GATES.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            gates.entry(executable.clone()).or_default().clone()
        };
        Self::with_gate(Arc::new(AscCli::new(executable)), gate)
    }

    pub async fn ready(&self) -> Result<()> {
        self.gate.wait(self.compiler.as_ref()).await
    }

    pub fn gate(&self) -> &Arc<ReadinessGate> {
        &self.gate
    }

    pub async fn compile(&self, request: &CompileRequest, mode: CompileMode) -> CompileResult {
        // Source maps can only be produced through the file entry point
        match (mode, &request.source_map_url_pattern) {
            (CompileMode::Memory, None) => self.compile_in_memory(request).await,
            _ => self.compile_to_file(request).await,
        }
    }

    async fn compile_in_memory(&self, request: &CompileRequest) -> CompileResult {
        let source = tokio::fs::read_to_string(&request.source_path)
            .await
            .map_err(|err| AscError::io(&request.source_path, err))?;
        self.ready().await?;

        let mut args = request.as_bind_args();
        args.extend(request.option_args());
        debug!(
            "Compiling {} in memory with {:?}",
            request.source_path.display(),
            args
        );

        let output = self
            .compiler
            .compile_string(&request.source_path, &source, &args)
            .await
            .map_err(|err| compile_failure(request, format!("{:#}", err)))?;

        match output.binary {
            Some(binary) if !binary.is_empty() => {
                report_warnings(request, &output.diagnostics);
                Ok(CompileOutput {
                    binary,
                    source_map: None,
                })
            }
            _ if output.diagnostics.trim().is_empty() => Err(compile_failure(
                request,
                "compiler produced an empty binary".to_string(),
            )),
            _ => Err(compile_failure(request, output.diagnostics)),
        }
    }

    async fn compile_to_file(&self, request: &CompileRequest) -> CompileResult {
        // Outputs live in a directory unique to this invocation, so concurrent
        // compiles of equally named sources never share a path.
        let workdir = tempfile::Builder::new()
            .prefix("asc-import-")
            .tempdir()
            .map_err(|err| AscError::io(std::env::temp_dir(), err))?;
        let binary_path = workdir.path().join(request.binary_file_name());
        let map_path = workdir.path().join(request.source_map_file_name());

        let mut args = request.as_bind_args();
        args.push(request.source_path.to_string_lossy().into_owned());
        args.push("--binaryFile".to_string());
        args.push(binary_path.to_string_lossy().into_owned());
        if let Some(pattern) = &request.source_map_url_pattern {
            args.push("--sourceMap".to_string());
            args.push(render_url_pattern(pattern, &request.source_map_file_name())?);
        }
        args.extend(request.option_args());

        self.ready().await?;
        debug!("Running compiler with {:?}", args);

        let (stdout, stdout_collected) = stream_collector();
        let (stderr, stderr_collected) = stream_collector();
        let completion = self
            .compiler
            .run(&args, Box::new(stdout), Box::new(stderr))
            .await;

        let diagnostics = stderr_collected
            .text()
            .await
            .map_err(|err| AscError::io(&request.source_path, err))?;
        let stdout = stdout_collected
            .text()
            .await
            .map_err(|err| AscError::io(&request.source_path, err))?;
        if !stdout.trim().is_empty() {
            debug!("Compiler output for {}:\n{}", request.source_path.display(), stdout);
        }

        if let Err(err) = completion {
            let detail = if diagnostics.trim().is_empty() {
                err.to_string()
            } else {
                diagnostics
            };
            return Err(compile_failure(request, detail));
        }
        report_warnings(request, &diagnostics);

        let binary = match tokio::fs::read(&binary_path).await {
            Ok(binary) if !binary.is_empty() => binary,
            Ok(_) => {
                return Err(compile_failure(
                    request,
                    "compiler produced an empty binary".to_string(),
                ))
            }
            Err(err) => {
                return Err(compile_failure(
                    request,
                    format!(
                        "compiler did not write {}: {}",
                        binary_path.display(),
                        err
                    ),
                ))
            }
        };

        let source_map = if request.source_map_url_pattern.is_some() {
            let map = tokio::fs::read(&map_path)
                .await
                .map_err(|err| AscError::io(&map_path, err))?;
            Some(map)
        } else {
            None
        };

        Ok(CompileOutput { binary, source_map })
    }
}

impl std::fmt::Debug for CompilerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerAdapter")
            .field("ready", &self.gate.is_ready())
            .finish_non_exhaustive()
    }
}

fn compile_failure(request: &CompileRequest, diagnostics: String) -> AscError {
    AscError::Compile {
        module: request.source_path.clone(),
        diagnostics,
    }
}

// Diagnostics on a successful compile are warnings; they are logged but do
// not fail the build.
fn report_warnings(request: &CompileRequest, diagnostics: &str) {
    if !diagnostics.trim().is_empty() {
        warn!(
            "Compiler reported diagnostics for {}:\n{}",
            request.source_path.display(),
            diagnostics.trim_end()
        );
    }
}
