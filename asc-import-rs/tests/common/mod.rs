#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use asc_import_rs::compiler::{Compiler, Sink, StringOutput};
use asc_import_rs::{EmittedAsset, PluginContext};
use futures::future::BoxFuture;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use wasm_encoder::{
    CodeSection, ExportKind, ExportSection, Function, FunctionSection, Instruction, Module,
    TypeSection, ValType,
};

/// Host double that resolves relative to the importer and records every
/// watch file and emitted asset.
pub struct RecordingContext {
    pub root: PathBuf,
    watched: Mutex<Vec<PathBuf>>,
    emitted: Mutex<Vec<EmittedAsset>>,
}

impl RecordingContext {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            watched: Mutex::new(Vec::new()),
            emitted: Mutex::new(Vec::new()),
        }
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched.lock().unwrap().clone()
    }

    pub fn emitted(&self) -> Vec<EmittedAsset> {
        self.emitted.lock().unwrap().clone()
    }
}

impl PluginContext for RecordingContext {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        importer: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>> {
        Box::pin(async move {
            let base = importer
                .and_then(|importer| Path::new(importer).parent())
                .unwrap_or(&self.root);
            let candidate = base.join(specifier);
            if !candidate.exists() {
                anyhow::bail!("{} does not exist", candidate.display());
            }
            Ok(candidate.canonicalize()?)
        })
    }

    fn add_watch_file(&self, path: &Path) {
        self.watched.lock().unwrap().push(path.to_path_buf());
    }

    fn emit_file(&self, asset: EmittedAsset) -> String {
        let mut emitted = self.emitted.lock().unwrap();
        emitted.push(asset);
        format!("ref{}", emitted.len())
    }
}

lazy_static::lazy_static! {
    static ref EXPORT_FN_RE: Regex = Regex::new(
        r"export function (\w+)\(\w+: i32, \w+: i32\): i32 \{\s*return \w+ ([+-]) \w+;\s*\}"
    )
    .unwrap();
}

/// Stand-in for `asc` understanding a tiny subset of AssemblyScript:
/// exported `(i32, i32) -> i32` functions returning a sum or difference.
/// Sources containing `ERROR` fail with a TypeScript-style diagnostic,
/// `SILENT_FAILURE` fails without writing any diagnostics and `EMPTY_BINARY`
/// succeeds without producing any bytes.
#[derive(Default)]
pub struct TestCompiler {
    pub initializations: AtomicUsize,
    pub invocations: AtomicUsize,
    pub last_args: Mutex<Vec<String>>,
}

pub const SILENT_FAILURE_EXIT: &str = "asc exited with exit status: 1";

pub const DIAGNOSTIC: &str = "ERROR TS1005: ';' expected.\n  in subtraction.ts(1,37)";

impl TestCompiler {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Vec<String> {
        self.last_args.lock().unwrap().clone()
    }

    fn record(&self, args: &[String]) {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        *self.last_args.lock().unwrap() = args.to_vec();
    }
}

pub fn build_module(source: &str) -> Vec<u8> {
    let mut types = TypeSection::new();
    types
        .ty()
        .function(vec![ValType::I32, ValType::I32], vec![ValType::I32]);

    let mut functions = FunctionSection::new();
    let mut exports = ExportSection::new();
    let mut code = CodeSection::new();
    for (index, caps) in EXPORT_FN_RE.captures_iter(source).enumerate() {
        functions.function(0);
        exports.export(&caps[1], ExportKind::Func, index as u32);
        let mut body = Function::new(vec![]);
        body.instruction(&Instruction::LocalGet(0));
        body.instruction(&Instruction::LocalGet(1));
        let op = if &caps[2] == "-" {
            Instruction::I32Sub
        } else {
            Instruction::I32Add
        };
        body.instruction(&op);
        body.instruction(&Instruction::End);
        code.function(&body);
    }

    let mut module = Module::new();
    module.section(&types);
    module.section(&functions);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

impl Compiler for TestCompiler {
    fn initialize(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.initializations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn compile_string<'a>(
        &'a self,
        _source_path: &'a Path,
        source: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, anyhow::Result<StringOutput>> {
        Box::pin(async move {
            self.record(args);
            if source.contains("EMPTY_BINARY") {
                return Ok(StringOutput {
                    binary: Some(Vec::new()),
                    diagnostics: String::new(),
                });
            }
            if source.contains("ERROR") {
                return Ok(StringOutput {
                    binary: None,
                    diagnostics: DIAGNOSTIC.to_string(),
                });
            }
            Ok(StringOutput {
                binary: Some(build_module(source)),
                diagnostics: String::new(),
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
            self.record(args);
            let input = args
                .iter()
                .find(|arg| arg.ends_with(".ts") && !arg.contains("as-bind"))
                .ok_or_else(|| anyhow::anyhow!("no input file"))?;
            let source = tokio::fs::read_to_string(input).await?;
            // Give concurrent invocations a chance to interleave
            tokio::task::yield_now().await;

            if source.contains("SILENT_FAILURE") {
                anyhow::bail!("{}", SILENT_FAILURE_EXIT);
            }
            if source.contains("ERROR") {
                stderr.write_all(DIAGNOSTIC.as_bytes()).await?;
                anyhow::bail!("1 parse error(s)");
            }
            if source.contains("WARNING") {
                stderr.write_all(b"WARNING AS201: Conversion may lose precision").await?;
            }

            let binary_path = arg_after(args, "--binaryFile")
                .ok_or_else(|| anyhow::anyhow!("--binaryFile missing"))?;
            tokio::fs::write(binary_path, build_module(&source)).await?;
            if let Some(url) = arg_after(args, "--sourceMap") {
                let map = serde_json::json!({
                    "version": 3,
                    "sources": [input],
                    "sourceRoot": url,
                    "mappings": "",
                });
                tokio::fs::write(format!("{}.map", binary_path), map.to_string()).await?;
            }
            stdout.write_all(b"compiled\n").await?;
            Ok(())
        })
    }
}

pub const SUBTRACTION_TS: &str =
    "export function subtract(a: i32, b: i32): i32 {\n  return a - b;\n}\n";

pub const ADDITION_TS: &str = "export function add(a: i32, b: i32): i32 {\n  return a + b;\n}\n";

pub const BROKEN_TS: &str = "export function subtract(a: i32 ERROR";

/// Instantiates `binary` with no imports and calls a binary i32 export.
pub fn call_export(binary: &[u8], name: &str, args: (i32, i32)) -> i32 {
    let engine = wasmi::Engine::default();
    let module = wasmi::Module::new(&engine, binary).expect("failed to parse WASM module");
    let mut store = wasmi::Store::new(&engine, ());
    let linker = <wasmi::Linker<()>>::new(&engine);
    let instance = linker
        .instantiate(&mut store, &module)
        .expect("instantiation failed")
        .start(&mut store)
        .expect("start failed");
    let func = instance
        .get_typed_func::<(i32, i32), i32>(&store, name)
        .expect("missing export");
    func.call(&mut store, args).expect("call trapped")
}

/// Writes `source` to `dir/name` and returns an importer path in `dir`.
pub fn write_fixture(dir: &Path, name: &str, source: &str) -> String {
    std::fs::write(dir.join(name), source).unwrap();
    dir.join("main.js").to_string_lossy().into_owned()
}
