#![allow(clippy::uninlined_format_args)]

mod context;

use std::path::{Path, PathBuf};

use anyhow::Context;
use asc_import_rs::polyfill::{POLYFILL_ID, POLYFILL_SOURCE};
use asc_import_rs::{AscPlugin, CompileMode, PluginOptions};
use clap::Parser;
use log::info;

use crate::context::FsContext;

/// asc-import: Compile an `asc:` import into a WebAssembly asset and the
/// JavaScript module that replaces the import
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Import specifier as written in the importing module, e.g. asc:./subtraction.ts
    pub specifier: String,

    /// Path of the importing module. The specifier is resolved relative to its directory
    #[arg(short, long)]
    pub importer: Option<String>,

    /// Directory emitted assets are written to
    #[arg(short = 'd', long, default_value = ".")]
    pub out_dir: String,

    /// JSON file with plugin options
    #[arg(short, long)]
    pub config: Option<String>,

    /// Compile mode. One of memory, file
    #[arg(short, long)]
    pub mode: Option<CompileMode>,

    /// Path to the asc executable
    #[arg(long)]
    pub compiler: Option<String>,

    /// Write the generated module to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Also write the compileStreaming helper module to this file
    #[arg(long)]
    pub polyfill: Option<String>,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

async fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut options = match &args.config {
        Some(config) => PluginOptions::from_path(&expand(config))?,
        None => PluginOptions::default(),
    };
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if let Some(compiler) = &args.compiler {
        options.compiler = expand(compiler);
    }

    let importer = args
        .importer
        .as_deref()
        .map(|importer| expand(importer).to_string_lossy().into_owned());
    let plugin = AscPlugin::new(options)?;
    let ctx = FsContext::new(expand(&args.out_dir));

    let id = plugin
        .resolve_id(&args.specifier, importer.as_deref(), &ctx)
        .await?
        .with_context(|| format!("`{}` is not an asc import", args.specifier))?;
    let module = plugin
        .load(&id, &ctx)
        .await?
        .with_context(|| format!("Nothing to load for {}", id))?;
    ctx.write_assets().await?;

    if let Some(polyfill) = &args.polyfill {
        let path = expand(polyfill);
        write_file(&path, POLYFILL_SOURCE).await?;
        info!("Wrote {} for {}", path.display(), POLYFILL_ID);
    }

    match &args.output {
        Some(output) => {
            let path = expand(output);
            write_file(&path, &module).await?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", module),
    }
    Ok(())
}
