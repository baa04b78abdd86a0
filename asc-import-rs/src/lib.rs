// Allow uninlined format args for cleaner error and log messages
#![allow(clippy::uninlined_format_args)]
#![doc = include_str!("../README.md")]

pub mod collector;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod options;
pub mod plugin;
pub mod polyfill;
pub mod resolver;

#[macro_use]
extern crate lazy_static;

pub use compiler::{AscCli, CompileRequest, CompilerAdapter};
pub use config::{CompileMode, PluginOptions};
pub use context::{AssetName, EmittedAsset, PluginContext};
pub use error::AscError;
pub use options::{CompilerOptions, OptionValue};
pub use plugin::AscPlugin;
pub use anyhow;
