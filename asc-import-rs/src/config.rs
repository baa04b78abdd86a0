//! Plugin configuration.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::{AscError, Result};
use crate::options::CompilerOptions;

/// Marker prepended to resolved paths so the loader recognizes its own ids.
pub const MARKER: &str = "asc:";

/// Default specifier pattern: the `asc:` prefix followed by the real path.
pub const DEFAULT_MATCHER: &str = "^asc:(.+)$";

/// Entry file that as-bind needs compiled alongside the user's source.
pub const DEFAULT_AS_BIND_ENTRY: &str = "node_modules/as-bind/lib/assembly/as-bind.ts";

/// How the compiler is invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// Hand the source text to the compiler's string entry point.
    #[default]
    Memory,
    /// Run the compiler's process-style entry point against the source file,
    /// writing the binary to a temporary path.
    File,
}

impl std::str::FromStr for CompileMode {
    type Err = AscError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(CompileMode::Memory),
            "file" => Ok(CompileMode::File),
            other => Err(AscError::Config(format!(
                "unknown compile mode `{}` (expected `memory` or `file`)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PluginOptions {
    /// Pattern with exactly one capture group; the capture is the path handed
    /// to the host resolver.
    #[serde(deserialize_with = "deserialize_regex")]
    pub matcher: Regex,
    pub compiler_options: CompilerOptions,
    /// Forwarded to the compiler as `--extension <value>`.
    pub file_extension: Option<String>,
    /// URL written into the binary's source map section. `[name]` is replaced
    /// with the map's file name. Setting it forces [`CompileMode::File`].
    #[serde(alias = "sourceMapURLPattern")]
    pub source_map_url_pattern: Option<String>,
    /// Logical folder the source map asset is emitted under.
    pub source_map_folder: Option<String>,
    pub use_as_bind: bool,
    pub as_bind_entry: PathBuf,
    pub mode: CompileMode,
    /// The `asc` executable used by the default compiler.
    pub compiler: PathBuf,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            matcher: default_matcher(),
            compiler_options: CompilerOptions::new(),
            file_extension: None,
            source_map_url_pattern: None,
            source_map_folder: None,
            use_as_bind: false,
            as_bind_entry: PathBuf::from(DEFAULT_AS_BIND_ENTRY),
            mode: CompileMode::default(),
            compiler: PathBuf::from("asc"),
        }
    }
}

impl PluginOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: PluginOptions =
            serde_json::from_str(json).map_err(|err| AscError::Config(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|err| AscError::io(path, err))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        validate_matcher(&self.matcher)
    }

    /// File mode is required whenever source maps are requested.
    pub fn effective_mode(&self) -> CompileMode {
        if self.source_map_url_pattern.is_some() {
            CompileMode::File
        } else {
            self.mode
        }
    }
}

pub(crate) fn default_matcher() -> Regex {
    Regex::new(DEFAULT_MATCHER).expect("default matcher is a valid regex")
}

pub(crate) fn validate_matcher(matcher: &Regex) -> Result<()> {
    // captures_len counts the implicit whole-match group
    let groups = matcher.captures_len() - 1;
    if groups != 1 {
        return Err(AscError::Config(format!(
            "matcher `{}` must have exactly one capture group, found {}",
            matcher.as_str(),
            groups
        )));
    }
    Ok(())
}

fn deserialize_regex<'de, D>(deserializer: D) -> std::result::Result<Regex, D::Error>
where
    D: Deserializer<'de>,
{
    let pattern = String::deserialize(deserializer)?;
    Regex::new(&pattern).map_err(serde::de::Error::custom)
}
