//! Recognizes `asc:` specifiers and turns them into tagged ids.

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;

use crate::config::{validate_matcher, MARKER};
use crate::context::PluginContext;
use crate::error::{AscError, Result};

/// A resolved source path carrying the loader's marker.
///
/// Only produced after the path was resolved by the host and registered as a
/// watch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedId {
    real_path: PathBuf,
}

impl TaggedId {
    /// Parses a module id, returning `None` if it does not carry the marker.
    pub fn parse(id: &str) -> Option<Self> {
        id.strip_prefix(MARKER).map(|path| Self {
            real_path: PathBuf::from(path),
        })
    }

    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    pub fn into_real_path(self) -> PathBuf {
        self.real_path
    }
}

impl fmt::Display for TaggedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MARKER, self.real_path.display())
    }
}

#[derive(Debug, Clone)]
pub struct IdResolver {
    matcher: Regex,
}

impl IdResolver {
    pub fn new(matcher: Regex) -> Result<Self> {
        validate_matcher(&matcher)?;
        Ok(Self { matcher })
    }

    /// The inner path of `specifier`, if it matches.
    pub fn match_specifier<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        self.matcher
            .captures(specifier)
            .and_then(|caps| caps.get(1))
            .map(|inner| inner.as_str())
    }

    /// Resolves a tagged specifier. Returns `Ok(None)` for specifiers this
    /// plugin does not handle.
    pub async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        ctx: &dyn PluginContext,
    ) -> Result<Option<TaggedId>> {
        let Some(inner) = self.match_specifier(specifier) else {
            return Ok(None);
        };

        let real_path = ctx
            .resolve(inner, importer)
            .await
            .map_err(|source| AscError::Resolve {
                specifier: specifier.to_string(),
                source,
            })?;
        // Ids are strings; a path that does not survive the round trip would
        // load a different file.
        if real_path.to_str().is_none() {
            return Err(AscError::Resolve {
                specifier: specifier.to_string(),
                source: anyhow::anyhow!(
                    "resolved path {} is not valid UTF-8",
                    real_path.display()
                ),
            });
        }
        ctx.add_watch_file(&real_path);
        debug!("Resolved {} to {}", specifier, real_path.display());

        Ok(Some(TaggedId { real_path }))
    }
}

impl Default for IdResolver {
    fn default() -> Self {
        Self {
            matcher: crate::config::default_matcher(),
        }
    }
}
