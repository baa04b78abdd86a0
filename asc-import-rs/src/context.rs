//! The host bundler as seen from the plugin.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;

/// How an emitted asset is named in the final output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetName {
    /// A suggested name; the host may add a hash or otherwise rename it.
    Name(String),
    /// An exact logical path relative to the output directory.
    FileName(String),
}

impl AssetName {
    pub fn as_str(&self) -> &str {
        match self {
            AssetName::Name(name) | AssetName::FileName(name) => name,
        }
    }
}

/// A binary artifact handed over to the host for inclusion in the build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    pub name: AssetName,
    pub source: Vec<u8>,
}

/// Services the host bundler provides to the plugin during a build.
///
/// Build failures are reported by returning an error from the plugin hooks;
/// the host attributes it to the module being loaded.
pub trait PluginContext: Send + Sync {
    /// Resolves `specifier` relative to `importer` to an absolute path.
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        importer: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>>;

    /// Registers `path` as an input of the current build.
    fn add_watch_file(&self, path: &Path);

    /// Hands an asset to the host and returns its opaque reference id.
    fn emit_file(&self, asset: EmittedAsset) -> String;

    /// JavaScript expression evaluating to the final URL of an emitted asset.
    fn file_url(&self, reference_id: &str) -> String {
        format!("import.meta.ROLLUP_FILE_URL_{}", reference_id)
    }
}
