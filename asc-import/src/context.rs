//! Filesystem host for running the plugin outside a bundler.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use asc_import_rs::{AssetName, EmittedAsset, PluginContext};
use futures::future::BoxFuture;
use log::info;

struct PendingAsset {
    file_name: String,
    source: Vec<u8>,
}

/// Resolves against the importer's directory and collects emitted assets
/// until [`FsContext::write_assets`] puts them under the output directory.
pub struct FsContext {
    out_dir: PathBuf,
    watched: Mutex<Vec<PathBuf>>,
    assets: Mutex<Vec<PendingAsset>>,
}

impl FsContext {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            watched: Mutex::new(Vec::new()),
            assets: Mutex::new(Vec::new()),
        }
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Output-relative file names of the emitted assets, in emission order.
    pub fn asset_file_names(&self) -> Vec<String> {
        self.lock_assets()
            .iter()
            .map(|asset| asset.file_name.clone())
            .collect()
    }

    /// Writes every emitted asset and returns the written paths.
    pub async fn write_assets(&self) -> anyhow::Result<Vec<PathBuf>> {
        let pending: Vec<(PathBuf, Vec<u8>)> = self
            .lock_assets()
            .iter()
            .map(|asset| (self.out_dir.join(&asset.file_name), asset.source.clone()))
            .collect();

        let mut written = Vec::with_capacity(pending.len());
        for (path, source) in pending {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(&path, &source)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} ({} bytes)", path.display(), source.len());
            written.push(path);
        }
        Ok(written)
    }

    fn lock_assets(&self) -> std::sync::MutexGuard<'_, Vec<PendingAsset>> {
        self.assets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `name` if unused, otherwise `name` with the lowest free numeric suffix
/// before its extension (`a.wasm`, `a-1.wasm`, `a-2.wasm`, ...).
fn unique_file_name(name: &str, taken: &HashSet<&str>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    (1..)
        .map(|n| format!("{}-{}{}", stem, n, extension))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| name.to_string())
}

impl PluginContext for FsContext {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        importer: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>> {
        Box::pin(async move {
            let base = importer
                .and_then(|importer| Path::new(importer).parent())
                .unwrap_or_else(|| Path::new(""));
            let candidate = base.join(specifier);
            tokio::fs::canonicalize(&candidate)
                .await
                .with_context(|| format!("Cannot find {}", candidate.display()))
        })
    }

    fn add_watch_file(&self, path: &Path) {
        self.watched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.to_path_buf());
    }

    fn emit_file(&self, asset: EmittedAsset) -> String {
        let mut assets = self.lock_assets();
        let file_name = match &asset.name {
            AssetName::Name(name) => {
                let taken: HashSet<&str> =
                    assets.iter().map(|asset| asset.file_name.as_str()).collect();
                unique_file_name(name, &taken)
            }
            AssetName::FileName(file_name) => file_name.clone(),
        };
        assets.push(PendingAsset {
            file_name,
            source: asset.source,
        });
        (assets.len() - 1).to_string()
    }

    fn file_url(&self, reference_id: &str) -> String {
        let assets = self.lock_assets();
        let file_name = reference_id
            .parse::<usize>()
            .ok()
            .and_then(|index| assets.get(index))
            .map(|asset| asset.file_name.as_str())
            .unwrap_or(reference_id);
        format!(
            "new URL({}, import.meta.url).href",
            serde_json::Value::from(file_name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: AssetName) -> EmittedAsset {
        EmittedAsset {
            name,
            source: b"\0asm\x01\0\0\0".to_vec(),
        }
    }

    #[test]
    fn test_name_collisions_get_numeric_suffix() {
        let ctx = FsContext::new("out");
        ctx.emit_file(asset(AssetName::Name("math.wasm".to_string())));
        ctx.emit_file(asset(AssetName::Name("math.wasm".to_string())));
        ctx.emit_file(asset(AssetName::Name("math.wasm".to_string())));
        ctx.emit_file(asset(AssetName::FileName("maps/math.wasm.map".to_string())));
        assert_eq!(
            ctx.asset_file_names(),
            vec!["math.wasm", "math-1.wasm", "math-2.wasm", "maps/math.wasm.map"]
        );
    }

    #[test]
    fn test_file_url_is_relative_to_module() {
        let ctx = FsContext::new("out");
        ctx.emit_file(asset(AssetName::Name("a.wasm".to_string())));
        let reference = ctx.emit_file(asset(AssetName::Name("a.wasm".to_string())));
        assert_eq!(
            ctx.file_url(&reference),
            r#"new URL("a-1.wasm", import.meta.url).href"#
        );
    }

    #[tokio::test]
    async fn test_resolve_relative_to_importer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "").unwrap();
        let importer = dir.path().join("main.js").to_string_lossy().into_owned();
        let ctx = FsContext::new(dir.path());

        let resolved = ctx.resolve("./a.ts", Some(&importer)).await.unwrap();
        assert_eq!(resolved, dir.path().join("a.ts").canonicalize().unwrap());
        let err = ctx.resolve("./b.ts", Some(&importer)).await.unwrap_err();
        assert!(err.to_string().starts_with("Cannot find"));
    }

    #[tokio::test]
    async fn test_write_assets_creates_folders() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = FsContext::new(dir.path());
        ctx.emit_file(asset(AssetName::Name("a.wasm".to_string())));
        ctx.emit_file(asset(AssetName::FileName("maps/a.wasm.map".to_string())));

        let written = ctx.write_assets().await.unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("maps/a.wasm.map").exists());
        assert_eq!(
            std::fs::read(dir.path().join("a.wasm")).unwrap(),
            b"\0asm\x01\0\0\0"
        );
    }
}
