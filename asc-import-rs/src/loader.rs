//! Turns tagged ids into emitted binaries and wrapper modules.

use std::path::Path;

use log::info;

use crate::compiler::{render_url_pattern, CompileRequest, CompilerAdapter};
use crate::config::PluginOptions;
use crate::context::{AssetName, EmittedAsset, PluginContext};
use crate::error::Result;
use crate::polyfill::POLYFILL_ID;
use crate::resolver::TaggedId;

pub struct ModuleLoader {
    adapter: CompilerAdapter,
    options: PluginOptions,
}

impl ModuleLoader {
    pub fn new(adapter: CompilerAdapter, options: PluginOptions) -> Self {
        Self { adapter, options }
    }

    pub fn adapter(&self) -> &CompilerAdapter {
        &self.adapter
    }

    /// The compile request for a resolved source path.
    pub fn request_for(&self, source_path: &Path) -> CompileRequest {
        let mut request = CompileRequest::new(source_path);
        request.options = self.options.compiler_options.clone();
        request.file_extension = self.options.file_extension.clone();
        request.source_map_url_pattern = self.options.source_map_url_pattern.clone();
        if self.options.use_as_bind {
            request.as_bind_entry = Some(self.options.as_bind_entry.clone());
        }
        request
    }

    /// Compiles the source behind `id`, emits its assets and returns the
    /// wrapper module. Ids without the marker are declined with `Ok(None)`.
    ///
    /// On failure nothing is emitted.
    pub async fn load(&self, id: &str, ctx: &dyn PluginContext) -> Result<Option<String>> {
        let Some(tagged) = TaggedId::parse(id) else {
            return Ok(None);
        };
        let request = self.request_for(tagged.real_path());

        // A bad pattern is reported before spending time in the compiler
        if let Some(pattern) = &request.source_map_url_pattern {
            render_url_pattern(pattern, &request.source_map_file_name())?;
        }

        let output = self
            .adapter
            .compile(&request, self.options.effective_mode())
            .await?;

        let binary_name = request.binary_file_name();
        let binary_len = output.binary.len();
        let reference_id = ctx.emit_file(EmittedAsset {
            name: AssetName::Name(binary_name.clone()),
            source: output.binary,
        });
        info!("Emitted {} ({} bytes)", binary_name, binary_len);

        if let Some(source_map) = output.source_map {
            let file_name = source_map_asset_path(
                self.options.source_map_folder.as_deref(),
                &request.source_map_file_name(),
            );
            ctx.emit_file(EmittedAsset {
                name: AssetName::FileName(file_name.clone()),
                source: source_map,
            });
            info!("Emitted {}", file_name);
        }

        Ok(Some(synthesize_module(&ctx.file_url(&reference_id))))
    }
}

/// Logical output path of a source map asset.
pub fn source_map_asset_path(folder: Option<&str>, map_file_name: &str) -> String {
    match folder.map(|folder| folder.trim_end_matches('/')) {
        Some(folder) if !folder.is_empty() => format!("{}/{}", folder, map_file_name),
        _ => map_file_name.to_string(),
    }
}

/// Source of the wrapper module for a binary whose URL is `url_expression`.
///
/// The promises are built by immediately invoked closures marked pure, so an
/// unused export costs neither a fetch nor a compile once tree-shaken.
pub fn synthesize_module(url_expression: &str) -> String {
    // A JSON string literal is a valid JavaScript string literal
    let polyfill = serde_json::Value::from(POLYFILL_ID).to_string();
    format!(
        r#"import {{ compileStreaming }} from {polyfill};
const wasmUrl = {url_expression};
const modulePromise = /*@__PURE__*/ (() => compileStreaming(fetch(wasmUrl)))();
const instancePromise = /*@__PURE__*/ (() =>
  modulePromise.then((module) => WebAssembly.instantiate(module, {{}})))();
export default wasmUrl;
export {{ wasmUrl, modulePromise, instancePromise }};
"#,
        polyfill = polyfill,
        url_expression = url_expression,
    )
}
