use log::debug;

use crate::compiler::CompilerAdapter;
use crate::config::PluginOptions;
use crate::context::PluginContext;
use crate::error::Result;
use crate::loader::ModuleLoader;
use crate::polyfill::{POLYFILL_ID, POLYFILL_SOURCE};
use crate::resolver::IdResolver;

/// The bundler plugin: the `resolve_id` and `load` hooks a host calls for
/// every import it encounters.
///
/// # Examples
///
/// ```no_run
/// use asc_import_rs::{AscPlugin, PluginOptions};
///
/// let mut options = PluginOptions::default();
/// options.compiler_options.insert("optimizeLevel", 3);
/// options.compiler_options.insert("runtime", "none");
/// let plugin = AscPlugin::new(options).expect("valid options");
/// assert_eq!(plugin.name(), "assemblyscript");
/// ```
pub struct AscPlugin {
    resolver: IdResolver,
    loader: ModuleLoader,
}

impl AscPlugin {
    /// Plugin driving the `asc` executable named in `options.compiler`.
    pub fn new(options: PluginOptions) -> Result<Self> {
        let adapter = CompilerAdapter::asc(options.compiler.clone());
        Self::with_compiler(options, adapter)
    }

    pub fn with_compiler(options: PluginOptions, adapter: CompilerAdapter) -> Result<Self> {
        let resolver = IdResolver::new(options.matcher.clone())?;
        Ok(Self {
            resolver,
            loader: ModuleLoader::new(adapter, options),
        })
    }

    pub fn name(&self) -> &'static str {
        "assemblyscript"
    }

    pub fn resolver(&self) -> &IdResolver {
        &self.resolver
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        ctx: &dyn PluginContext,
    ) -> Result<Option<String>> {
        if specifier == POLYFILL_ID {
            return Ok(Some(POLYFILL_ID.to_string()));
        }
        let resolved = self.resolver.resolve_id(specifier, importer, ctx).await?;
        Ok(resolved.map(|id| id.to_string()))
    }

    pub async fn load(&self, id: &str, ctx: &dyn PluginContext) -> Result<Option<String>> {
        if id == POLYFILL_ID {
            debug!("Loading {}", POLYFILL_ID);
            return Ok(Some(POLYFILL_SOURCE.to_string()));
        }
        self.loader.load(id, ctx).await
    }
}
