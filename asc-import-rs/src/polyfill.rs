//! The `compileStreaming` helper module.
//!
//! Generated wrapper modules import `compileStreaming` from [`POLYFILL_ID`].
//! It uses `WebAssembly.compileStreaming` when the host has it and otherwise
//! buffers the whole response before compiling. [`compile_streaming`] is the
//! same logic for Rust hosts that execute emitted binaries themselves.

use std::future::Future;
use std::pin::Pin;

use futures::future::BoxFuture;
use tokio::io::AsyncRead;

use crate::collector::collect;

/// Module id of the helper. Resolves to itself.
pub const POLYFILL_ID: &str = "__asc-import_compileStreaming";

/// Source text of the helper module, returned verbatim on every load.
pub const POLYFILL_SOURCE: &str = r#"export async function compileStreaming(respP) {
  if ("compileStreaming" in WebAssembly) {
    return WebAssembly.compileStreaming(respP);
  }
  return respP
    .then((resp) => resp.arrayBuffer())
    .then((buffer) => WebAssembly.compile(buffer));
}
"#;

/// Response body handed to an engine's streaming compile.
pub type Body<'a> = Pin<Box<dyn AsyncRead + Send + 'a>>;

/// A WebAssembly engine able to compile binaries into modules.
pub trait WasmEngine: Sync {
    type Module: Send;

    /// Whether the engine compiles directly from a stream.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Compiles from a response body as it arrives.
    fn compile_streaming<'a>(&'a self, body: Body<'a>) -> BoxFuture<'a, anyhow::Result<Self::Module>> {
        Box::pin(async move {
            let bytes = collect(body).await?;
            self.compile(&bytes)
        })
    }

    fn compile(&self, bytes: &[u8]) -> anyhow::Result<Self::Module>;
}

/// Compiles a pending response into a module, streaming when the engine
/// supports it and buffering the full body otherwise.
///
/// Only failures of the response itself or of compilation are returned.
pub async fn compile_streaming<'a, E, F, R>(engine: &'a E, response: F) -> anyhow::Result<E::Module>
where
    E: WasmEngine,
    F: Future<Output = anyhow::Result<R>>,
    R: AsyncRead + Send + 'a,
{
    let body: Body<'a> = Box::pin(response.await?);
    if engine.supports_streaming() {
        return engine.compile_streaming(body).await;
    }
    let bytes = collect(body).await?;
    engine.compile(&bytes)
}
