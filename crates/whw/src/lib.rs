//! whw: host tooling for random-access store modules.
//!
//! This crate binds a store module the way an embedder does: it reads the
//! module's surface (exports, imports, `__heap_base`), picks the minimal or
//! system-interface binding, lends linear memory, and drives the store
//! exports against the native `whw-runtime` engine.

pub mod backing;
pub mod config;
pub mod parser;
pub mod runner;
pub mod surface;
pub mod system;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use backing::FileBacking;
pub use config::{HostOptions, MAX_PAGES};
pub use runner::{lift_status, Host, SmokeReport};
pub use surface::{MemorySource, ModuleSurface};
pub use system::StdSystem;

use tracing::info;

/// Read a module file and resolve its store surface.
///
/// # Example
/// ```no_run
/// use whw::{inspect_file, HostOptions};
///
/// let surface = inspect_file("store.wasm".as_ref()).unwrap();
/// let mut options = HostOptions::default();
/// options.adopt(&surface);
/// ```
pub fn inspect_file(path: &std::path::Path) -> Result<ModuleSurface> {
    let wasm_bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let surface = ModuleSurface::from_wasm(&wasm_bytes)
        .with_context(|| format!("{} is not a store module", path.display()))?;
    info!(
        module = %path.display(),
        binding = ?surface.binding,
        heap_base = ?surface.heap_base,
        "resolved module surface"
    );
    Ok(surface)
}
