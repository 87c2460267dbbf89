//! Host configuration.

use std::path::PathBuf;

use whw_runtime::BindingMode;

use crate::surface::ModuleSurface;

/// Largest linear memory the host can lend, in 64 KiB pages (16 MiB).
pub const MAX_PAGES: usize = 256;

/// Conventional `__heap_base` of a module with a 64 KiB stack and 1 KiB of
/// static data.
pub const DEFAULT_HEAP_BASE: u32 = 66_560;

/// How the host embeds a store instance.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Active pages of the lent linear memory.
    pub memory_pages: usize,
    /// Address of the first store header.
    pub heap_base: u32,
    /// Tail length `L` passed on every call.
    pub tail_len: u32,
    /// Extent window requested from `init`; 0 means tail-only.
    pub extent_capacity: u32,
    pub binding: BindingMode,
    /// Keep the extended store in this file instead of memory.
    pub backing_file: Option<PathBuf>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            memory_pages: MAX_PAGES,
            heap_base: DEFAULT_HEAP_BASE,
            tail_len: 32,
            extent_capacity: 0,
            binding: BindingMode::Minimal,
            backing_file: None,
        }
    }
}

impl HostOptions {
    /// Take heap base, binding and memory size from a resolved module.
    pub fn adopt(&mut self, surface: &ModuleSurface) {
        if let Some(heap_base) = surface.heap_base {
            self.heap_base = heap_base;
        }
        self.binding = surface.binding;
        let initial = surface.memory.limits().initial_pages as usize;
        self.memory_pages = self.memory_pages.max(initial).min(MAX_PAGES);
    }
}
