//! Export/import surface of a store module and the binding it requires.
//!
//! Export names are compared in snake case (via `heck`), so a toolchain
//! that mangles `sizeof_whw_RandomAccess` into `sizeof_whw_random_access`
//! still binds.

use anyhow::{bail, Context, Result};
use heck::ToSnakeCase;
use wasmparser::ValType;

use crate::parser::{parse_wasm, ExportKind, ImportKind, MemoryLimits, ParsedModule};
use whw_runtime::BindingMode;

pub const SIZEOF_EXPORT: &str = "sizeof_whw_RandomAccess";
pub const WRITE_EXPORT: &str = "whw_write";
pub const READ_EXPORT: &str = "whw_read";
pub const INIT_EXPORT: &str = "whw_init";
pub const HEAP_BASE_EXPORT: &str = "__heap_base";
pub const INITIALIZE_EXPORT: &str = "_initialize";

/// Import module of the system interface.
pub const SYSTEM_MODULE: &str = "wasi_snapshot_preview1";

/// Where the module's linear memory comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemorySource {
    /// The host supplies it (`(import "env" "memory" ...)`).
    Imported {
        module_name: String,
        name: String,
        limits: MemoryLimits,
    },
    /// The module defines and exports it.
    Exported { name: String, limits: MemoryLimits },
}

impl MemorySource {
    pub fn limits(&self) -> MemoryLimits {
        match self {
            MemorySource::Imported { limits, .. } | MemorySource::Exported { limits, .. } => {
                *limits
            }
        }
    }
}

/// Resolved symbols of a store module.
#[derive(Debug, Clone)]
pub struct ModuleSurface {
    /// Actual export names, as spelled by the module.
    pub sizeof_export: String,
    pub write_export: String,
    pub read_export: String,
    pub init_export: Option<String>,
    /// Value of `__heap_base`, when exported as a constant global.
    pub heap_base: Option<u32>,
    pub memory: MemorySource,
    pub binding: BindingMode,
    /// Functions imported from the system interface.
    pub system_imports: Vec<String>,
    /// The module exports a reactor initialiser the host must call.
    pub has_initialize: bool,
}

impl ModuleSurface {
    /// Parse `wasm_bytes` and resolve the store surface.
    pub fn from_wasm(wasm_bytes: &[u8]) -> Result<Self> {
        let parsed = parse_wasm(wasm_bytes).context("failed to parse WebAssembly module")?;
        Self::resolve(&parsed)
    }

    /// Resolve the store surface of an already parsed module.
    pub fn resolve(module: &ParsedModule) -> Result<Self> {
        let sizeof_export = require_func(module, SIZEOF_EXPORT, 0)?;
        let write_export = require_func(module, WRITE_EXPORT, 5)?;
        let read_export = require_func(module, READ_EXPORT, 5)?;
        let init_export = match find_export(module, INIT_EXPORT, ExportKind::Func) {
            Some(_) => Some(require_func(module, INIT_EXPORT, 2)?),
            None => None,
        };

        let heap_base = find_export(module, HEAP_BASE_EXPORT, ExportKind::Global)
            .and_then(|export| module.global_i32(export.index))
            .map(|value| value as u32);

        let memory = resolve_memory(module)?;

        let system_imports: Vec<String> = module
            .imports
            .iter()
            .filter(|imp| imp.module_name == SYSTEM_MODULE)
            .map(|imp| imp.name.clone())
            .collect();
        let binding = if system_imports.is_empty() {
            BindingMode::Minimal
        } else {
            BindingMode::SystemInterface
        };

        Ok(Self {
            sizeof_export,
            write_export,
            read_export,
            init_export,
            heap_base,
            memory,
            binding,
            system_imports,
            has_initialize: find_export(module, INITIALIZE_EXPORT, ExportKind::Func).is_some(),
        })
    }
}

/// Find an export by name, exact spelling first, then by snake-case form.
fn find_export<'a>(
    module: &'a ParsedModule,
    name: &str,
    kind: ExportKind,
) -> Option<&'a crate::parser::ExportInfo> {
    let candidates = || module.exports.iter().filter(move |e| e.kind == kind);
    candidates().find(|e| e.name == name).or_else(|| {
        let wanted = name.to_snake_case();
        candidates().find(|e| e.name.to_snake_case() == wanted)
    })
}

/// Resolve an exported function taking `arity` i32 parameters and
/// returning one i32.
fn require_func(module: &ParsedModule, name: &str, arity: usize) -> Result<String> {
    let export = find_export(module, name, ExportKind::Func)
        .with_context(|| format!("module does not export `{name}`"))?;
    let ty = module
        .func_type(export.index)
        .with_context(|| format!("export `{}` has no function type", export.name))?;
    let params_ok = ty.params().len() == arity && ty.params().iter().all(|p| *p == ValType::I32);
    if !params_ok || ty.results() != [ValType::I32] {
        bail!(
            "export `{}` has signature {:?} -> {:?}, expected {} i32 parameter(s) -> i32",
            export.name,
            ty.params(),
            ty.results(),
            arity
        );
    }
    Ok(export.name.clone())
}

fn resolve_memory(module: &ParsedModule) -> Result<MemorySource> {
    let imported = module.imports.iter().find_map(|imp| match &imp.kind {
        ImportKind::Memory(limits) => Some(MemorySource::Imported {
            module_name: imp.module_name.clone(),
            name: imp.name.clone(),
            limits: *limits,
        }),
        _ => None,
    });
    if let Some(source) = imported {
        return Ok(source);
    }

    match (module.memory, module.exports.iter().find(|e| e.kind == ExportKind::Memory)) {
        (Some(limits), Some(export)) => Ok(MemorySource::Exported {
            name: export.name.clone(),
            limits,
        }),
        (Some(_), None) => bail!("module defines a memory but does not export it"),
        (None, _) => bail!("module neither imports nor defines a linear memory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE_FUNCS: &str = r#"
        (func (export "sizeof_whw_RandomAccess") (result i32) i32.const 40)
        (func (export "whw_write") (param i32 i32 i32 i32 i32) (result i32) local.get 4)
        (func (export "whw_read") (param i32 i32 i32 i32 i32) (result i32) local.get 4)
    "#;

    fn module(body: &str) -> Vec<u8> {
        wat::parse_str(format!("(module {body})")).unwrap()
    }

    #[test]
    fn minimal_module_binds() {
        let wasm = module(&format!(
            r#"(import "env" "memory" (memory 256 256))
               (global (export "__heap_base") i32 (i32.const 66560))
               {STORE_FUNCS}"#
        ));
        let surface = ModuleSurface::from_wasm(&wasm).unwrap();
        assert_eq!(surface.binding, BindingMode::Minimal);
        assert_eq!(surface.heap_base, Some(66560));
        assert_eq!(surface.sizeof_export, SIZEOF_EXPORT);
        assert!(surface.init_export.is_none());
        assert!(matches!(surface.memory, MemorySource::Imported { ref module_name, .. } if module_name == "env"));
    }

    #[test]
    fn system_imports_select_system_binding() {
        let wasm = module(&format!(
            r#"(import "wasi_snapshot_preview1" "args_sizes_get" (func (param i32 i32) (result i32)))
               (import "wasi_snapshot_preview1" "fd_write" (func (param i32 i32 i32 i32) (result i32)))
               (memory (export "memory") 2)
               {STORE_FUNCS}"#
        ));
        let surface = ModuleSurface::from_wasm(&wasm).unwrap();
        assert_eq!(surface.binding, BindingMode::SystemInterface);
        assert_eq!(surface.system_imports, vec!["args_sizes_get", "fd_write"]);
        assert_eq!(surface.memory.limits().initial_pages, 2);
    }

    #[test]
    fn snake_case_exports_resolve() {
        let wasm = module(
            r#"(memory (export "memory") 1)
               (func (export "sizeof_whw_random_access") (result i32) i32.const 40)
               (func (export "whw_write") (param i32 i32 i32 i32 i32) (result i32) local.get 4)
               (func (export "whw_read") (param i32 i32 i32 i32 i32) (result i32) local.get 4)"#,
        );
        let surface = ModuleSurface::from_wasm(&wasm).unwrap();
        assert_eq!(surface.sizeof_export, "sizeof_whw_random_access");
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let wasm = module(
            r#"(memory (export "memory") 1)
               (func (export "sizeof_whw_RandomAccess") (result i32) i32.const 40)
               (func (export "whw_write") (param i32 i32 i32 i32) (result i32) local.get 3)
               (func (export "whw_read") (param i32 i32 i32 i32 i32) (result i32) local.get 4)"#,
        );
        let err = ModuleSurface::from_wasm(&wasm).unwrap_err();
        assert!(format!("{err:#}").contains("whw_write"));
    }

    #[test]
    fn missing_export_is_rejected() {
        let wasm = module(
            r#"(memory (export "memory") 1)
               (func (export "sizeof_whw_RandomAccess") (result i32) i32.const 40)"#,
        );
        let err = ModuleSurface::from_wasm(&wasm).unwrap_err();
        assert!(format!("{err:#}").contains("whw_write"));
    }

    #[test]
    fn init_export_signature_is_checked() {
        let wasm = module(&format!(
            r#"(memory (export "memory") 1)
               (func (export "whw_init") (param i32) (result i32) local.get 0)
               {STORE_FUNCS}"#
        ));
        assert!(ModuleSurface::from_wasm(&wasm).is_err());
    }

    #[test]
    fn memory_is_required() {
        let wasm = module(STORE_FUNCS);
        let err = ModuleSurface::from_wasm(&wasm).unwrap_err();
        assert!(format!("{err:#}").contains("linear memory"));
    }
}
