//! Store module surface parser.
//!
//! Wraps the `wasmparser` crate to extract what a host needs before it can
//! bind a compiled store module: where linear memory comes from, which
//! system-interface functions are imported, the `__heap_base` global, and
//! the signatures of the store exports. Function bodies are skipped.

use anyhow::{Context, Result};
use wasmparser::{ExternalKind, FuncType, Parser, Payload, TypeRef, ValType};

/// Memory limits declared by the module (pages of 64 KiB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub initial_pages: u32,
    pub maximum_pages: Option<u32>,
}

/// An import from the module.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// The import module name (e.g., "env").
    pub module_name: String,
    /// The import field name (e.g., "memory").
    pub name: String,
    pub kind: ImportKind,
}

/// Kind of import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// Imported function (index into the type section).
    Function(u32),
    Global,
    Memory(MemoryLimits),
    Table,
}

/// Kind of export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

/// An export from the module.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExportKind,
    /// Index into the corresponding index space.
    pub index: u32,
}

/// Everything the binder reads from a module binary.
#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    /// Type section: function signatures.
    pub types: Vec<FuncType>,
    /// Type index of every function, imported functions first.
    pub func_type_indices: Vec<u32>,
    /// Memory defined by the module itself, if any.
    pub memory: Option<MemoryLimits>,
    /// `i32.const` initialisers of locally defined globals (`None` for
    /// other value types), in global index order after imported globals.
    pub global_inits: Vec<Option<i32>>,
    pub num_imported_globals: u32,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    /// Index of the start function, if the module declares one.
    pub start: Option<u32>,
}

impl ParsedModule {
    /// Signature of the function at `func_index` in the function index space.
    pub fn func_type(&self, func_index: u32) -> Option<&FuncType> {
        let type_idx = *self.func_type_indices.get(func_index as usize)?;
        self.types.get(type_idx as usize)
    }

    /// Constant `i32` value of the global at `global_index`, if it is a
    /// locally defined `i32.const` global.
    pub fn global_i32(&self, global_index: u32) -> Option<i32> {
        let local = global_index.checked_sub(self.num_imported_globals)?;
        self.global_inits.get(local as usize).copied().flatten()
    }
}

/// Evaluate a global initialiser. Only `i32.const` is interesting here.
fn eval_i32_const(const_expr: wasmparser::ConstExpr) -> Result<Option<i32>> {
    let mut reader = const_expr.get_operators_reader();
    let op = reader.read().context("reading const expr operator")?;
    match op {
        wasmparser::Operator::I32Const { value } => Ok(Some(value)),
        _ => Ok(None),
    }
}

/// Parse a WebAssembly binary into the binder's view of it.
pub fn parse_wasm(wasm_bytes: &[u8]) -> Result<ParsedModule> {
    let parser = Parser::new(0);
    let mut module = ParsedModule::default();

    for payload in parser.parse_all(wasm_bytes) {
        let payload = payload.context("parsing wasm payload")?;

        match payload {
            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.context("reading rec group")?;
                    for sub_type in rec_group.types() {
                        // Only function types matter for export signatures.
                        if let wasmparser::CompositeInnerType::Func(func_ty) =
                            &sub_type.composite_type.inner
                        {
                            module.types.push(func_ty.clone());
                        }
                    }
                }
            }

            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading import")?;
                    let kind = match import.ty {
                        TypeRef::Func(type_idx) => {
                            module.func_type_indices.push(type_idx);
                            ImportKind::Function(type_idx)
                        }
                        TypeRef::Global(_) => {
                            module.num_imported_globals += 1;
                            ImportKind::Global
                        }
                        TypeRef::Memory(mem_ty) => ImportKind::Memory(MemoryLimits {
                            initial_pages: mem_ty.initial as u32,
                            maximum_pages: mem_ty.maximum.map(|m| m as u32),
                        }),
                        TypeRef::Table(_) => ImportKind::Table,
                        _ => continue,
                    };
                    module.imports.push(ImportInfo {
                        module_name: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                    });
                }
            }

            Payload::FunctionSection(reader) => {
                for func_type_idx in reader {
                    let func_type_idx = func_type_idx.context("reading function type index")?;
                    module.func_type_indices.push(func_type_idx);
                }
            }

            Payload::MemorySection(reader) => {
                // At most one memory (index 0) is relevant.
                if let Some(mem) = reader.into_iter().next() {
                    let memory_type = mem.context("reading memory type")?;
                    module.memory = Some(MemoryLimits {
                        initial_pages: memory_type.initial as u32,
                        maximum_pages: memory_type.maximum.map(|m| m as u32),
                    });
                }
            }

            Payload::GlobalSection(reader) => {
                for global in reader {
                    let global = global.context("reading global")?;
                    let init = if global.ty.content_type == ValType::I32 {
                        eval_i32_const(global.init_expr)?
                    } else {
                        None
                    };
                    module.global_inits.push(init);
                }
            }

            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading export")?;
                    let kind = match export.kind {
                        ExternalKind::Func => ExportKind::Func,
                        ExternalKind::Table => ExportKind::Table,
                        ExternalKind::Memory => ExportKind::Memory,
                        ExternalKind::Global => ExportKind::Global,
                        ExternalKind::Tag => continue,
                    };
                    module.exports.push(ExportInfo {
                        name: export.name.to_string(),
                        kind,
                        index: export.index,
                    });
                }
            }

            Payload::StartSection { func, .. } => {
                module.start = Some(func);
            }

            _ => {}
        }
    }

    Ok(module)
}
