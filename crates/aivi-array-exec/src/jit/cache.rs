use cranelift_codegen::ir::Type;
use cranelift_module::FuncId;
use rustc_hash::FxHashMap;

use crate::config::JitSettings;

use super::runtime_helpers::DeclaredHelpers;

/// Everything a body needs besides the module to emit its function.
#[derive(Debug, Clone, Copy)]
pub struct BuildIrSettings {
    pub jit: JitSettings,
    pub helpers: DeclaredHelpers,
    pub pointer_type: Type,
}

/// Functions already emitted into one module, by symbol name.
#[derive(Debug, Default)]
pub struct FunctionIrCache {
    functions: FxHashMap<String, FuncId>,
}

impl FunctionIrCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<FuncId> {
        self.functions.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: FuncId) {
        self.functions.insert(name.into(), id);
    }
}
