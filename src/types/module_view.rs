//! Borrowing views over a module's already-decoded sections.
//!
//! These are produced once by the binary-format front end and handed
//! to the validator by reference; the validator itself never owns a
//! whole module, only the slice of sections it needs to resolve an
//! index.

use alloc::vec::Vec;

use super::func_type::FunctionType;
use super::idx::TypeIdx;
use super::value::ValueType;

#[derive(Debug, Clone)]
pub struct GlobalDesc {
    pub value_type: ValueType,
    pub mutable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TypeSectionView {
    pub types: Vec<FunctionType>,
}

impl TypeSectionView {
    pub fn get(&self, idx: TypeIdx) -> Option<&FunctionType> {
        self.types.get(idx.as_usize())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportSectionView {
    pub functions: Vec<TypeIdx>,
    pub tables: Vec<()>,
    pub memories: Vec<()>,
    pub globals: Vec<GlobalDesc>,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionSectionView {
    pub type_indices: Vec<TypeIdx>,
}

#[derive(Debug, Clone, Default)]
pub struct TableSectionView {
    pub count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySectionView {
    pub count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct GlobalSectionView {
    pub globals: Vec<GlobalDesc>,
}

#[derive(Debug, Clone)]
pub struct CodeEntryView<'a> {
    pub locals: Vec<(u32, ValueType)>,
    pub code: &'a [u8],
}

#[derive(Debug, Clone, Default)]
pub struct CodeSectionView<'a> {
    pub entries: Vec<CodeEntryView<'a>>,
}

/// The full set of section views a function body validation pass
/// needs to resolve any index it encounters.
#[derive(Debug, Clone)]
pub struct ModuleView<'a> {
    pub types: &'a TypeSectionView,
    pub imports: &'a ImportSectionView,
    pub functions: &'a FunctionSectionView,
    pub tables: &'a TableSectionView,
    pub memories: &'a MemorySectionView,
    pub globals: &'a GlobalSectionView,
}

impl<'a> ModuleView<'a> {
    pub fn imported_function_count(&self) -> u32 {
        self.imports.functions.len() as u32
    }

    pub fn local_function_count(&self) -> u32 {
        self.functions.type_indices.len() as u32
    }

    pub fn total_function_count(&self) -> u32 {
        self.imported_function_count() + self.local_function_count()
    }

    /// Resolves a module-global function index to its signature,
    /// whether the function is imported or local.
    pub fn function_type(&self, function_index: u32) -> Option<&FunctionType> {
        let imported = self.imported_function_count();
        if function_index < imported {
            let type_idx = *self.imports.functions.get(function_index as usize)?;
            self.types.get(type_idx)
        } else {
            let local_idx = (function_index - imported) as usize;
            let type_idx = *self.functions.type_indices.get(local_idx)?;
            self.types.get(type_idx)
        }
    }

    pub fn total_table_count(&self) -> u32 {
        self.imports.tables.len() as u32 + self.tables.count
    }

    pub fn total_memory_count(&self) -> u32 {
        self.imports.memories.len() as u32 + self.memories.count
    }

    pub fn total_global_count(&self) -> u32 {
        self.imports.globals.len() as u32 + self.globals.globals.len() as u32
    }

    pub fn global_desc(&self, global_index: u32) -> Option<&GlobalDesc> {
        let imported = self.imports.globals.len() as u32;
        if global_index < imported {
            self.imports.globals.get(global_index as usize)
        } else {
            self.globals.globals.get((global_index - imported) as usize)
        }
    }
}
