//! Shared scaffolding for building a minimal single-function module and
//! driving it through validation, translation, and execution.
//!
//! Every scenario here is phrased at the function-body level: a
//! `ModuleView` over hand-built section descriptors plus a raw
//! instruction byte stream, the same granularity `validate_code` and
//! `translate_function` operate at.

#![allow(dead_code)]

use wazm_core::*;

pub struct TestModule {
    pub types: TypeSectionView,
    pub imports: ImportSectionView,
    pub functions: FunctionSectionView,
    pub tables: TableSectionView,
    pub memories: MemorySectionView,
    pub globals: GlobalSectionView,
}

impl TestModule {
    pub fn new() -> Self {
        Self {
            types: TypeSectionView::default(),
            imports: ImportSectionView::default(),
            functions: FunctionSectionView::default(),
            tables: TableSectionView::default(),
            memories: MemorySectionView::default(),
            globals: GlobalSectionView::default(),
        }
    }

    pub fn with_memory(mut self) -> Self {
        self.memories.count = 1;
        self
    }

    pub fn with_table(mut self) -> Self {
        self.tables.count = 1;
        self
    }

    pub fn with_global(mut self, value_type: ValueType, mutable: bool) -> Self {
        self.globals.globals.push(GlobalDesc { value_type, mutable });
        self
    }

    /// Declares one local function with the given signature, returning
    /// its module-global function index.
    pub fn declare_function(&mut self, params: Vec<ValueType>, results: Vec<ValueType>) -> u32 {
        let type_idx = TypeIdx(self.types.types.len() as u32);
        self.types.types.push(FunctionType::new(params, results));
        self.functions.type_indices.push(type_idx);
        self.imports.functions.len() as u32 + self.functions.type_indices.len() as u32 - 1
    }

    pub fn view(&self) -> ModuleView<'_> {
        ModuleView {
            types: &self.types,
            imports: &self.imports,
            functions: &self.functions,
            tables: &self.tables,
            memories: &self.memories,
            globals: &self.globals,
        }
    }
}

/// Validates and translates `code` for the function most recently
/// declared via [`TestModule::declare_function`], using the
/// [`RegisterCached`] profile.
pub fn translate(module: &TestModule, function_index: u32, locals: &[(u32, ValueType)], code: &[u8]) -> Image<RegisterCached> {
    let validated = validate_code(module.view(), function_index, locals, code).expect("validation should succeed");
    let results = module.view().function_type(function_index).unwrap().results.len();
    translate_function::<RegisterCached>(&module.view(), &validated, code, results).expect("translation should succeed")
}

pub fn translate_memory_only(module: &TestModule, function_index: u32, locals: &[(u32, ValueType)], code: &[u8]) -> Image<MemoryOnly> {
    let validated = validate_code(module.view(), function_index, locals, code).expect("validation should succeed");
    let results = module.view().function_type(function_index).unwrap().results.len();
    translate_function::<MemoryOnly>(&module.view(), &validated, code, results).expect("translation should succeed")
}

/// Builds a one-function instance and runs it with `args`, returning
/// the results.
pub fn run<P: InterpreterProfile>(image: Image<P>, args: &[i32]) -> Result<Vec<i64>, TrapCode> {
    let mut instance = Instance::<P>::new();
    instance.functions.push(FuncInstance { image });
    let result_count = instance.functions[0].image.result_count;
    let args: Vec<UntypedValue> = args.iter().map(|&v| UntypedValue::from(v)).collect();
    let results = run_function(&mut instance, 0, &args, result_count)?;
    Ok(results.into_iter().map(|v| v.to_i64()).collect())
}

/// Same as [`run`] but the instance carries one zero-initialized
/// memory of `initial_pages`, so load/store scenarios have somewhere
/// to land.
pub fn run_with_memory<P: InterpreterProfile>(image: Image<P>, args: &[i32], initial_pages: u32) -> Result<Vec<i64>, TrapCode> {
    let mut instance = Instance::<P>::new();
    instance.memories.push(Memory::new(initial_pages, None));
    instance.functions.push(FuncInstance { image });
    let result_count = instance.functions[0].image.result_count;
    let args: Vec<UntypedValue> = args.iter().map(|&v| UntypedValue::from(v)).collect();
    let results = run_function(&mut instance, 0, &args, result_count)?;
    Ok(results.into_iter().map(|v| v.to_i64()).collect())
}
