mod branch_offset;
mod error;
mod func_type;
mod host_error;
mod idx;
mod module_view;
mod value;
pub mod wasm_op;

pub use branch_offset::BranchOffset;
pub use error::{TrapCode, ValidationError, ValidationFailure, WazmError};
pub use func_type::{BlockType, FunctionType};
pub use host_error::HostError;
pub use idx::{FuncIdx, GlobalIdx, LabelIdx, LocalIdx, MemIdx, TableIdx, TypeIdx};
pub use module_view::{
    CodeEntryView, CodeSectionView, FunctionSectionView, GlobalDesc, GlobalSectionView,
    ImportSectionView, MemorySectionView, ModuleView, TableSectionView, TypeSectionView,
};
pub use value::ValueType;
pub use wasm_op::{mem_load_info, mem_store_info, mnemonic, numeric_sig, MemOpInfo, NumericSig};

/// Wasm's fixed page size: 64 KiB.
pub const BYTES_PER_MEMORY_PAGE: u32 = 65536;

pub const DEFAULT_MAX_VALUE_STACK_HEIGHT: usize = 4096;
