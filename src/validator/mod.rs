//! The streaming Wasm 1.0 function-body validator.
//!
//! Walks the code bytes of one function exactly once, maintaining an
//! operand stack of type tags and a control stack of block frames,
//! with the polymorphic-stack relaxation applied after any
//! unconditional control transfer.

mod frame;
mod func_validator;
mod reader;

pub use frame::{ControlFrame, FrameKind};
pub use func_validator::{validate_code, ValidatedFunction};
pub(crate) use reader::CodeReader;
