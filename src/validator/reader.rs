//! Thin cursor over the function body bytes.
//!
//! Delegates LEB128 and immediate decoding to `wasmparser`'s
//! `BinaryReader`; everything above this layer (the opcode dispatch,
//! the type-state machine) is ours.

use wasmparser::BinaryReader;

use crate::types::{ValidationError, ValidationFailure};

pub struct CodeReader<'a> {
    inner: BinaryReader<'a>,
}

impl<'a> CodeReader<'a> {
    pub fn new(code: &'a [u8], offset: usize) -> Self {
        Self { inner: BinaryReader::new_with_offset(code, offset) }
    }

    pub fn position(&self) -> usize {
        self.inner.current_position()
    }

    pub fn eof(&self) -> bool {
        self.inner.bytes_remaining() == 0
    }

    pub fn read_opcode(&mut self) -> Result<u8, ValidationFailure> {
        let at = self.position();
        self.inner
            .read_u8()
            .map_err(|_| ValidationFailure::new(at, ValidationError::IllegalOpbase { opcode_byte: 0 }))
    }

    pub fn read_u32_leb(&mut self, err: impl Fn() -> ValidationError) -> Result<u32, ValidationFailure> {
        let at = self.position();
        self.inner.read_var_u32().map_err(|_| ValidationFailure::new(at, err()))
    }

    pub fn read_i32_leb(&mut self, err: impl Fn() -> ValidationError) -> Result<i32, ValidationFailure> {
        let at = self.position();
        self.inner.read_var_i32().map_err(|_| ValidationFailure::new(at, err()))
    }

    pub fn read_i64_leb(&mut self, err: impl Fn() -> ValidationError) -> Result<i64, ValidationFailure> {
        let at = self.position();
        self.inner.read_var_i64().map_err(|_| ValidationFailure::new(at, err()))
    }

    pub fn read_f32_bits(&mut self, err: impl Fn() -> ValidationError) -> Result<u32, ValidationFailure> {
        let at = self.position();
        self.inner.read_f32().map(|v| v.bits()).map_err(|_| ValidationFailure::new(at, err()))
    }

    pub fn read_f64_bits(&mut self, err: impl Fn() -> ValidationError) -> Result<u64, ValidationFailure> {
        let at = self.position();
        self.inner.read_f64().map(|v| v.bits()).map_err(|_| ValidationFailure::new(at, err()))
    }

    pub fn read_byte(&mut self, err: impl Fn() -> ValidationError) -> Result<u8, ValidationFailure> {
        let at = self.position();
        self.inner.read_u8().map_err(|_| ValidationFailure::new(at, err()))
    }

    pub fn read_vec_len(&mut self, err: impl Fn() -> ValidationError) -> Result<u32, ValidationFailure> {
        self.read_u32_leb(err)
    }
}
