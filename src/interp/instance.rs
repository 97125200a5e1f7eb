use alloc::vec;
use alloc::vec::Vec;

use crate::types::{TrapCode, BYTES_PER_MEMORY_PAGE};

use super::untyped_value::UntypedValue;

/// A single linear memory. Page-granular growth, matching Wasm's
/// 64 KiB page size.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
    max_pages: Option<u32>,
}

impl Memory {
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Self {
        Self { bytes: vec![0u8; initial_pages as usize * BYTES_PER_MEMORY_PAGE as usize], max_pages }
    }

    pub fn current_pages(&self) -> u32 {
        (self.bytes.len() / BYTES_PER_MEMORY_PAGE as usize) as u32
    }

    pub fn grow(&mut self, delta_pages: u32) -> Option<u32> {
        let current = self.current_pages();
        let new_pages = current.checked_add(delta_pages)?;
        if let Some(max) = self.max_pages {
            if new_pages > max {
                return None;
            }
        }
        self.bytes.resize(new_pages as usize * BYTES_PER_MEMORY_PAGE as usize, 0);
        Some(current)
    }

    pub fn read(&self, addr: u32, len: u32) -> Result<&[u8], TrapCode> {
        let start = addr as usize;
        let end = start.checked_add(len as usize).ok_or(TrapCode::MemoryOutOfBounds)?;
        self.bytes.get(start..end).ok_or(TrapCode::MemoryOutOfBounds)
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), TrapCode> {
        let start = addr as usize;
        let end = start.checked_add(data.len()).ok_or(TrapCode::MemoryOutOfBounds)?;
        let dst = self.bytes.get_mut(start..end).ok_or(TrapCode::MemoryOutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Global {
    pub value: UntypedValue,
    pub mutable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub elements: Vec<Option<u32>>,
}

/// A function instance: its compiled image plus enough of its
/// signature to marshal arguments/results at the call boundary.
pub struct FuncInstance<P: crate::translator::profile::InterpreterProfile> {
    pub image: crate::translator::image::Image<P>,
}

/// One instantiated module: the runtime counterpart of
/// [`crate::types::ModuleView`], holding actual storage instead of
/// section descriptors.
pub struct Instance<P: crate::translator::profile::InterpreterProfile> {
    pub functions: Vec<FuncInstance<P>>,
    pub memories: Vec<Memory>,
    pub tables: Vec<Table>,
    pub globals: Vec<Global>,
}

impl<P: crate::translator::profile::InterpreterProfile> Instance<P> {
    pub fn new() -> Self {
        Self { functions: Vec::new(), memories: Vec::new(), tables: Vec::new(), globals: Vec::new() }
    }
}

impl<P: crate::translator::profile::InterpreterProfile> Default for Instance<P> {
    fn default() -> Self {
        Self::new()
    }
}
