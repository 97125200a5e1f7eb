//! Newtype wrappers around module-relative indices.
//!
//! Kept `#[repr(transparent)]` over `u32` so a `Vec<FuncIdx>` has the
//! same layout as a `Vec<u32>`, matching how the bytecode decoder
//! hands these out straight from LEB128 reads.

use core::fmt;

macro_rules! index_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl $name {
            pub fn as_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_newtype!(TypeIdx);
index_newtype!(FuncIdx);
index_newtype!(TableIdx);
index_newtype!(MemIdx);
index_newtype!(GlobalIdx);
index_newtype!(LocalIdx);
index_newtype!(LabelIdx);
