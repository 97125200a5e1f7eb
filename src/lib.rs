#![cfg_attr(not(feature = "std"), no_std)]
#![allow(dead_code)]
#![warn(unused_crate_dependencies)]

pub mod interp;
pub mod translator;
pub mod types;
pub mod validator;

extern crate alloc;
extern crate core;

pub use interp::{run_function, ExecCtx, FuncInstance, Global, HandlerResult, Instance, Memory, Table, UntypedValue};
pub use translator::{translate_function, CacheState, Image, Immediate, InterpreterProfile, MemoryOnly, RegisterCached, Word};
pub use types::*;
pub use validator::{validate_code, ValidatedFunction};
