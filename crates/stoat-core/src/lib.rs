//! # Stoat VM Core
//!
//! Interpreter substrate for the Stoat VM: the tagged value model, heap
//! object bodies, symbol interning, the class table, and exception raising.
//!
//! ## Design Principles
//!
//! - **Closed value type**: every payload kind is a variant of [`Value`];
//!   immediates carry inline scalars, heap variants carry an [`ObjRef`]
//!   into the owning [`State`]'s heap
//! - **Single-threaded**: one [`State`] is one interpreter instance; the
//!   host serializes all access to it
//! - **Typed unwinding**: raising produces an [`Unwind`] token that callers
//!   propagate through `Result` instead of a non-local jump

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod exception;
pub mod object;
pub mod state;
pub mod symbol;
pub mod value;

pub use exception::Unwind;
pub use object::{
    ClassBox, DataBox, DataType, ExceptionBox, Instance, InstanceKind, NativeFn, ObjectBody,
    ProcBox, RangeBox,
};
pub use state::{CoreClasses, State};
pub use stoat_gc::{ArenaIndex, GcStats, ObjRef};
pub use symbol::{Sym, SymbolTable};
pub use value::{Value, ValueKind};
