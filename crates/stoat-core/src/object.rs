//! Heap object bodies
//!
//! Every heap slot pairs a `stoat-gc` header with one of the bodies here.
//! The body enum is the object's kind tag; the matching [`Value`] variant
//! carries the same discrimination on the value side.

use std::ffi::c_void;

use indexmap::IndexMap;
use stoat_gc::{ObjRef, Trace};

use crate::exception::Unwind;
use crate::state::State;
use crate::symbol::Sym;
use crate::value::Value;

/// What [`State::new_instance`] allocates for a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceKind {
    /// Plain object with an instance-variable table
    #[default]
    Object,
    /// Native-data wrapper to be filled in by [`State::data_init`]
    Data,
}

/// Class or module descriptor
#[derive(Debug)]
pub struct ClassBox {
    /// Interned class name
    pub name: Sym,
    /// Superclass link; `None` only for the root class
    pub superclass: Option<ObjRef>,
    /// What instantiating this class produces
    pub instance_kind: InstanceKind,
}

/// Plain object instance
#[derive(Debug)]
pub struct Instance {
    /// The instance's class
    pub class: ObjRef,
    /// Instance variables in definition order
    pub ivars: IndexMap<Sym, Value>,
}

impl Instance {
    /// Fresh instance of `class` with no instance variables
    #[must_use]
    pub fn new(class: ObjRef) -> Self {
        Self {
            class,
            ivars: IndexMap::new(),
        }
    }
}

/// Range payload
#[derive(Debug)]
pub struct RangeBox {
    /// Range start
    pub begin: Value,
    /// Range end
    pub end: Value,
    /// Whether the end is excluded
    pub exclusive: bool,
}

/// Host function invoked when a proc is called
pub type NativeFn = fn(&mut State, Value, &[Value]) -> Result<Value, Unwind>;

/// Compiled-closure descriptor
#[derive(Debug)]
pub struct ProcBox {
    /// The function body
    pub body: NativeFn,
    /// Declared parameter count; negative for variadic
    pub arity: i32,
}

/// Type descriptor attached to native-data wrappers.
///
/// `free`, when present, runs while the wrapper is swept.
#[derive(Debug)]
pub struct DataType {
    /// Descriptive type name
    pub name: &'static str,
    /// Finalizer for the wrapped pointer
    pub free: Option<unsafe fn(*mut c_void)>,
}

/// Native-data wrapper body
#[derive(Debug)]
pub struct DataBox {
    /// The wrapper's class
    pub class: ObjRef,
    /// Opaque host payload
    pub ptr: *mut c_void,
    /// Type descriptor; `None` until [`State::data_init`] runs
    pub ty: Option<&'static DataType>,
}

impl Drop for DataBox {
    fn drop(&mut self) {
        if let Some(ty) = self.ty
            && let Some(free) = ty.free
            && !self.ptr.is_null()
        {
            // SAFETY: ptr was supplied together with this type descriptor in
            // data_init, and the wrapper owns it from that point on
            unsafe { free(self.ptr) }
        }
    }
}

/// Exception object body
#[derive(Debug)]
pub struct ExceptionBox {
    /// The exception's class
    pub class: ObjRef,
    /// Exception message
    pub message: String,
}

/// Body of a heap-allocated object
#[derive(Debug)]
pub enum ObjectBody {
    /// Plain object instance
    Instance(Instance),
    /// Class descriptor
    Class(ClassBox),
    /// Module descriptor
    Module(ClassBox),
    /// Ordered sequence container
    Array(Vec<Value>),
    /// Byte string
    Str(String),
    /// Range
    Range(RangeBox),
    /// Compiled-closure descriptor
    Proc(ProcBox),
    /// Native-data wrapper
    Data(DataBox),
    /// Exception object
    Exception(ExceptionBox),
}

impl Trace for ObjectBody {
    fn trace(&self, mark: &mut dyn FnMut(ObjRef)) {
        match self {
            ObjectBody::Instance(obj) => {
                mark(obj.class);
                for value in obj.ivars.values() {
                    trace_value(*value, mark);
                }
            }
            ObjectBody::Class(cls) | ObjectBody::Module(cls) => {
                if let Some(superclass) = cls.superclass {
                    mark(superclass);
                }
            }
            ObjectBody::Array(items) => {
                for value in items {
                    trace_value(*value, mark);
                }
            }
            ObjectBody::Str(_) | ObjectBody::Proc(_) => {}
            ObjectBody::Range(range) => {
                trace_value(range.begin, mark);
                trace_value(range.end, mark);
            }
            ObjectBody::Data(data) => mark(data.class),
            ObjectBody::Exception(exc) => mark(exc.class),
        }
    }
}

/// Mark the heap object behind a value, if it has one
fn trace_value(value: Value, mark: &mut dyn FnMut(ObjRef)) {
    if let Some(r) = value.heap_ref() {
        mark(r);
    }
}
