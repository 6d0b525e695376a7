//! Tagged interpreter values
//!
//! A [`Value`] is a fixed-size tagged union: immediate variants carry their
//! payload inline and are never heap-allocated; heap variants carry an
//! [`ObjRef`] into the collector-owned heap of the [`State`](crate::State)
//! that produced them. A value's variant never changes; converting between
//! kinds always constructs a new value.

use std::ffi::c_void;

use stoat_gc::ObjRef;

use crate::symbol::Sym;

/// A tagged interpreter value.
///
/// Immediates (`Nil`, `False`, `True`, `Fixnum`, `Float`, `Symbol`, `CPtr`)
/// are self-contained and invisible to the garbage collector. Heap variants
/// borrow collector-owned storage: they are only meaningful against the
/// heap that allocated them, and they stay alive only while rooted (see the
/// arena operations on [`State`](crate::State)).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// The nil singleton
    #[default]
    Nil,
    /// The false singleton
    False,
    /// The true singleton
    True,
    /// Immediate integer
    Fixnum(i64),
    /// Immediate floating-point number
    Float(f64),
    /// Interned symbol id
    Symbol(Sym),
    /// Opaque host pointer; the interpreter never dereferences it
    CPtr(*mut c_void),
    /// Plain object instance
    Object(ObjRef),
    /// Class descriptor
    Class(ObjRef),
    /// Module descriptor
    Module(ObjRef),
    /// Ordered sequence container
    Array(ObjRef),
    /// Byte string
    Str(ObjRef),
    /// Range with begin/end and an exclusive-end flag
    Range(ObjRef),
    /// Compiled-closure descriptor
    Proc(ObjRef),
    /// Native-data wrapper
    Data(ObjRef),
    /// Exception object
    Exception(ObjRef),
}

/// Type tag of a [`Value`], detached from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `Value::Nil`
    Nil,
    /// `Value::False`
    False,
    /// `Value::True`
    True,
    /// `Value::Fixnum`
    Fixnum,
    /// `Value::Float`
    Float,
    /// `Value::Symbol`
    Symbol,
    /// `Value::CPtr`
    CPtr,
    /// `Value::Object`
    Object,
    /// `Value::Class`
    Class,
    /// `Value::Module`
    Module,
    /// `Value::Array`
    Array,
    /// `Value::Str`
    String,
    /// `Value::Range`
    Range,
    /// `Value::Proc`
    Proc,
    /// `Value::Data`
    Data,
    /// `Value::Exception`
    Exception,
}

impl ValueKind {
    /// Human-readable tag name, as used in error messages
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::False => "false",
            ValueKind::True => "true",
            ValueKind::Fixnum => "Integer",
            ValueKind::Float => "Float",
            ValueKind::Symbol => "Symbol",
            ValueKind::CPtr => "pointer",
            ValueKind::Object => "Object",
            ValueKind::Class => "Class",
            ValueKind::Module => "Module",
            ValueKind::Array => "Array",
            ValueKind::String => "String",
            ValueKind::Range => "Range",
            ValueKind::Proc => "Proc",
            ValueKind::Data => "Data",
            ValueKind::Exception => "Exception",
        }
    }
}

impl Value {
    /// Create a `nil` value.
    ///
    /// Alias for `Value::default`.
    #[inline]
    #[must_use]
    pub fn nil() -> Self {
        Self::default()
    }

    /// This value's type tag
    #[must_use]
    pub fn kind(self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::False => ValueKind::False,
            Value::True => ValueKind::True,
            Value::Fixnum(_) => ValueKind::Fixnum,
            Value::Float(_) => ValueKind::Float,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::CPtr(_) => ValueKind::CPtr,
            Value::Object(_) => ValueKind::Object,
            Value::Class(_) => ValueKind::Class,
            Value::Module(_) => ValueKind::Module,
            Value::Array(_) => ValueKind::Array,
            Value::Str(_) => ValueKind::String,
            Value::Range(_) => ValueKind::Range,
            Value::Proc(_) => ValueKind::Proc,
            Value::Data(_) => ValueKind::Data,
            Value::Exception(_) => ValueKind::Exception,
        }
    }

    /// Whether this is the nil singleton
    #[inline]
    #[must_use]
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Whether this is the false singleton
    #[inline]
    #[must_use]
    pub fn is_false(self) -> bool {
        matches!(self, Value::False)
    }

    /// Whether this is the true singleton
    #[inline]
    #[must_use]
    pub fn is_true(self) -> bool {
        matches!(self, Value::True)
    }

    /// Whether the payload lives inline rather than on the heap.
    ///
    /// Immediate values are never garbage collected.
    #[must_use]
    pub fn is_immediate(self) -> bool {
        self.heap_ref().is_none()
    }

    /// The heap reference behind this value, if it has one
    #[must_use]
    pub fn heap_ref(self) -> Option<ObjRef> {
        match self {
            Value::Object(r)
            | Value::Class(r)
            | Value::Module(r)
            | Value::Array(r)
            | Value::Str(r)
            | Value::Range(r)
            | Value::Proc(r)
            | Value::Data(r)
            | Value::Exception(r) => Some(r),
            _ => None,
        }
    }

    /// Integer payload, if this is a fixnum
    #[inline]
    #[must_use]
    pub fn as_fixnum(self) -> Option<i64> {
        match self {
            Value::Fixnum(n) => Some(n),
            _ => None,
        }
    }

    /// Float payload, if this is a float
    #[inline]
    #[must_use]
    pub fn as_float(self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Symbol payload, if this is a symbol
    #[inline]
    #[must_use]
    pub fn as_symbol(self) -> Option<Sym> {
        match self {
            Value::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    /// Opaque pointer payload, if this is a host pointer
    #[inline]
    #[must_use]
    pub fn as_cptr(self) -> Option<*mut c_void> {
        match self {
            Value::CPtr(ptr) => Some(ptr),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        if value { Value::True } else { Value::False }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Fixnum(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Sym> for Value {
    fn from(value: Sym) -> Self {
        Value::Symbol(value)
    }
}

impl From<Option<Value>> for Value {
    fn from(value: Option<Value>) -> Self {
        value.unwrap_or(Value::Nil)
    }
}
