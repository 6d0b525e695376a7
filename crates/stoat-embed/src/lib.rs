//! # Stoat embedding primitives
//!
//! The stable seam between a host program and a Stoat interpreter: plain
//! functions over a [`State`] and by-value [`Value`]s for inspecting,
//! constructing, and managing interpreter values without reaching into
//! `stoat-core` internals. Every function forwards to exactly one
//! underlying interpreter or collector operation (or performs one trivial
//! derived check); none of them compose, allocate on their own, or retain
//! references past the call.
//!
//! ## Accessor tiers
//!
//! Extraction comes in two tiers: checked accessors return `Option` and are
//! the default; `*_unchecked` accessors are `unsafe`, skip the tag check
//! entirely, and exist for call sites that have already verified the tag by
//! protocol. Calling an unchecked accessor with a mismatched tag is
//! undefined behavior.
//!
//! ## Keeping values alive
//!
//! Construction does not root anything. A heap allocation is protected by
//! the temporary-root arena until the enclosing savepoint is restored;
//! bracket any call sequence that builds temporary heap values with
//! [`arena_save`]/[`arena_restore`] or an [`ArenaSavepoint`].
//!
//! ## Raising
//!
//! [`raise`] and [`raise_pending`] are the only control-flow-altering
//! operations: they produce an [`Unwind`] token which the host propagates
//! through `Result` instead of returning normally.

#![warn(clippy::all)]
#![warn(missing_docs)]

mod guard;

use std::ffi::c_void;

use stoat_core::{InstanceKind, ObjectBody};

pub use guard::{ArenaSavepoint, GcPause};
// Re-exported so hosts can depend on this crate alone
pub use stoat_core::{DataType, State, Sym, Unwind, Value};
pub use stoat_gc::{ArenaIndex, ObjRef};
pub use stoat_core;
pub use stoat_gc;

// ---------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------

/// Whether `value` is nil
#[must_use]
pub fn is_nil(value: Value) -> bool {
    value.is_nil()
}

/// Whether `value` is the false singleton
#[must_use]
pub fn is_false(value: Value) -> bool {
    value.is_false()
}

/// Whether `value` is the true singleton
#[must_use]
pub fn is_true(value: Value) -> bool {
    value.is_true()
}

/// Whether `value` is a range excluding its end; false for non-ranges
#[must_use]
pub fn is_exclusive_range(state: &State, value: Value) -> bool {
    state.is_exclusive_range(value)
}

/// Whether `value` is frozen; immediates always are
#[must_use]
pub fn is_frozen(state: &State, value: Value) -> bool {
    state.is_frozen(value)
}

// ---------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------

/// Integer payload of a fixnum value
#[must_use]
pub fn fixnum(value: Value) -> Option<i64> {
    value.as_fixnum()
}

/// Integer payload without a tag check.
///
/// # Safety
/// `value` must be a `Fixnum`; the caller has verified the tag out-of-band.
#[must_use]
pub unsafe fn fixnum_unchecked(value: Value) -> i64 {
    match value {
        Value::Fixnum(n) => n,
        // SAFETY: caller guarantees the value is a Fixnum
        _ => unsafe { std::hint::unreachable_unchecked() },
    }
}

/// Float payload of a float value
#[must_use]
pub fn float(value: Value) -> Option<f64> {
    value.as_float()
}

/// Float payload without a tag check.
///
/// # Safety
/// `value` must be a `Float`; the caller has verified the tag out-of-band.
#[must_use]
pub unsafe fn float_unchecked(value: Value) -> f64 {
    match value {
        Value::Float(f) => f,
        // SAFETY: caller guarantees the value is a Float
        _ => unsafe { std::hint::unreachable_unchecked() },
    }
}

/// Opaque pointer payload of a host-pointer value
#[must_use]
pub fn cptr(value: Value) -> Option<*mut c_void> {
    value.as_cptr()
}

/// Opaque pointer payload without a tag check.
///
/// # Safety
/// `value` must be a `CPtr`; the caller has verified the tag out-of-band.
#[must_use]
pub unsafe fn cptr_unchecked(value: Value) -> *mut c_void {
    match value {
        Value::CPtr(ptr) => ptr,
        // SAFETY: caller guarantees the value is a CPtr
        _ => unsafe { std::hint::unreachable_unchecked() },
    }
}

/// Symbol payload of a symbol value
#[must_use]
pub fn symbol(value: Value) -> Option<Sym> {
    value.as_symbol()
}

/// Heap reference behind any pointer-tagged value
#[must_use]
pub fn heap_ref(value: Value) -> Option<ObjRef> {
    value.heap_ref()
}

/// Heap reference of a plain object value
#[must_use]
pub fn object_ref(value: Value) -> Option<ObjRef> {
    match value {
        Value::Object(r) => Some(r),
        _ => None,
    }
}

/// Heap reference of a plain object value without a tag check.
///
/// # Safety
/// `value` must be an `Object`; the caller has verified the tag out-of-band.
#[must_use]
pub unsafe fn object_ref_unchecked(value: Value) -> ObjRef {
    match value {
        Value::Object(r) => r,
        // SAFETY: caller guarantees the value is an Object
        _ => unsafe { std::hint::unreachable_unchecked() },
    }
}

/// Heap reference of a proc value
#[must_use]
pub fn proc_ref(value: Value) -> Option<ObjRef> {
    match value {
        Value::Proc(r) => Some(r),
        _ => None,
    }
}

/// Heap reference of a proc value without a tag check.
///
/// # Safety
/// `value` must be a `Proc`; the caller has verified the tag out-of-band.
#[must_use]
pub unsafe fn proc_ref_unchecked(value: Value) -> ObjRef {
    match value {
        Value::Proc(r) => r,
        // SAFETY: caller guarantees the value is a Proc
        _ => unsafe { std::hint::unreachable_unchecked() },
    }
}

/// Class descriptor behind a class value
#[must_use]
pub fn class_ref(value: Value) -> Option<ObjRef> {
    match value {
        Value::Class(r) => Some(r),
        _ => None,
    }
}

/// Class descriptor without a tag check.
///
/// Accepts class and module values alike: this is the raw payload
/// reinterpretation, kept for call sites that cannot afford the checked
/// accessor's branch. Prefer [`class_ref`] everywhere else.
///
/// # Safety
/// `value` must be a `Class` or `Module`; the caller has verified the tag
/// out-of-band.
#[must_use]
pub unsafe fn class_ref_unchecked(value: Value) -> ObjRef {
    match value {
        Value::Class(r) | Value::Module(r) => r,
        // SAFETY: caller guarantees the value is a Class or Module
        _ => unsafe { std::hint::unreachable_unchecked() },
    }
}

/// The class of an arbitrary value; total over every kind
#[must_use]
pub fn class_of(state: &State, value: Value) -> ObjRef {
    state.class_of(value)
}

// ---------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------

/// The nil value
#[must_use]
pub fn nil_value() -> Value {
    Value::Nil
}

/// The false value
#[must_use]
pub fn false_value() -> Value {
    Value::False
}

/// The true value
#[must_use]
pub fn true_value() -> Value {
    Value::True
}

/// An immediate integer value
#[must_use]
pub fn fixnum_value(n: i64) -> Value {
    Value::Fixnum(n)
}

/// An immediate float value
#[must_use]
pub fn float_value(f: f64) -> Value {
    Value::Float(f)
}

/// An opaque host-pointer value; the interpreter never dereferences it
#[must_use]
pub fn cptr_value(ptr: *mut c_void) -> Value {
    Value::CPtr(ptr)
}

/// A symbol value from an interned id
#[must_use]
pub fn symbol_value(sym: Sym) -> Value {
    Value::Symbol(sym)
}

/// Rebuild the tagged value for a heap ref from its body kind.
///
/// `None` for a dead or dangling ref.
#[must_use]
pub fn obj_value(state: &State, r: ObjRef) -> Option<Value> {
    state.value_of(r)
}

/// A class value over a class descriptor
#[must_use]
pub fn class_value(class: ObjRef) -> Value {
    Value::Class(class)
}

/// A module value over a module descriptor
#[must_use]
pub fn module_value(module: ObjRef) -> Value {
    Value::Module(module)
}

/// A data value over a native-data wrapper
#[must_use]
pub fn data_value(data: ObjRef) -> Value {
    Value::Data(data)
}

/// A proc value over a compiled-closure descriptor
#[must_use]
pub fn proc_value(descriptor: ObjRef) -> Value {
    Value::Proc(descriptor)
}

// ---------------------------------------------------------------------
// Native data
// ---------------------------------------------------------------------

/// Make instantiating `class` produce a native-data wrapper.
///
/// Returns false when `class` is not a live class descriptor.
pub fn set_data_instance_kind(state: &mut State, class: ObjRef) -> bool {
    state.set_instance_kind(class, InstanceKind::Data)
}

/// Initialize a freshly allocated data wrapper with a pointer and its type
/// descriptor.
///
/// The caller must have obtained `value` from instantiating a data-kind
/// class and not initialized it before; on kind mismatch or double
/// initialization nothing is written and false is returned.
pub fn data_init(state: &mut State, value: Value, ptr: *mut c_void, ty: &'static DataType) -> bool {
    state.data_init(value, ptr, ty)
}

// ---------------------------------------------------------------------
// Exceptions
// ---------------------------------------------------------------------

/// Raise an exception of the class registered under `class_name`.
///
/// Control does not continue normally past a raise: the returned [`Unwind`]
/// must be propagated to the host's rescue boundary. An unknown class name
/// is itself a NameError raise.
pub fn raise(state: &mut State, class_name: &str, message: &str) -> Unwind {
    state.raise(class_name, message)
}

/// Re-raise the interpreter's pending exception.
///
/// A no-op returning `Ok` when nothing is pending. This is how an exception
/// captured across a host-call boundary re-enters interpreter control flow.
pub fn raise_pending(state: &State) -> Result<(), Unwind> {
    state.raise_pending()
}

// ---------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------

/// Element count of an array value; `None` for non-arrays and dead refs
#[must_use]
pub fn array_len(state: &State, value: Value) -> Option<usize> {
    match value {
        Value::Array(r) => match state.body(r) {
            Some(ObjectBody::Array(items)) => Some(items.len()),
            _ => None,
        },
        _ => None,
    }
}

/// Element count of an array value, reading the length field directly.
///
/// Fast path past the generic tag-checked accessor
/// ([`State::sequence_len`]).
///
/// # Safety
/// `value` must be a live `Array` of `state`; the caller has verified both
/// out-of-band.
#[must_use]
pub unsafe fn array_len_unchecked(state: &State, value: Value) -> usize {
    let r = match value {
        Value::Array(r) => r,
        // SAFETY: caller guarantees the value is an Array
        _ => unsafe { std::hint::unreachable_unchecked() },
    };
    match state.body(r) {
        Some(ObjectBody::Array(items)) => items.len(),
        // SAFETY: caller guarantees the array is live in this state's heap
        _ => unsafe { std::hint::unreachable_unchecked() },
    }
}

// ---------------------------------------------------------------------
// Garbage collector
// ---------------------------------------------------------------------

/// Save the temporary-root arena height as a checkpoint
#[must_use]
pub fn arena_save(state: &State) -> ArenaIndex {
    state.arena_save()
}

/// Rewind the arena to a checkpoint, releasing roots registered after it.
///
/// Checkpoints must be restored LIFO; no nesting validation is performed.
pub fn arena_restore(state: &mut State, index: ArenaIndex) {
    state.arena_restore(index);
}

/// Disable collection; returns whether it was enabled before the call
pub fn gc_disable(state: &mut State) -> bool {
    state.gc_disable()
}

/// Enable collection; returns whether it was enabled before the call
pub fn gc_enable(state: &mut State) -> bool {
    state.gc_enable()
}

/// Whether the object behind `value` was swept but not yet reclaimed.
///
/// Immediates are never dead; a dangling ref always is.
#[must_use]
pub fn is_dead(state: &State, value: Value) -> bool {
    match value.heap_ref() {
        Some(r) => state.object_is_dead(r),
        None => false,
    }
}

/// Running count of live heap objects
#[must_use]
pub fn live_objects(state: &State) -> usize {
    state.live_objects()
}

/// Mark `value` as reachable for the next collection cycle.
///
/// For values stashed in host memory that the collector's graph walk cannot
/// see. Immediates need no marking and are skipped.
pub fn mark_value(state: &mut State, value: Value) {
    if let Some(r) = value.heap_ref() {
        state.gc_mark(r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_round_trips() {
        let mut state = State::new();

        assert!(is_nil(nil_value()));
        assert!(is_false(false_value()));
        assert!(is_true(true_value()));
        assert!(!is_false(true_value()));
        assert!(!is_nil(true_value()));

        assert_eq!(fixnum(fixnum_value(5)), Some(5));
        assert_eq!(float(float_value(1.25)), Some(1.25));
        assert_eq!(fixnum(float_value(1.25)), None);

        let sym = state.intern("name");
        assert_eq!(symbol(symbol_value(sym)), Some(sym));

        let marker = 0xF00Dusize as *mut c_void;
        assert_eq!(cptr(cptr_value(marker)), Some(marker));
    }

    #[test]
    fn test_unchecked_extraction_round_trips() {
        // SAFETY: each value was just constructed with the matching tag
        unsafe {
            assert_eq!(fixnum_unchecked(fixnum_value(-3)), -3);
            assert_eq!(float_unchecked(float_value(0.5)), 0.5);
            assert!(cptr_unchecked(cptr_value(std::ptr::null_mut())).is_null());
        }
    }

    #[test]
    fn test_class_extraction_tiers() {
        let mut state = State::new();
        let cls = state.define_class("Widget", None);
        let module = state.define_module("Mixin");

        assert_eq!(class_ref(class_value(cls)), Some(cls));
        assert_eq!(class_ref(module_value(module)), None);

        // SAFETY: both values carry class/module descriptors
        unsafe {
            assert_eq!(class_ref_unchecked(class_value(cls)), cls);
            assert_eq!(class_ref_unchecked(module_value(module)), module);
        }
    }

    #[test]
    fn test_obj_value_restores_kind() {
        let mut state = State::new();
        let ary = state.new_array(vec![fixnum_value(1)]);
        let r = heap_ref(ary).unwrap();
        assert_eq!(obj_value(&state, r), Some(ary));

        let cls = state.define_class("Widget", None);
        let instance = state.new_instance(cls).unwrap();
        let r = object_ref(instance).unwrap();
        assert_eq!(obj_value(&state, r), Some(instance));
    }

    #[test]
    fn test_class_of_values() {
        let mut state = State::new();
        let core = *state.core_classes();

        assert_eq!(class_of(&state, nil_value()), core.nil_class);
        assert_eq!(class_of(&state, fixnum_value(9)), core.integer);

        let cls = state.define_class("Widget", None);
        let instance = state.new_instance(cls).unwrap();
        assert_eq!(class_of(&state, instance), cls);
    }

    #[test]
    fn test_range_predicate_totality() {
        let mut state = State::new();
        let exclusive = state.new_range(fixnum_value(0), fixnum_value(3), true);
        let inclusive = state.new_range(fixnum_value(0), fixnum_value(3), false);

        assert!(is_exclusive_range(&state, exclusive));
        assert!(!is_exclusive_range(&state, inclusive));
        assert!(!is_exclusive_range(&state, nil_value()));
        assert!(!is_exclusive_range(&state, fixnum_value(1)));
    }

    #[test]
    fn test_frozen_predicate() {
        let mut state = State::new();

        for value in [nil_value(), true_value(), fixnum_value(1), float_value(1.0)] {
            assert!(is_frozen(&state, value), "{value:?}");
        }

        let ary = state.new_array(Vec::new());
        assert!(!is_frozen(&state, ary));
        state.freeze(ary);
        assert!(is_frozen(&state, ary));
    }

    #[test]
    fn test_native_data_binding() {
        static HANDLE: DataType = DataType {
            name: "handle",
            free: None,
        };

        let mut state = State::new();
        let cls = state.define_class("Handle", None);
        assert!(set_data_instance_kind(&mut state, cls));

        let wrapper = state.new_instance(cls).unwrap();
        let payload = 0x1234usize as *mut c_void;
        assert!(data_init(&mut state, wrapper, payload, &HANDLE));
        assert_eq!(state.data_ptr(wrapper, &HANDLE), Some(payload));

        // Kind mismatch writes nothing
        assert!(!data_init(&mut state, nil_value(), payload, &HANDLE));
        // A non-class ref cannot be retagged
        let ary = state.new_array(Vec::new());
        assert!(!set_data_instance_kind(&mut state, heap_ref(ary).unwrap()));
    }

    #[test]
    fn test_raise_surfaces_class_and_message() {
        let mut state = State::new();

        fn host_call(state: &mut State) -> Result<Value, Unwind> {
            Err(raise(state, "ArgumentError", "too many widgets"))
        }

        let err = host_call(&mut state).unwrap_err();
        assert_eq!(err.class_name(), "ArgumentError");
        assert_eq!(err.message(), "too many widgets");
        assert_eq!(class_of(&state, err.value()), state.core_classes().argument_error);
    }

    #[test]
    fn test_raise_pending_no_op_without_exception() {
        let mut state = State::new();
        assert!(raise_pending(&state).is_ok());

        raise(&mut state, "RuntimeError", "kept");
        let err = raise_pending(&state).unwrap_err();
        assert_eq!(err.class_name(), "RuntimeError");

        state.take_pending_exception();
        assert!(raise_pending(&state).is_ok());
    }

    #[test]
    fn test_array_len_agrees_with_generic_accessor() {
        let mut state = State::new();
        let empty = state.new_array(Vec::new());
        let three = state.new_array(vec![nil_value(), true_value(), fixnum_value(2)]);

        assert_eq!(array_len(&state, empty), Some(0));
        assert_eq!(array_len(&state, three), Some(3));
        assert_eq!(array_len(&state, nil_value()), None);

        // SAFETY: both values are live arrays of this state
        unsafe {
            assert_eq!(array_len_unchecked(&state, empty), 0);
            assert_eq!(array_len_unchecked(&state, three), 3);
        }

        assert_eq!(state.sequence_len(empty).unwrap(), 0);
        assert_eq!(state.sequence_len(three).unwrap(), 3);
    }

    #[test]
    fn test_dead_check_boundaries() {
        let mut state = State::new();

        // Immediates are never dead
        for value in [nil_value(), false_value(), true_value(), fixnum_value(1)] {
            assert!(!is_dead(&state, value), "{value:?}");
        }

        let save = arena_save(&state);
        let doomed = state.new_array(Vec::new());
        arena_restore(&mut state, save);
        state.garbage_collect();

        assert!(is_dead(&state, doomed));
    }

    #[test]
    fn test_gc_disable_enable_inverses() {
        let mut state = State::new();

        assert!(gc_disable(&mut state));
        assert!(!gc_disable(&mut state));
        assert!(!gc_enable(&mut state));
        assert!(gc_enable(&mut state));
    }

    #[test]
    fn test_arena_protection_window() {
        let mut state = State::new();
        let before = state.new_array(Vec::new());
        let save = arena_save(&state);
        let after = state.new_array(Vec::new());

        arena_restore(&mut state, save);
        state.garbage_collect();

        assert!(!is_dead(&state, before));
        assert!(is_dead(&state, after));
    }

    #[test]
    fn test_mark_value_protects_host_stash() {
        let mut state = State::new();
        let save = arena_save(&state);
        let stashed = state.new_array(Vec::new());
        arena_restore(&mut state, save);

        mark_value(&mut state, stashed);
        state.garbage_collect();
        assert!(!is_dead(&state, stashed));

        // Marks are per-cycle; the next collection sweeps it
        state.garbage_collect();
        assert!(is_dead(&state, stashed));

        // Marking an immediate is a no-op
        mark_value(&mut state, fixnum_value(1));
    }

    #[test]
    fn test_live_objects_tracks_allocations() {
        let mut state = State::new();
        let baseline = live_objects(&state);

        let save = arena_save(&state);
        state.new_array(Vec::new());
        state.new_string("x");
        assert_eq!(live_objects(&state), baseline + 2);

        arena_restore(&mut state, save);
        state.garbage_collect();
        assert_eq!(live_objects(&state), baseline);
    }
}
