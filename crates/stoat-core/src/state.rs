//! The interpreter instance
//!
//! [`State`] owns the heap, the symbol table, the class/constant table, and
//! the pending-exception slot. One `State` is one interpreter; all access is
//! single-threaded and serialized by the host.

use std::ffi::c_void;

use rustc_hash::FxHashMap;
use stoat_gc::{ArenaIndex, GcStats, Heap, ObjRef};

use crate::exception::Unwind;
use crate::object::{
    ClassBox, DataBox, DataType, ExceptionBox, Instance, InstanceKind, NativeFn, ObjectBody,
    ProcBox, RangeBox,
};
use crate::symbol::{Sym, SymbolTable};
use crate::value::Value;

/// Well-known classes installed by [`State::new`]
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct CoreClasses {
    pub object: ObjRef,
    pub class: ObjRef,
    pub module: ObjRef,
    pub nil_class: ObjRef,
    pub true_class: ObjRef,
    pub false_class: ObjRef,
    pub integer: ObjRef,
    pub float: ObjRef,
    pub symbol: ObjRef,
    pub string: ObjRef,
    pub array: ObjRef,
    pub range: ObjRef,
    pub proc_class: ObjRef,
    pub exception: ObjRef,
    pub standard_error: ObjRef,
    pub runtime_error: ObjRef,
    pub type_error: ObjRef,
    pub argument_error: ObjRef,
    pub name_error: ObjRef,
    pub frozen_error: ObjRef,
}

/// One interpreter instance.
///
/// Not `Sync`; the host must serialize all access for the lifetime of the
/// instance.
pub struct State {
    heap: Heap<ObjectBody>,
    symbols: SymbolTable,
    /// Class/module constant table: name → descriptor
    constants: FxHashMap<Sym, ObjRef>,
    core: CoreClasses,
    /// Pending exception, set by every raise until the host clears it
    exc: Option<Value>,
}

fn bootstrap_class(
    heap: &mut Heap<ObjectBody>,
    symbols: &mut SymbolTable,
    constants: &mut FxHashMap<Sym, ObjRef>,
    name: &str,
    superclass: Option<ObjRef>,
) -> ObjRef {
    let name = symbols.intern(name);
    let r = heap.alloc(ObjectBody::Class(ClassBox {
        name,
        superclass,
        instance_kind: InstanceKind::Object,
    }));
    constants.insert(name, r);
    r
}

impl State {
    /// Create an interpreter with the core class set installed
    #[must_use]
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let mut constants = FxHashMap::default();

        let checkpoint = heap.arena_save();

        let object = bootstrap_class(&mut heap, &mut symbols, &mut constants, "Object", None);
        let class = bootstrap_class(&mut heap, &mut symbols, &mut constants, "Class", Some(object));
        let module =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "Module", Some(object));
        let nil_class =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "NilClass", Some(object));
        let true_class =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "TrueClass", Some(object));
        let false_class =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "FalseClass", Some(object));
        let integer =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "Integer", Some(object));
        let float = bootstrap_class(&mut heap, &mut symbols, &mut constants, "Float", Some(object));
        let symbol =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "Symbol", Some(object));
        let string =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "String", Some(object));
        let array = bootstrap_class(&mut heap, &mut symbols, &mut constants, "Array", Some(object));
        let range = bootstrap_class(&mut heap, &mut symbols, &mut constants, "Range", Some(object));
        let proc_class =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "Proc", Some(object));
        let exception =
            bootstrap_class(&mut heap, &mut symbols, &mut constants, "Exception", Some(object));
        let standard_error = bootstrap_class(
            &mut heap,
            &mut symbols,
            &mut constants,
            "StandardError",
            Some(exception),
        );
        let runtime_error = bootstrap_class(
            &mut heap,
            &mut symbols,
            &mut constants,
            "RuntimeError",
            Some(standard_error),
        );
        let type_error = bootstrap_class(
            &mut heap,
            &mut symbols,
            &mut constants,
            "TypeError",
            Some(standard_error),
        );
        let argument_error = bootstrap_class(
            &mut heap,
            &mut symbols,
            &mut constants,
            "ArgumentError",
            Some(standard_error),
        );
        let name_error = bootstrap_class(
            &mut heap,
            &mut symbols,
            &mut constants,
            "NameError",
            Some(standard_error),
        );
        let frozen_error = bootstrap_class(
            &mut heap,
            &mut symbols,
            &mut constants,
            "FrozenError",
            Some(runtime_error),
        );

        // Core classes are rooted through the constant table from here on
        heap.arena_restore(checkpoint);

        Self {
            heap,
            symbols,
            constants,
            core: CoreClasses {
                object,
                class,
                module,
                nil_class,
                true_class,
                false_class,
                integer,
                float,
                symbol,
                string,
                array,
                range,
                proc_class,
                exception,
                standard_error,
                runtime_error,
                type_error,
                argument_error,
                name_error,
                frozen_error,
            },
            exc: None,
        }
    }

    /// The well-known class set
    #[must_use]
    pub fn core_classes(&self) -> &CoreClasses {
        &self.core
    }

    // ------------------------------------------------------------------
    // Symbols
    // ------------------------------------------------------------------

    /// Intern a symbol name
    pub fn intern(&mut self, name: &str) -> Sym {
        self.symbols.intern(name)
    }

    /// Resolve a symbol id back to its name
    #[must_use]
    pub fn symbol_name(&self, sym: Sym) -> Option<&str> {
        self.symbols.name(sym)
    }

    // ------------------------------------------------------------------
    // Heap access
    // ------------------------------------------------------------------

    /// Allocate a heap object, collecting first if the threshold was hit.
    ///
    /// The new ref is rooted on the arena until the enclosing savepoint is
    /// restored.
    pub fn alloc(&mut self, body: ObjectBody) -> ObjRef {
        if self.heap.should_collect() {
            self.garbage_collect();
        }
        self.heap.alloc(body)
    }

    /// Borrow a live object body
    #[must_use]
    pub fn body(&self, r: ObjRef) -> Option<&ObjectBody> {
        self.heap.get(r)
    }

    /// Mutably borrow a live object body
    pub fn body_mut(&mut self, r: ObjRef) -> Option<&mut ObjectBody> {
        self.heap.get_mut(r)
    }

    /// Rebuild the tagged value for a live heap ref from its body kind
    #[must_use]
    pub fn value_of(&self, r: ObjRef) -> Option<Value> {
        self.body(r).map(|body| match body {
            ObjectBody::Instance(_) => Value::Object(r),
            ObjectBody::Class(_) => Value::Class(r),
            ObjectBody::Module(_) => Value::Module(r),
            ObjectBody::Array(_) => Value::Array(r),
            ObjectBody::Str(_) => Value::Str(r),
            ObjectBody::Range(_) => Value::Range(r),
            ObjectBody::Proc(_) => Value::Proc(r),
            ObjectBody::Data(_) => Value::Data(r),
            ObjectBody::Exception(_) => Value::Exception(r),
        })
    }

    // ------------------------------------------------------------------
    // Value construction
    // ------------------------------------------------------------------

    /// Allocate an array value
    pub fn new_array(&mut self, items: Vec<Value>) -> Value {
        Value::Array(self.alloc(ObjectBody::Array(items)))
    }

    /// Allocate a string value
    pub fn new_string(&mut self, contents: impl Into<String>) -> Value {
        Value::Str(self.alloc(ObjectBody::Str(contents.into())))
    }

    /// Allocate a range value
    pub fn new_range(&mut self, begin: Value, end: Value, exclusive: bool) -> Value {
        Value::Range(self.alloc(ObjectBody::Range(RangeBox {
            begin,
            end,
            exclusive,
        })))
    }

    /// Allocate a proc value wrapping a host function
    pub fn new_proc(&mut self, body: NativeFn, arity: i32) -> Value {
        Value::Proc(self.alloc(ObjectBody::Proc(ProcBox { body, arity })))
    }

    /// Instantiate a class according to its instance kind.
    ///
    /// Data-kind classes produce an uninitialized wrapper to be filled by
    /// [`State::data_init`].
    pub fn new_instance(&mut self, class: ObjRef) -> Result<Value, Unwind> {
        let kind = match self.body(class) {
            Some(ObjectBody::Class(cls)) => cls.instance_kind,
            _ => {
                let unwind = self.raise_class(self.core.type_error, "not a class");
                return Err(unwind);
            }
        };
        Ok(match kind {
            InstanceKind::Object => {
                Value::Object(self.alloc(ObjectBody::Instance(Instance::new(class))))
            }
            InstanceKind::Data => Value::Data(self.alloc(ObjectBody::Data(DataBox {
                class,
                ptr: std::ptr::null_mut(),
                ty: None,
            }))),
        })
    }

    /// Invoke a proc's host function with a receiver and arguments.
    ///
    /// Raises TypeError for non-procs and ArgumentError when a fixed arity
    /// does not match; a negative arity accepts anything.
    pub fn call_proc(
        &mut self,
        value: Value,
        receiver: Value,
        args: &[Value],
    ) -> Result<Value, Unwind> {
        let (body, arity) = match value {
            Value::Proc(r) => match self.body(r) {
                Some(ObjectBody::Proc(p)) => (p.body, p.arity),
                _ => {
                    let unwind = self.raise_class(self.core.type_error, "proc object is dead");
                    return Err(unwind);
                }
            },
            other => {
                let message = format!("expected Proc, got {}", other.kind().name());
                return Err(self.raise_class(self.core.type_error, &message));
            }
        };
        if arity >= 0 && args.len() != arity as usize {
            let message = format!(
                "wrong number of arguments (given {}, expected {arity})",
                args.len()
            );
            return Err(self.raise_class(self.core.argument_error, &message));
        }
        body(self, receiver, args)
    }

    // ------------------------------------------------------------------
    // Classes and modules
    // ------------------------------------------------------------------

    /// Define a class under `name`; superclass defaults to Object
    pub fn define_class(&mut self, name: &str, superclass: Option<ObjRef>) -> ObjRef {
        let name = self.intern(name);
        let superclass = superclass.or(Some(self.core.object));
        let r = self.alloc(ObjectBody::Class(ClassBox {
            name,
            superclass,
            instance_kind: InstanceKind::Object,
        }));
        self.constants.insert(name, r);
        r
    }

    /// Define a module under `name`
    pub fn define_module(&mut self, name: &str) -> ObjRef {
        let name = self.intern(name);
        let r = self.alloc(ObjectBody::Module(ClassBox {
            name,
            superclass: None,
            instance_kind: InstanceKind::Object,
        }));
        self.constants.insert(name, r);
        r
    }

    /// Look a class or module up by name; raises NameError when missing
    pub fn class_get(&mut self, name: &str) -> Result<ObjRef, Unwind> {
        let sym = self.intern(name);
        match self.constants.get(&sym) {
            Some(&r) => Ok(r),
            None => {
                let message = format!("uninitialized constant {name}");
                Err(self.raise_class(self.core.name_error, &message))
            }
        }
    }

    /// The class of an arbitrary value; total over every kind
    #[must_use]
    pub fn class_of(&self, value: Value) -> ObjRef {
        match value {
            Value::Nil => self.core.nil_class,
            Value::False => self.core.false_class,
            Value::True => self.core.true_class,
            Value::Fixnum(_) => self.core.integer,
            Value::Float(_) => self.core.float,
            Value::Symbol(_) => self.core.symbol,
            Value::CPtr(_) => self.core.object,
            Value::Object(r) => match self.body(r) {
                Some(ObjectBody::Instance(obj)) => obj.class,
                _ => self.core.object,
            },
            Value::Class(_) => self.core.class,
            Value::Module(_) => self.core.module,
            Value::Array(_) => self.core.array,
            Value::Str(_) => self.core.string,
            Value::Range(_) => self.core.range,
            Value::Proc(_) => self.core.proc_class,
            Value::Data(r) => match self.body(r) {
                Some(ObjectBody::Data(data)) => data.class,
                _ => self.core.object,
            },
            Value::Exception(r) => match self.body(r) {
                Some(ObjectBody::Exception(exc)) => exc.class,
                _ => self.core.exception,
            },
        }
    }

    /// Display name of a class or module descriptor
    #[must_use]
    pub fn class_name(&self, class: ObjRef) -> &str {
        match self.body(class) {
            Some(ObjectBody::Class(cls) | ObjectBody::Module(cls)) => {
                self.symbols.name(cls.name).unwrap_or("<anonymous>")
            }
            _ => "<anonymous>",
        }
    }

    /// Switch what instantiating `class` produces.
    ///
    /// Returns false when `class` is not a live class descriptor.
    pub fn set_instance_kind(&mut self, class: ObjRef, kind: InstanceKind) -> bool {
        match self.body_mut(class) {
            Some(ObjectBody::Class(cls)) => {
                cls.instance_kind = kind;
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Native data
    // ------------------------------------------------------------------

    /// Initialize a freshly allocated data wrapper in place.
    ///
    /// The wrapper takes ownership of `ptr`; the descriptor's finalizer runs
    /// when the wrapper is swept. Returns false when `value` is not a live,
    /// uninitialized data wrapper.
    pub fn data_init(&mut self, value: Value, ptr: *mut c_void, ty: &'static DataType) -> bool {
        let Value::Data(r) = value else {
            return false;
        };
        match self.body_mut(r) {
            Some(ObjectBody::Data(data)) if data.ty.is_none() => {
                data.ptr = ptr;
                data.ty = Some(ty);
                true
            }
            _ => false,
        }
    }

    /// Extract the pointer from a data wrapper, checking its type descriptor
    #[must_use]
    pub fn data_ptr(&self, value: Value, ty: &'static DataType) -> Option<*mut c_void> {
        let Value::Data(r) = value else {
            return None;
        };
        match self.body(r) {
            Some(ObjectBody::Data(data)) if data.ty.is_some_and(|t| std::ptr::eq(t, ty)) => {
                Some(data.ptr)
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Predicates and generic accessors
    // ------------------------------------------------------------------

    /// Whether `value` is a range excluding its end; false for everything else
    #[must_use]
    pub fn is_exclusive_range(&self, value: Value) -> bool {
        match value {
            Value::Range(r) => match self.body(r) {
                Some(ObjectBody::Range(range)) => range.exclusive,
                _ => false,
            },
            _ => false,
        }
    }

    /// Whether `value` is frozen.
    ///
    /// Immediates are inherently frozen; heap values consult the header.
    #[must_use]
    pub fn is_frozen(&self, value: Value) -> bool {
        match value.heap_ref() {
            Some(r) => self.heap.header(r).is_some_and(|h| h.is_frozen()),
            None => true,
        }
    }

    /// Freeze a value; a no-op on immediates
    pub fn freeze(&mut self, value: Value) -> Value {
        if let Some(r) = value.heap_ref() {
            self.heap.freeze(r);
        }
        value
    }

    /// Element count of an ordered sequence, with full tag checking.
    ///
    /// Raises TypeError for anything that is not a live array.
    pub fn sequence_len(&mut self, value: Value) -> Result<usize, Unwind> {
        if let Value::Array(r) = value
            && let Some(ObjectBody::Array(items)) = self.body(r)
        {
            return Ok(items.len());
        }
        let message = format!(
            "no implicit conversion of {} into Array",
            value.kind().name()
        );
        Err(self.raise_class(self.core.type_error, &message))
    }

    // ------------------------------------------------------------------
    // Instance variables
    // ------------------------------------------------------------------

    /// Read an instance variable; nil when missing or not an instance
    #[must_use]
    pub fn ivar_get(&self, value: Value, name: Sym) -> Value {
        match value {
            Value::Object(r) => match self.body(r) {
                Some(ObjectBody::Instance(obj)) => {
                    obj.ivars.get(&name).copied().unwrap_or(Value::Nil)
                }
                _ => Value::Nil,
            },
            _ => Value::Nil,
        }
    }

    /// Write an instance variable.
    ///
    /// Raises FrozenError on a frozen receiver and TypeError on receivers
    /// that cannot hold instance variables.
    pub fn ivar_set(&mut self, value: Value, name: Sym, ivar: Value) -> Result<(), Unwind> {
        if self.is_frozen(value) {
            let message = format!("can't modify frozen {}", value.kind().name());
            return Err(self.raise_class(self.core.frozen_error, &message));
        }
        if let Value::Object(r) = value
            && let Some(ObjectBody::Instance(obj)) = self.body_mut(r)
        {
            obj.ivars.insert(name, ivar);
            return Ok(());
        }
        let message = format!(
            "can't define instance variable on {}",
            value.kind().name()
        );
        Err(self.raise_class(self.core.type_error, &message))
    }

    // ------------------------------------------------------------------
    // Exceptions
    // ------------------------------------------------------------------

    /// Raise an exception of the class registered under `class_name`.
    ///
    /// Missing classes are themselves a NameError raise, exactly like the
    /// lookup the interpreter would perform.
    pub fn raise(&mut self, class_name: &str, message: &str) -> Unwind {
        match self.class_get(class_name) {
            Ok(class) => self.raise_class(class, message),
            Err(unwind) => unwind,
        }
    }

    /// Raise an exception of a known class descriptor
    pub fn raise_class(&mut self, class: ObjRef, message: &str) -> Unwind {
        let r = self.alloc(ObjectBody::Exception(ExceptionBox {
            class,
            message: message.to_string(),
        }));
        let value = Value::Exception(r);
        self.exc = Some(value);
        Unwind::new(value, self.class_name(class), message)
    }

    /// Re-raise the pending exception; a no-op when none is pending
    pub fn raise_pending(&self) -> Result<(), Unwind> {
        match self.exc {
            Some(value) => {
                let (class, message) = match value {
                    Value::Exception(r) => match self.body(r) {
                        Some(ObjectBody::Exception(exc)) => {
                            (self.class_name(exc.class).to_string(), exc.message.clone())
                        }
                        _ => (self.class_name(self.core.exception).to_string(), String::new()),
                    },
                    other => (self.class_name(self.class_of(other)).to_string(), String::new()),
                };
                Err(Unwind::new(value, class, message))
            }
            None => Ok(()),
        }
    }

    /// The pending exception, if any
    #[must_use]
    pub fn pending_exception(&self) -> Option<Value> {
        self.exc
    }

    /// Clear and return the pending exception
    pub fn take_pending_exception(&mut self) -> Option<Value> {
        self.exc.take()
    }

    // ------------------------------------------------------------------
    // Garbage collector
    // ------------------------------------------------------------------

    /// Run a full collection cycle.
    ///
    /// Persistent roots are the constant table and the pending exception;
    /// the arena and manual marks are handled by the heap. Returns objects
    /// swept; zero while collection is disabled.
    pub fn garbage_collect(&mut self) -> usize {
        let mut roots: Vec<ObjRef> = self.constants.values().copied().collect();
        if let Some(r) = self.exc.and_then(Value::heap_ref) {
            roots.push(r);
        }
        self.heap.collect(roots)
    }

    /// Save the temporary-root arena height
    #[must_use]
    pub fn arena_save(&self) -> ArenaIndex {
        self.heap.arena_save()
    }

    /// Rewind the arena to a previously saved checkpoint
    pub fn arena_restore(&mut self, index: ArenaIndex) {
        self.heap.arena_restore(index);
    }

    /// Disable collection; returns whether it was enabled before
    pub fn gc_disable(&mut self) -> bool {
        self.heap.disable()
    }

    /// Enable collection; returns whether it was enabled before
    pub fn gc_enable(&mut self) -> bool {
        self.heap.enable()
    }

    /// Register a heap ref as a root for the next collection cycle
    pub fn gc_mark(&mut self, r: ObjRef) {
        self.heap.mark_extra(r);
    }

    /// Whether a heap ref points at a swept-but-not-reclaimed object
    #[must_use]
    pub fn object_is_dead(&self, r: ObjRef) -> bool {
        self.heap.is_dead(r)
    }

    /// Running count of live heap objects
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.heap.live_objects()
    }

    /// Collection statistics
    #[must_use]
    pub fn gc_stats(&self) -> &GcStats {
        self.heap.stats()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_installs_core_classes() {
        let mut state = State::new();
        let core = *state.core_classes();

        assert_eq!(state.class_get("Object").unwrap(), core.object);
        assert_eq!(state.class_get("StandardError").unwrap(), core.standard_error);
        assert_eq!(state.class_name(core.type_error), "TypeError");

        // Bootstrap left nothing on the arena; core classes survive on the
        // constant table alone
        let live_before = state.live_objects();
        state.garbage_collect();
        assert_eq!(state.live_objects(), live_before);
    }

    #[test]
    fn test_class_get_unknown_raises_name_error() {
        let mut state = State::new();
        let err = state.class_get("NoSuchThing").unwrap_err();
        assert_eq!(err.class_name(), "NameError");
        assert!(err.message().contains("NoSuchThing"));
        assert!(state.pending_exception().is_some());
    }

    #[test]
    fn test_define_class_defaults_superclass_to_object() {
        let mut state = State::new();
        let cls = state.define_class("Widget", None);
        match state.body(cls) {
            Some(ObjectBody::Class(c)) => {
                assert_eq!(c.superclass, Some(state.core_classes().object));
            }
            other => panic!("expected class body, got {other:?}"),
        }
        assert_eq!(state.class_get("Widget").unwrap(), cls);
    }

    #[test]
    fn test_class_of_immediates() {
        let state = State::new();
        let core = *state.core_classes();

        assert_eq!(state.class_of(Value::Nil), core.nil_class);
        assert_eq!(state.class_of(Value::True), core.true_class);
        assert_eq!(state.class_of(Value::False), core.false_class);
        assert_eq!(state.class_of(Value::Fixnum(1)), core.integer);
        assert_eq!(state.class_of(Value::Float(1.0)), core.float);
    }

    #[test]
    fn test_instance_creation_and_ivars() {
        let mut state = State::new();
        let cls = state.define_class("Point", None);
        let point = state.new_instance(cls).unwrap();
        assert_eq!(state.class_of(point), cls);

        let x = state.intern("@x");
        assert_eq!(state.ivar_get(point, x), Value::Nil);

        state.ivar_set(point, x, Value::Fixnum(3)).unwrap();
        assert_eq!(state.ivar_get(point, x), Value::Fixnum(3));
    }

    #[test]
    fn test_ivar_set_on_frozen_raises() {
        let mut state = State::new();
        let cls = state.define_class("Point", None);
        let point = state.new_instance(cls).unwrap();
        state.freeze(point);

        let x = state.intern("@x");
        let err = state.ivar_set(point, x, Value::True).unwrap_err();
        assert_eq!(err.class_name(), "FrozenError");
    }

    #[test]
    fn test_ivar_set_on_fixnum_raises_type_error() {
        let mut state = State::new();
        let x = state.intern("@x");
        // Immediates are frozen, so the frozen check fires first
        let err = state.ivar_set(Value::Fixnum(1), x, Value::True).unwrap_err();
        assert_eq!(err.class_name(), "FrozenError");
    }

    #[test]
    fn test_sequence_len_checked() {
        let mut state = State::new();
        let ary = state.new_array(vec![Value::Fixnum(1), Value::Fixnum(2)]);
        assert_eq!(state.sequence_len(ary).unwrap(), 2);

        let empty = state.new_array(Vec::new());
        assert_eq!(state.sequence_len(empty).unwrap(), 0);

        let err = state.sequence_len(Value::Fixnum(5)).unwrap_err();
        assert_eq!(err.class_name(), "TypeError");
        assert!(err.message().contains("Integer"));
    }

    #[test]
    fn test_raise_sets_pending_exception() {
        let mut state = State::new();
        let save = state.arena_save();
        let unwind = state.raise("RuntimeError", "boom");
        assert_eq!(unwind.class_name(), "RuntimeError");
        assert_eq!(unwind.message(), "boom");

        let pending = state.pending_exception().expect("exception pending");
        assert_eq!(pending, unwind.value());

        // The pending exception is a GC root even with its arena root gone
        state.arena_restore(save);
        state.garbage_collect();
        assert!(!state.object_is_dead(pending.heap_ref().unwrap()));

        assert_eq!(state.take_pending_exception(), Some(pending));
        assert!(state.raise_pending().is_ok());
    }

    #[test]
    fn test_raise_pending_rethrows() {
        let mut state = State::new();
        state.raise("ArgumentError", "wrong");
        let err = state.raise_pending().unwrap_err();
        assert_eq!(err.class_name(), "ArgumentError");
        assert_eq!(err.message(), "wrong");
    }

    #[test]
    fn test_raise_unknown_class_becomes_name_error() {
        let mut state = State::new();
        let unwind = state.raise("MissingError", "never built");
        assert_eq!(unwind.class_name(), "NameError");
    }

    #[test]
    fn test_data_lifecycle() {
        static WIDGET: DataType = DataType {
            name: "widget",
            free: None,
        };

        let mut state = State::new();
        let cls = state.define_class("Widget", None);
        assert!(state.set_instance_kind(cls, InstanceKind::Data));

        let wrapper = state.new_instance(cls).unwrap();
        assert!(matches!(wrapper, Value::Data(_)));

        let payload = Box::into_raw(Box::new(7u32)).cast::<c_void>();
        assert!(state.data_init(wrapper, payload, &WIDGET));
        // Double init is rejected
        assert!(!state.data_init(wrapper, payload, &WIDGET));

        assert_eq!(state.data_ptr(wrapper, &WIDGET), Some(payload));

        static OTHER: DataType = DataType {
            name: "other",
            free: None,
        };
        assert_eq!(state.data_ptr(wrapper, &OTHER), None);

        // SAFETY: reclaim the payload the test leaked into the wrapper
        unsafe { drop(Box::from_raw(payload.cast::<u32>())) };
    }

    #[test]
    fn test_data_finalizer_runs_on_sweep() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static FREED: AtomicUsize = AtomicUsize::new(0);

        unsafe fn free_payload(_ptr: *mut c_void) {
            FREED.fetch_add(1, Ordering::SeqCst);
        }

        static COUNTED: DataType = DataType {
            name: "counted",
            free: Some(free_payload),
        };

        let mut state = State::new();
        let cls = state.define_class("Counted", None);
        state.set_instance_kind(cls, InstanceKind::Data);

        let save = state.arena_save();
        let wrapper = state.new_instance(cls).unwrap();
        state.data_init(wrapper, std::ptr::NonNull::<u32>::dangling().as_ptr().cast(), &COUNTED);
        state.arena_restore(save);

        state.garbage_collect();
        assert_eq!(FREED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_proc() {
        fn add(state: &mut State, _receiver: Value, args: &[Value]) -> Result<Value, Unwind> {
            let (Some(a), Some(b)) = (args[0].as_fixnum(), args[1].as_fixnum()) else {
                let message = "integers required".to_string();
                return Err(state.raise("TypeError", &message));
            };
            Ok(Value::Fixnum(a + b))
        }

        let mut state = State::new();
        let adder = state.new_proc(add, 2);

        let sum = state
            .call_proc(adder, Value::Nil, &[Value::Fixnum(2), Value::Fixnum(3)])
            .unwrap();
        assert_eq!(sum, Value::Fixnum(5));

        let err = state
            .call_proc(adder, Value::Nil, &[Value::Fixnum(2)])
            .unwrap_err();
        assert_eq!(err.class_name(), "ArgumentError");

        let err = state
            .call_proc(Value::Nil, Value::Nil, &[])
            .unwrap_err();
        assert_eq!(err.class_name(), "TypeError");
    }

    #[test]
    fn test_range_predicate() {
        let mut state = State::new();
        let exclusive = state.new_range(Value::Fixnum(0), Value::Fixnum(5), true);
        let inclusive = state.new_range(Value::Fixnum(0), Value::Fixnum(5), false);

        assert!(state.is_exclusive_range(exclusive));
        assert!(!state.is_exclusive_range(inclusive));
        assert!(!state.is_exclusive_range(Value::Nil));
    }

    #[test]
    fn test_value_of_matches_body_kind() {
        let mut state = State::new();
        let ary = state.new_array(Vec::new());
        let r = ary.heap_ref().unwrap();
        assert_eq!(state.value_of(r), Some(ary));

        let s = state.new_string("hi");
        assert_eq!(state.value_of(s.heap_ref().unwrap()), Some(s));
    }

    #[test]
    fn test_collection_respects_roots_and_arena() {
        let mut state = State::new();
        let save = state.arena_save();
        let doomed = state.new_array(Vec::new());
        let kept_cls = state.define_class("Keeper", None);
        state.arena_restore(save);

        state.garbage_collect();

        assert!(state.object_is_dead(doomed.heap_ref().unwrap()));
        // Registered classes survive through the constant table
        assert!(!state.object_is_dead(kept_cls));
    }
}
