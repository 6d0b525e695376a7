//! Symbol interning

use rustc_hash::FxHashMap;

/// Interned symbol id.
///
/// Ids are dense and stable for the lifetime of the interning table; two
/// symbols are equal exactly when their names are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sym(u32);

impl Sym {
    /// Wrap a raw symbol id produced by [`SymbolTable::intern`]
    #[must_use]
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// The raw id
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Name ↔ id table for symbols
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<Box<str>>,
    ids: FxHashMap<Box<str>, Sym>,
}

impl SymbolTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning its id; idempotent per name
    pub fn intern(&mut self, name: &str) -> Sym {
        if let Some(&sym) = self.ids.get(name) {
            return sym;
        }
        let sym = Sym(u32::try_from(self.names.len()).expect("symbol id overflow"));
        let name: Box<str> = name.into();
        self.names.push(name.clone());
        self.ids.insert(name, sym);
        sym
    }

    /// Resolve an id back to its name
    #[must_use]
    pub fn name(&self, sym: Sym) -> Option<&str> {
        self.names.get(sym.0 as usize).map(AsRef::as_ref)
    }

    /// Number of interned symbols
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no symbols have been interned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern("length");
        let b = table.intern("length");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_distinct_names_distinct_ids() {
        let mut table = SymbolTable::new();
        let a = table.intern("first");
        let b = table.intern("last");
        assert_ne!(a, b);
        assert_eq!(table.name(a), Some("first"));
        assert_eq!(table.name(b), Some("last"));
    }

    #[test]
    fn test_unknown_id_has_no_name() {
        let table = SymbolTable::new();
        assert_eq!(table.name(Sym::from_raw(5)), None);
    }
}
