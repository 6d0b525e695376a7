//! Scoped pairing of save/restore and disable/enable
//!
//! The collector's arena checkpoints and enable flag are instance-wide
//! state with a LIFO discipline the interpreter does not validate. These
//! guards make the pairing structural: the restoring half runs on drop, in
//! reverse declaration order.

use std::ops::{Deref, DerefMut};

use stoat_core::State;
use stoat_gc::ArenaIndex;

/// Arena checkpoint that restores itself on drop.
///
/// Values allocated while the savepoint is live are temporary-rooted; once
/// it drops they are eligible for collection unless reachable elsewhere.
pub struct ArenaSavepoint<'a> {
    state: &'a mut State,
    index: ArenaIndex,
}

impl<'a> ArenaSavepoint<'a> {
    /// Save the current arena height
    pub fn new(state: &'a mut State) -> Self {
        let index = state.arena_save();
        Self { state, index }
    }

    /// The saved checkpoint token
    #[must_use]
    pub fn index(&self) -> ArenaIndex {
        self.index
    }
}

impl Deref for ArenaSavepoint<'_> {
    type Target = State;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl DerefMut for ArenaSavepoint<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl Drop for ArenaSavepoint<'_> {
    fn drop(&mut self) {
        self.state.arena_restore(self.index);
    }
}

/// Scoped suspension of collection.
///
/// Disables the collector on creation and restores the *previous* state on
/// drop, so nesting a pause inside an already-paused region does not
/// re-enable collection early.
pub struct GcPause<'a> {
    state: &'a mut State,
    was_enabled: bool,
}

impl<'a> GcPause<'a> {
    /// Disable collection, remembering whether it was enabled
    pub fn new(state: &'a mut State) -> Self {
        let was_enabled = state.gc_disable();
        Self { state, was_enabled }
    }
}

impl Deref for GcPause<'_> {
    type Target = State;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl DerefMut for GcPause<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl Drop for GcPause<'_> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.state.gc_enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoat_core::Value;

    #[test]
    fn test_savepoint_restores_on_drop() {
        let mut state = State::new();
        let doomed;
        {
            let mut arena = ArenaSavepoint::new(&mut state);
            doomed = arena.new_array(Vec::new());
        }
        state.garbage_collect();
        assert!(state.object_is_dead(doomed.heap_ref().unwrap()));
    }

    #[test]
    fn test_savepoint_spares_earlier_roots() {
        let mut state = State::new();
        let kept = state.new_array(vec![Value::Fixnum(1)]);
        {
            let mut arena = ArenaSavepoint::new(&mut state);
            arena.new_string("scratch");
        }
        state.garbage_collect();
        assert!(!state.object_is_dead(kept.heap_ref().unwrap()));
    }

    #[test]
    fn test_gc_pause_restores_previous_state() {
        let mut state = State::new();
        {
            let _pause = GcPause::new(&mut state);
        }
        // Was enabled before the pause; enabled again after
        assert!(state.gc_disable());
        state.gc_enable();
    }

    #[test]
    fn test_nested_pause_stays_disabled() {
        let mut state = State::new();
        state.gc_disable();
        {
            let _pause = GcPause::new(&mut state);
        }
        // The outer disable is still in effect
        assert!(!state.gc_enable());
    }
}
