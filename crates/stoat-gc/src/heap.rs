//! Heap storage, rooting arena, and the mark-sweep cycle

use rustc_hash::FxHashSet;

use crate::object::{GcHeader, MarkColor, SlotState, Trace};

/// Collection trigger floor; the threshold never drops below this
const MIN_GC_THRESHOLD: usize = 1024;

/// Reference to a heap slot.
///
/// Only ever produced by [`Heap::alloc`]; a ref is meaningful solely against
/// the heap that handed it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(u32);

impl ObjRef {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque checkpoint token for the temporary-root arena.
///
/// Returned by [`Heap::arena_save`] and consumed by [`Heap::arena_restore`].
/// Checkpoints must be restored in LIFO order; the heap does not validate
/// nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaIndex(usize);

/// Collection statistics
#[derive(Debug, Default, Clone)]
pub struct GcStats {
    /// Number of collections performed
    pub collections: u64,
    /// Objects swept in the last collection
    pub last_swept: usize,
    /// Objects swept across all collections
    pub total_swept: u64,
}

struct Slot<T> {
    header: GcHeader,
    body: Option<T>,
}

/// Mark-sweep heap for one interpreter instance.
///
/// Every allocation pushes the new ref onto the temporary-root arena, so a
/// value is protected from collection until the arena is restored past its
/// save point or the value becomes reachable from a persistent root.
pub struct Heap<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    arena: Vec<ObjRef>,
    /// Roots registered via [`Heap::mark_extra`]; consumed by the next cycle
    pending_marks: FxHashSet<ObjRef>,
    disabled: bool,
    live: usize,
    threshold: usize,
    stats: GcStats,
}

impl<T: Trace> Heap<T> {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::with_threshold(MIN_GC_THRESHOLD)
    }

    /// Create an empty heap with a custom collection threshold
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            arena: Vec::new(),
            pending_marks: FxHashSet::default(),
            disabled: false,
            live: 0,
            threshold: threshold.max(1),
            stats: GcStats::default(),
        }
    }

    /// Allocate a new object and root it on the arena
    pub fn alloc(&mut self, body: T) -> ObjRef {
        let r = match self.free.pop() {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                slot.header = GcHeader::new();
                slot.body = Some(body);
                ObjRef(idx)
            }
            None => {
                let idx = u32::try_from(self.slots.len()).expect("heap slot index overflow");
                self.slots.push(Slot {
                    header: GcHeader::new(),
                    body: Some(body),
                });
                ObjRef(idx)
            }
        };
        self.live += 1;
        self.arena.push(r);
        r
    }

    /// Borrow a live object body; `None` if the ref is dead or dangling
    pub fn get(&self, r: ObjRef) -> Option<&T> {
        let slot = self.slots.get(r.index())?;
        match slot.header.state() {
            SlotState::Live => slot.body.as_ref(),
            SlotState::Dead => None,
        }
    }

    /// Mutably borrow a live object body
    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut T> {
        let slot = self.slots.get_mut(r.index())?;
        match slot.header.state() {
            SlotState::Live => slot.body.as_mut(),
            SlotState::Dead => None,
        }
    }

    /// Borrow an object's header; `None` only for a dangling ref.
    ///
    /// Dead slots still have a header; that is what makes the dead state
    /// observable.
    pub fn header(&self, r: ObjRef) -> Option<&GcHeader> {
        self.slots.get(r.index()).map(|slot| &slot.header)
    }

    /// Set the frozen flag on a live object
    pub fn freeze(&mut self, r: ObjRef) {
        if let Some(slot) = self.slots.get_mut(r.index())
            && slot.header.state() == SlotState::Live
        {
            slot.header.set_frozen();
        }
    }

    /// Whether the ref points at a swept-but-not-reclaimed slot.
    ///
    /// Dangling and out-of-range refs read as dead.
    pub fn is_dead(&self, r: ObjRef) -> bool {
        match self.slots.get(r.index()) {
            Some(slot) => slot.header.state() == SlotState::Dead,
            None => true,
        }
    }

    /// Running count of live objects
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Collection statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Save the current arena height as a checkpoint
    pub fn arena_save(&self) -> ArenaIndex {
        ArenaIndex(self.arena.len())
    }

    /// Rewind the arena to a checkpoint, releasing roots registered after it
    pub fn arena_restore(&mut self, index: ArenaIndex) {
        self.arena.truncate(index.0);
    }

    /// Disable collection; returns whether collection was enabled before
    pub fn disable(&mut self) -> bool {
        let was_enabled = !self.disabled;
        self.disabled = true;
        was_enabled
    }

    /// Enable collection; returns whether collection was enabled before
    pub fn enable(&mut self) -> bool {
        let was_enabled = !self.disabled;
        self.disabled = false;
        was_enabled
    }

    /// Whether collection is currently enabled
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Register a root for the next collection cycle.
    ///
    /// For objects reachable only through host memory, outside the arena and
    /// the caller-supplied root set. Consumed by the cycle that uses it.
    pub fn mark_extra(&mut self, r: ObjRef) {
        self.pending_marks.insert(r);
    }

    /// Whether enough has been allocated to warrant a collection
    pub fn should_collect(&self) -> bool {
        !self.disabled && self.live >= self.threshold
    }

    /// Run a full mark-sweep cycle.
    ///
    /// Roots are the caller-supplied set, the arena, and any pending manual
    /// marks. Returns the number of objects swept; zero (and no work) while
    /// collection is disabled.
    pub fn collect<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = ObjRef>,
    {
        if self.disabled {
            return 0;
        }

        let mut worklist: Vec<ObjRef> = roots.into_iter().collect();
        worklist.extend(self.arena.iter().copied());
        worklist.extend(self.pending_marks.drain());

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "stoat::gc",
            roots = worklist.len(),
            live = self.live,
            "GC cycle starting"
        );

        // Mark: gray on entry to the worklist, black once scanned
        while let Some(r) = worklist.pop() {
            let idx = r.index();
            let Some(slot) = self.slots.get_mut(idx) else {
                continue;
            };
            if slot.header.state() != SlotState::Live || slot.header.mark() != MarkColor::White {
                continue;
            }
            slot.header.set_mark(MarkColor::Gray);
            if let Some(body) = &self.slots[idx].body {
                body.trace(&mut |child| worklist.push(child));
            }
            self.slots[idx].header.set_mark(MarkColor::Black);
        }

        // Sweep: white live slots die, survivors reset to white
        let mut swept = 0usize;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.header.state() != SlotState::Live {
                continue;
            }
            if slot.header.mark() == MarkColor::White {
                slot.body = None;
                slot.header.set_state(SlotState::Dead);
                self.free.push(idx as u32);
                swept += 1;
            } else {
                slot.header.set_mark(MarkColor::White);
            }
        }

        self.live -= swept;
        self.threshold = (self.live * 2).max(MIN_GC_THRESHOLD);
        self.stats.collections += 1;
        self.stats.last_swept = swept;
        self.stats.total_swept += swept as u64;

        #[cfg(feature = "gc_logging")]
        tracing::info!(
            target: "stoat::gc",
            collection = self.stats.collections,
            swept,
            live = self.live,
            "GC cycle complete"
        );

        swept
    }
}

impl<T: Trace> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}
