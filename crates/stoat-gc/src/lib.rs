//! # Stoat VM Garbage Collector
//!
//! Slot-based mark-sweep heap for a single interpreter instance.
//!
//! ## Design
//!
//! - **Slot storage**: objects live in indexed slots; a swept slot keeps its
//!   header in the dead state until the slot is reused
//! - **Arena rooting**: every allocation pushes a temporary root onto an
//!   arena stack; callers bracket call sequences with save/restore
//! - **Tri-color marking**: white/gray/black header marks, worklist driven
//! - **Manual marks**: roots reachable only through host memory can be
//!   registered per cycle
//!
//! The heap is generic over the object body type so the value layer can
//! define its own payloads; bodies report outgoing references through
//! [`Trace`].

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod heap;
pub mod object;

pub use heap::{ArenaIndex, GcStats, Heap, ObjRef};
pub use object::{GcHeader, MarkColor, SlotState, Trace};
