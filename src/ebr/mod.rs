//! Epoch Based Reclamation (EBR), backed by `crossbeam-epoch`. Nodes that are unlinked from a
//! structure are handed to the current `Guard`, and are only freed once every thread that was
//! pinned at the time has moved on. The overhead is very low compared to eg. Hazard Pointers.
//!
//! Operations pin the current thread on their own. Operations returning borrowed data take the
//! `Guard` explicitly, so that the borrow cannot outlive the pin.

pub mod list;
pub mod queue;

pub use crossbeam::epoch::{pin, Guard};
