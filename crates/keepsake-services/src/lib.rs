//! Keepsake services
//!
//! Guest-facing flows built on the storage and metadata collaborators:
//! the gallery with its background reconciliation sweep, the local session
//! cache and the shared event password gate.

pub mod gallery;
pub mod gate;
pub mod session;

pub use gallery::{
    ExistenceProbe, GalleryEntry, GalleryReconciler, GallerySession, HttpProbe, ProbeError,
    ProbeTarget, ReconcilerSettings, StorageProbe, SweepSummary,
};
pub use gate::{EventGate, GateError};
pub use session::{
    Clock, FileSessionStore, Fingerprint, MemorySessionStore, SessionCache, SessionError,
    SessionStore, SystemClock,
};
