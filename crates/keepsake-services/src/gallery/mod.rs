//! Gallery listing and orphan reconciliation.

pub mod probe;
pub mod reconciler;
pub mod view;

pub use probe::{ExistenceProbe, HttpProbe, ProbeError, ProbeTarget, StorageProbe};
pub use reconciler::{GalleryReconciler, GallerySession, ReconcilerSettings, SweepSummary};
pub use view::{is_heic_name, is_video_name, memories_label, GalleryEntry};
