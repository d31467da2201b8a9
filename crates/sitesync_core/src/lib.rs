//! Sitesync core: pure sync planning, naming and state bookkeeping.
mod document;
mod entry;
mod filename;
mod plan;
mod state;

pub use document::RemoteDocument;
pub use entry::IndexEntry;
pub use filename::{
    assign_post_filenames, classify_generated, is_part_filename, media_dir_name, part_filename,
    post_basename, post_stem, slugify_title, GeneratedFile,
};
pub use plan::{plan_sync, DocEvent, DocStatus, PlannedDocument, ProcessReason, SyncAction, SyncPlan};
pub use state::SyncState;
