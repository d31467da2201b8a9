use std::collections::BTreeSet;

use crate::{assign_post_filenames, RemoteDocument, SyncState};

/// Lifecycle of one remote document as seen by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStatus {
    Unseen,
    Synced,
    Absent,
}

/// Inputs that move a document between [`DocStatus`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocEvent {
    /// The document was rendered and recorded in state.
    Processed,
    /// Processing failed; whatever was published before stays.
    Failed,
    /// The document no longer appears in the remote listing.
    Unlisted,
}

impl DocStatus {
    pub fn from_state(state: &SyncState, id: &str) -> Self {
        if state.marker(id).is_some() {
            DocStatus::Synced
        } else {
            DocStatus::Unseen
        }
    }

    /// Pure transition function. `Absent` is terminal until the id is listed
    /// and processed again, at which point it behaves like a new document.
    pub fn advance(self, event: DocEvent) -> DocStatus {
        match (self, event) {
            (_, DocEvent::Unlisted) => DocStatus::Absent,
            (_, DocEvent::Processed) => DocStatus::Synced,
            (status, DocEvent::Failed) => status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessReason {
    /// No state entry for this id.
    New,
    /// Remote modifiedTime differs from the recorded marker.
    Changed,
    /// Marker matches but the expected post file is not on disk.
    OutputMissing,
    /// Last run could only produce a placeholder; try the export again.
    RetryPlaceholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Skip,
    Process(ProcessReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDocument {
    pub document: RemoteDocument,
    /// Expected post filename, recomputed from the current listing.
    pub filename: String,
    pub status: DocStatus,
    pub action: SyncAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncPlan {
    pub documents: Vec<PlannedDocument>,
    /// Ids present in state but missing from the listing.
    pub unlisted_ids: Vec<String>,
}

impl SyncPlan {
    pub fn live_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|planned| planned.document.id.as_str())
    }

    pub fn expected_filenames(&self) -> BTreeSet<&str> {
        self.documents
            .iter()
            .map(|planned| planned.filename.as_str())
            .collect()
    }

    pub fn to_process(&self) -> usize {
        self.documents
            .iter()
            .filter(|planned| matches!(planned.action, SyncAction::Process(_)))
            .count()
    }
}

/// Diffs the remote listing against the recorded state.
///
/// `output_exists` is asked about the expected filename of documents whose
/// marker matches; keeping the filesystem probe outside makes the diff pure.
pub fn plan_sync<F>(documents: Vec<RemoteDocument>, state: &SyncState, output_exists: F) -> SyncPlan
where
    F: Fn(&str) -> bool,
{
    let filenames = assign_post_filenames(&documents);
    let listed: BTreeSet<&str> = documents.iter().map(|doc| doc.id.as_str()).collect();
    let unlisted_ids = state
        .document_ids()
        .into_iter()
        .filter(|id| !listed.contains(id))
        .map(ToOwned::to_owned)
        .collect();

    let documents = documents
        .into_iter()
        .zip(filenames)
        .map(|(document, filename)| {
            let status = DocStatus::from_state(state, &document.id);
            let action = match state.marker(&document.id) {
                None => SyncAction::Process(ProcessReason::New),
                Some(marker) if marker != document.modified_time => {
                    SyncAction::Process(ProcessReason::Changed)
                }
                Some(_) if !output_exists(&filename) => {
                    SyncAction::Process(ProcessReason::OutputMissing)
                }
                Some(_) if state.is_placeholder(&document.id) => {
                    SyncAction::Process(ProcessReason::RetryPlaceholder)
                }
                Some(_) => SyncAction::Skip,
            };
            PlannedDocument {
                document,
                filename,
                status,
                action,
            }
        })
        .collect();

    SyncPlan {
        documents,
        unlisted_ids,
    }
}
