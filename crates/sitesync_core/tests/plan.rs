use pretty_assertions::assert_eq;
use sitesync_core::{
    plan_sync, DocEvent, DocStatus, ProcessReason, RemoteDocument, SyncAction, SyncState,
};

fn doc(id: &str, name: &str, modified: &str) -> RemoteDocument {
    RemoteDocument::new(id, name, modified)
}

#[test]
fn new_changed_missing_and_unchanged_are_classified() {
    site_logging::initialize_for_tests();
    let mut state = SyncState::new();
    state.set_marker("same", "2024-01-01T00:00:00Z");
    state.set_marker("changed", "2024-01-01T00:00:00Z");
    state.set_marker("missing", "2024-01-01T00:00:00Z");
    state.set_marker("gone", "2024-01-01T00:00:00Z");

    let docs = vec![
        doc("same", "Same", "2024-01-01T00:00:00Z"),
        doc("changed", "Changed", "2024-02-01T00:00:00Z"),
        doc("missing", "Missing", "2024-01-01T00:00:00Z"),
        doc("new", "New", "2024-03-01T00:00:00Z"),
    ];
    let plan = plan_sync(docs, &state, |name| !name.contains("missing"));

    let actions: Vec<_> = plan.documents.iter().map(|p| p.action).collect();
    assert_eq!(
        actions,
        vec![
            SyncAction::Skip,
            SyncAction::Process(ProcessReason::Changed),
            SyncAction::Process(ProcessReason::OutputMissing),
            SyncAction::Process(ProcessReason::New),
        ]
    );
    assert_eq!(plan.unlisted_ids, vec!["gone".to_string()]);
    assert_eq!(plan.to_process(), 3);
    assert_eq!(plan.documents[3].status, DocStatus::Unseen);
    assert_eq!(plan.documents[0].status, DocStatus::Synced);
    assert!(plan
        .expected_filenames()
        .contains("2024-03-01-00-00-00-new.html"));
}

#[test]
fn placeholder_documents_are_retried() {
    site_logging::initialize_for_tests();
    let mut state = SyncState::new();
    state.set_marker("p", "2024-01-01T00:00:00Z");
    state.set_placeholder("p", true);

    let plan = plan_sync(vec![doc("p", "P", "2024-01-01T00:00:00Z")], &state, |_| true);
    assert_eq!(
        plan.documents[0].action,
        SyncAction::Process(ProcessReason::RetryPlaceholder)
    );
}

#[test]
fn status_transitions_follow_lifecycle() {
    assert_eq!(DocStatus::Unseen.advance(DocEvent::Processed), DocStatus::Synced);
    assert_eq!(DocStatus::Synced.advance(DocEvent::Processed), DocStatus::Synced);
    assert_eq!(DocStatus::Synced.advance(DocEvent::Failed), DocStatus::Synced);
    assert_eq!(DocStatus::Unseen.advance(DocEvent::Failed), DocStatus::Unseen);
    assert_eq!(DocStatus::Synced.advance(DocEvent::Unlisted), DocStatus::Absent);
    assert_eq!(DocStatus::Absent.advance(DocEvent::Processed), DocStatus::Synced);
}
