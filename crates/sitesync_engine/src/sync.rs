use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use site_logging::{site_debug, site_error, site_info, site_warn};
use sitesync_core::{
    classify_generated, part_filename, plan_sync, post_stem, DocEvent, DocStatus, GeneratedFile,
    PlannedDocument, RemoteDocument, SyncAction, SyncPlan, SyncState,
};
use thiserror::Error;

use crate::chunk::chunk_html;
use crate::config::SyncSettings;
use crate::decode::{decode_html, decode_lossy};
use crate::listing::{update_listing_page, ListingError};
use crate::media::localize_media;
use crate::normalize::{text_to_html, DocsNormalizer, Normalizer};
use crate::persist::{ensure_output_dir, remove_path, AtomicFileWriter, PersistError, WriteOutcome};
use crate::preview::summarize_html;
use crate::render::{placeholder_body, render_post, ListingItem, PostPage};
use crate::retry::with_retry;
use crate::source::{ExportFormat, RemoteSource};
use crate::state_store::StateStore;
use crate::{ContentSource, FetchError};

/// Run-level failures; everything per document is absorbed into the report.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot list remote documents: {0}")]
    Listing(FetchError),
    #[error("output directory unusable: {0}")]
    OutputDir(PersistError),
}

/// Failure of a single document. Logged and counted, never propagated.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot write output: {0}")]
    Persist(#[from] PersistError),
    #[error("cannot inspect output directory: {0}")]
    Io(#[from] std::io::Error),
}

/// What one run did, by document name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub listed: usize,
    /// Every document rendered this run, whatever tier produced its body.
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub fallback: Vec<String>,
    pub placeholder: Vec<String>,
    /// `(name, error)` of documents whose previous output was kept.
    pub failed: Vec<(String, String)>,
    pub pruned_ids: Vec<String>,
    /// Generated artifacts deleted (or, in a dry run, that would be).
    pub removed_files: Vec<String>,
    /// Lifecycle status per document id after this run.
    pub statuses: BTreeMap<String, DocStatus>,
    pub listing_updated: bool,
    pub state_saved: bool,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn summary_line(&self) -> String {
        format!(
            "{} listed, {} processed ({} fallback, {} placeholder), {} skipped, {} failed, {} pruned, {} files removed",
            self.listed,
            self.processed.len(),
            self.fallback.len(),
            self.placeholder.len(),
            self.skipped.len(),
            self.failed.len(),
            self.pruned_ids.len(),
            self.removed_files.len(),
        )
    }
}

struct RenderedDocument {
    summary: String,
    source: ContentSource,
}

/// Mirrors a remote folder into the posts directory.
pub struct Synchronizer {
    source: Arc<dyn RemoteSource>,
    normalizer: Box<dyn Normalizer>,
    settings: SyncSettings,
    writer: AtomicFileWriter,
    store: StateStore,
}

impl Synchronizer {
    pub fn new(source: Arc<dyn RemoteSource>, settings: SyncSettings) -> Self {
        Self {
            source,
            normalizer: Box::new(DocsNormalizer),
            writer: AtomicFileWriter::new(settings.posts_dir.clone()),
            store: StateStore::new(settings.state_file.clone()),
            settings,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let settings = &self.settings;
        let documents = with_retry(settings.retry, "document listing", || {
            self.source.list_documents()
        })
        .await
        .map_err(SyncError::Listing)?;
        site_info!("Listed {} remote documents", documents.len());

        if !settings.dry_run {
            ensure_output_dir(&settings.posts_dir).map_err(SyncError::OutputDir)?;
        }

        let mut state = self.store.load();
        let plan = plan_sync(documents, &state, |name| {
            settings.posts_dir.join(name).is_file()
        });
        site_debug!(
            "{} of {} documents need processing",
            plan.to_process(),
            plan.documents.len()
        );

        let mut report = SyncReport {
            listed: plan.documents.len(),
            dry_run: settings.dry_run,
            ..SyncReport::default()
        };
        let mut items = Vec::with_capacity(plan.documents.len());
        let mut protected = BTreeSet::new();

        for planned in &plan.documents {
            let document = &planned.document;
            let name = document.title().to_string();
            let event = match planned.action {
                SyncAction::Skip => {
                    site_debug!("Unchanged: {}", name);
                    report.skipped.push(name);
                    items.push(self.listing_item(
                        document,
                        &planned.filename,
                        state.summary(&document.id).unwrap_or_default(),
                    ));
                    None
                }
                SyncAction::Process(reason) => {
                    site_info!("Processing {} ({:?})", name, reason);
                    match self.process_document(planned).await {
                        Ok(rendered) => {
                            match rendered.source {
                                ContentSource::Primary => {}
                                ContentSource::Fallback => report.fallback.push(name.clone()),
                                ContentSource::Placeholder => report.placeholder.push(name.clone()),
                            }
                            report.processed.push(name);
                            state.set_marker(&document.id, &document.modified_time);
                            state.set_summary(&document.id, &rendered.summary);
                            state.set_file(&document.id, &planned.filename);
                            state.set_placeholder(
                                &document.id,
                                rendered.source == ContentSource::Placeholder,
                            );
                            items.push(self.listing_item(
                                document,
                                &planned.filename,
                                &rendered.summary,
                            ));
                            Some(DocEvent::Processed)
                        }
                        Err(err) => {
                            site_error!("Failed to sync {}: {}", name, err);
                            report.failed.push((name, err.to_string()));
                            if let Some(previous) = state.file(&document.id) {
                                protected.insert(previous.to_string());
                                items.push(self.listing_item(
                                    document,
                                    previous,
                                    state.summary(&document.id).unwrap_or_default(),
                                ));
                            }
                            Some(DocEvent::Failed)
                        }
                    }
                }
            };
            let status = event.map_or(planned.status, |event| planned.status.advance(event));
            report.statuses.insert(document.id.clone(), status);
        }

        for id in &plan.unlisted_ids {
            let status = DocStatus::from_state(&state, id).advance(DocEvent::Unlisted);
            report.statuses.insert(id.clone(), status);
        }
        report.pruned_ids = state.prune(plan.live_ids());
        for id in &report.pruned_ids {
            site_info!("Pruned state for removed document {}", id);
        }

        report.removed_files = self.prune_orphans(&plan, &protected);

        if settings.dry_run {
            site_info!("Dry run: state and listing page left untouched");
        } else {
            report.state_saved = self.save_state(&state);
            report.listing_updated = self.update_listing(&mut items);
        }

        site_info!("Sync finished: {}", report.summary_line());
        Ok(report)
    }

    async fn process_document(&self, planned: &PlannedDocument) -> Result<RenderedDocument, DocumentError> {
        let settings = &self.settings;
        let document = &planned.document;
        let (body, source) = self.extract_body(document, &planned.filename).await?;
        let summary = match source {
            ContentSource::Placeholder => String::new(),
            _ => summarize_html(&body),
        };

        let chunks = if body.len() >= settings.large_doc_threshold {
            chunk_html(&body, settings.chunk_size)
        } else {
            vec![body]
        };
        let parts: Vec<String> = if chunks.len() > 1 {
            (1..=chunks.len())
                .map(|n| part_filename(&planned.filename, n))
                .collect()
        } else {
            Vec::new()
        };
        if !parts.is_empty() {
            site_info!("{} split into {} parts", document.title(), parts.len());
        }

        let page = render_post(&PostPage {
            title: document.title(),
            author: &settings.author,
            date: &document.display_date(),
            description: &summary,
            site_name: &settings.site_name,
            content_html: &chunks[0],
            parts: &parts,
            prefetch: settings.prefetch_parts,
        });

        if settings.dry_run {
            site_info!("Dry run: would write {}", planned.filename);
        } else {
            for (part, chunk) in parts.iter().zip(&chunks) {
                self.writer.write_if_changed(part, chunk.as_bytes())?;
            }
            self.remove_stale_parts(&planned.filename, parts.len())?;
            if self.writer.write_if_changed(&planned.filename, page.as_bytes())? == WriteOutcome::Written {
                site_debug!("Wrote {}", planned.filename);
            }
        }

        Ok(RenderedDocument { summary, source })
    }

    /// Primary HTML export, then plain text, then a placeholder notice.
    async fn extract_body(
        &self,
        document: &RemoteDocument,
        filename: &str,
    ) -> Result<(String, ContentSource), DocumentError> {
        let settings = &self.settings;
        let name = document.title();

        match self.export(document, ExportFormat::Html).await {
            Ok(output) => match decode_html(&output.bytes, output.metadata.content_type.as_deref()) {
                Ok(decoded) => {
                    let media = if settings.download_media {
                        localize_media(
                            self.source.as_ref(),
                            settings.retry,
                            &decoded.html,
                            &settings.posts_dir,
                            filename,
                            settings.dry_run,
                        )
                        .await?
                        .map
                    } else {
                        Default::default()
                    };
                    let body = self.normalizer.normalize(&decoded.html, &media);
                    return Ok((body, ContentSource::Primary));
                }
                Err(err) => site_warn!("HTML export of {} is undecodable: {}", name, err),
            },
            Err(err) => site_warn!("HTML export of {} failed: {}", name, err),
        }

        match self.export(document, ExportFormat::PlainText).await {
            Ok(output) => {
                site_warn!("Using plain-text fallback for {}", name);
                let text = decode_lossy(&output.bytes);
                Ok((text_to_html(&text), ContentSource::Fallback))
            }
            Err(err) => {
                site_warn!("Plain-text export of {} failed: {}; writing placeholder", name, err);
                let link = self.source.document_link(&document.id);
                Ok((placeholder_body(name, &link), ContentSource::Placeholder))
            }
        }
    }

    async fn export(&self, document: &RemoteDocument, format: ExportFormat) -> Result<crate::FetchOutput, FetchError> {
        let what = format!("{:?} export of {}", format, document.title());
        with_retry(self.settings.retry, &what, || {
            self.source.export(&document.id, format)
        })
        .await
    }

    /// Deletes `<stem>.partN.html` files beyond the current part count.
    fn remove_stale_parts(&self, post_filename: &str, part_count: usize) -> Result<(), DocumentError> {
        let stem = post_stem(post_filename);
        for entry in fs::read_dir(&self.settings.posts_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(GeneratedFile::Part { stem: part_stem, index }) = classify_generated(&file_name) {
                if part_stem == stem && index > part_count {
                    remove_path(&entry.path())?;
                    site_debug!("Removed stale part {}", file_name);
                }
            }
        }
        Ok(())
    }

    /// Removes generated artifacts whose post is neither expected from the
    /// current listing nor protected by a failed document.
    fn prune_orphans(&self, plan: &SyncPlan, protected: &BTreeSet<String>) -> Vec<String> {
        let posts_dir = &self.settings.posts_dir;
        let expected = plan.expected_filenames();
        let entries = match fs::read_dir(posts_dir) {
            Ok(entries) => entries,
            Err(err) => {
                if posts_dir.exists() {
                    site_warn!("Cannot scan {:?} for orphans: {}", posts_dir, err);
                }
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut removed = Vec::new();
        for name in names {
            let Some(generated) = classify_generated(&name) else {
                continue;
            };
            let owner = generated.post_filename();
            if expected.contains(owner.as_str()) || protected.contains(&owner) {
                continue;
            }
            if self.settings.dry_run {
                site_info!("Dry run: would remove orphan {}", name);
                removed.push(name);
                continue;
            }
            match remove_path(&posts_dir.join(&name)) {
                Ok(true) => {
                    site_info!("Removed orphan {}", name);
                    removed.push(name);
                }
                Ok(false) => {}
                Err(err) => site_warn!("Failed to remove orphan {}: {}", name, err),
            }
        }
        removed
    }

    fn save_state(&self, state: &SyncState) -> bool {
        match self.store.save(state) {
            Ok(outcome) => {
                site_debug!("Sync state {:?} ({:?})", self.store.path(), outcome);
                true
            }
            Err(err) => {
                site_error!("Failed to save sync state to {:?}: {}", self.store.path(), err);
                false
            }
        }
    }

    fn update_listing(&self, items: &mut [ListingItem]) -> bool {
        let Some(page) = &self.settings.listing_page else {
            return false;
        };
        match update_listing_page(page, &self.settings.markers, items) {
            Ok(WriteOutcome::Written) => {
                site_info!("Updated listing page {:?}", page);
                true
            }
            Ok(WriteOutcome::Unchanged) => false,
            Err(ListingError::Read { path, source }) => {
                site_warn!("Skipping listing update, cannot read {:?}: {}", path, source);
                false
            }
            Err(err) => {
                site_warn!("Skipping listing update: {}", err);
                false
            }
        }
    }

    fn listing_item(&self, document: &RemoteDocument, filename: &str, summary: &str) -> ListingItem {
        ListingItem {
            title: document.title().to_string(),
            href: listing_href(
                self.settings.listing_page.as_deref(),
                &self.settings.posts_dir,
                filename,
            ),
            date: document.display_date(),
            sort_key: document.modified_time.clone(),
            summary: summary.to_string(),
        }
    }
}

/// Link from the listing page to a post, relative when the posts directory
/// sits below the listing page's directory.
fn listing_href(listing_page: Option<&Path>, posts_dir: &Path, filename: &str) -> String {
    let relative = listing_page
        .and_then(Path::parent)
        .and_then(|dir| posts_dir.strip_prefix(dir).ok());
    match relative {
        Some(rel) if !rel.as_os_str().is_empty() => {
            let mut href: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            href.push(filename.to_string());
            href.join("/")
        }
        _ => filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::listing_href;

    #[test]
    fn href_is_relative_to_listing_page() {
        let href = listing_href(
            Some(Path::new("/site/pages/blog.html")),
            Path::new("/site/pages/blog"),
            "2024-01-01-00-00-00-a.html",
        );
        assert_eq!(href, "blog/2024-01-01-00-00-00-a.html");
    }

    #[test]
    fn href_falls_back_to_filename() {
        let href = listing_href(
            Some(Path::new("/site/other/index.html")),
            Path::new("/site/pages/blog"),
            "x.html",
        );
        assert_eq!(href, "x.html");
        assert_eq!(listing_href(None, Path::new("/p"), "x.html"), "x.html");
    }
}
