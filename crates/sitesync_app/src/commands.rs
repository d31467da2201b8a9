//! Stage dispatch and the exit-status policy.
//!
//! A stage returns `Err` only when it could not run at all. Per-document
//! problems are logged by the engine and never surface here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use site_logging::{site_error, site_info, site_warn};
use sitesync_core::IndexEntry;
use sitesync_engine::{
    build_site_index, load_site_index, write_atom_feed, write_site_index, write_sitemap,
    Credentials, DriveSettings, DriveSource, SiteConfig, Synchronizer, WriteOutcome,
};

use crate::cli::{Command, SyncArgs};
use crate::config::apply_sync_overrides;

/// What a stage did, for the final log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Done,
    Skipped(String),
}

pub struct App {
    root: PathBuf,
    config: SiteConfig,
}

impl App {
    pub fn new(root: PathBuf, config: SiteConfig) -> Self {
        Self { root, config }
    }

    /// Runs `command`; `all` keeps going after a failed stage and reports the
    /// first failure at the end.
    pub fn run(mut self, command: Command) -> Result<()> {
        let started = Utc::now();
        let result = match command {
            Command::Sync(args) => self.sync(&args).map(|outcome| log_outcome("sync", outcome)),
            Command::Index => self.index().map(|outcome| log_outcome("index", outcome)),
            Command::Feed => self.feed().map(|outcome| log_outcome("feed", outcome)),
            Command::Sitemap => self.sitemap().map(|outcome| log_outcome("sitemap", outcome)),
            Command::All(args) => self.all(&args),
        };
        let elapsed = Utc::now() - started;
        site_info!("Finished in {} ms", elapsed.num_milliseconds());
        result
    }

    fn all(&mut self, args: &SyncArgs) -> Result<()> {
        let mut first_failure = None;
        let sync = self.sync(args);
        record("sync", sync, &mut first_failure);
        let index = self.index();
        record("index", index, &mut first_failure);
        let feed = self.feed();
        record("feed", feed, &mut first_failure);
        let sitemap = self.sitemap();
        record("sitemap", sitemap, &mut first_failure);
        first_failure.map_or(Ok(()), Err)
    }

    pub fn sync(&mut self, args: &SyncArgs) -> Result<StageOutcome> {
        apply_sync_overrides(&mut self.config, args);
        let drive = &self.config.drive;

        let Some(folder_id) = drive.folder_id.clone() else {
            return Ok(StageOutcome::Skipped(
                "no folder id (set DRIVE_FOLDER_ID or --folder-id)".to_string(),
            ));
        };
        let Some(creds_path) = drive.credentials_file.as_ref().map(|p| self.root.join(p)) else {
            return Ok(StageOutcome::Skipped(
                "no credentials file (set CREDS_FILE or --creds-file)".to_string(),
            ));
        };
        if !creds_path.is_file() {
            return Ok(StageOutcome::Skipped(format!(
                "credentials file {} not found",
                creds_path.display()
            )));
        }

        let credentials = Credentials::load(&creds_path)?;
        let source = DriveSource::new(DriveSettings::from_options(drive, folder_id, credentials))
            .context("cannot create the Drive client")?;

        let mut settings = self.config.sync_settings(&self.root);
        settings.dry_run = args.dry_run;
        let synchronizer = Synchronizer::new(Arc::new(source), settings);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("cannot start the async runtime")?;
        let report = runtime.block_on(synchronizer.run())?;

        if !report.failed.is_empty() {
            let names: Vec<&str> = report.failed.iter().map(|(name, _)| name.as_str()).collect();
            site_warn!("{} document(s) kept their previous output: {}", names.len(), names.join(", "));
        }
        Ok(StageOutcome::Done)
    }

    pub fn index(&self) -> Result<StageOutcome> {
        let entries = build_site_index(&self.config.index_settings(&self.root))?;
        let path = self.config.index_path(&self.root);
        write_site_index(&path, &entries)?;
        site_info!("Wrote {} entries to {}", entries.len(), path.display());
        Ok(StageOutcome::Done)
    }

    pub fn feed(&self) -> Result<StageOutcome> {
        let Some(entries) = self.load_index()? else {
            return Ok(self.missing_index());
        };
        let path = self.config.feed_path(&self.root);
        let (count, outcome) = write_atom_feed(&path, &entries, &self.config.feed_settings())?;
        site_info!("Feed {} with {} entries ({})", path.display(), count, describe(outcome));
        Ok(StageOutcome::Done)
    }

    pub fn sitemap(&self) -> Result<StageOutcome> {
        let Some(entries) = self.load_index()? else {
            return Ok(self.missing_index());
        };
        let path = self.config.sitemap_path(&self.root);
        let outcome = write_sitemap(&path, &entries, &self.config.sitemap_settings())?;
        site_info!("Sitemap {} with {} urls ({})", path.display(), entries.len(), describe(outcome));
        Ok(StageOutcome::Done)
    }

    fn load_index(&self) -> Result<Option<Vec<IndexEntry>>> {
        Ok(load_site_index(&self.config.index_path(&self.root))?)
    }

    fn missing_index(&self) -> StageOutcome {
        StageOutcome::Skipped(format!(
            "no index at {}; run `sitesync index` first",
            self.config.index_path(&self.root).display()
        ))
    }
}

fn log_outcome(stage: &str, outcome: StageOutcome) {
    if let StageOutcome::Skipped(reason) = outcome {
        site_info!("{} skipped: {}", stage, reason);
    }
}

fn record(stage: &str, result: Result<StageOutcome>, first_failure: &mut Option<anyhow::Error>) {
    match result {
        Ok(outcome) => log_outcome(stage, outcome),
        Err(err) => {
            site_error!("{} failed: {:#}", stage, err);
            if first_failure.is_none() {
                *first_failure = Some(err);
            }
        }
    }
}

fn describe(outcome: WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Written => "written",
        WriteOutcome::Unchanged => "unchanged",
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use sitesync_engine::SiteConfig;
    use tempfile::TempDir;

    use super::{App, StageOutcome};
    use crate::cli::SyncArgs;

    fn app(dir: &TempDir) -> App {
        site_logging::initialize_for_tests();
        App::new(dir.path().to_path_buf(), SiteConfig::default())
    }

    #[test]
    fn sync_without_folder_id_is_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let outcome = app(&dir).sync(&SyncArgs::default()).expect("sync");
        assert!(matches!(outcome, StageOutcome::Skipped(_)));
    }

    #[test]
    fn sync_with_absent_credentials_file_is_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let args = SyncArgs {
            folder_id: Some("folder".to_string()),
            creds_file: Some(PathBuf::from("missing.json")),
            ..SyncArgs::default()
        };
        let outcome = app(&dir).sync(&args).expect("sync");
        assert!(matches!(outcome, StageOutcome::Skipped(_)));
        assert!(!dir.path().join("pages").exists());
    }

    #[test]
    fn malformed_credentials_fail_the_stage() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("creds.json"), "{}").expect("write creds");
        let args = SyncArgs {
            folder_id: Some("folder".to_string()),
            creds_file: Some(PathBuf::from("creds.json")),
            ..SyncArgs::default()
        };
        assert!(app(&dir).sync(&args).is_err());
    }

    #[test]
    fn feed_and_sitemap_wait_for_an_index() {
        let dir = TempDir::new().expect("tempdir");
        let app = app(&dir);
        assert!(matches!(app.feed().expect("feed"), StageOutcome::Skipped(_)));
        assert!(matches!(app.sitemap().expect("sitemap"), StageOutcome::Skipped(_)));
        assert!(!dir.path().join("feed.xml").exists());
    }

    #[test]
    fn index_then_feed_and_sitemap() {
        let dir = TempDir::new().expect("tempdir");
        let blog = dir.path().join("pages/blog");
        fs::create_dir_all(&blog).expect("mkdir");
        fs::write(
            blog.join("2024-03-01-10-00-00-hello.html"),
            "<html><head><title>Hello</title></head><body><p>Hi there</p></body></html>",
        )
        .expect("write post");

        let app = app(&dir);
        assert_eq!(app.index().expect("index"), StageOutcome::Done);
        assert_eq!(app.feed().expect("feed"), StageOutcome::Done);
        assert_eq!(app.sitemap().expect("sitemap"), StageOutcome::Done);

        let feed = fs::read_to_string(dir.path().join("feed.xml")).expect("feed");
        assert!(feed.contains("pages/blog/2024-03-01-10-00-00-hello.html"));
        let sitemap = fs::read_to_string(dir.path().join("sitemap.xml")).expect("sitemap");
        assert!(sitemap.contains("<lastmod>2024-03-01</lastmod>"));
    }
}
