//! Loads the optional RON configuration file and applies command-line
//! overrides on top of it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ron::extensions::Extensions;
use site_logging::{site_debug, site_info};
use sitesync_engine::SiteConfig;
use thiserror::Error;

use crate::cli::SyncArgs;

pub const CONFIG_FILENAME: &str = "sitesync.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

/// Reads `explicit` when given, otherwise `<root>/sitesync.ron` if it exists.
///
/// A missing default file yields the built-in defaults; a missing explicit
/// file is an error.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (root.join(CONFIG_FILENAME), false),
    };

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            site_debug!("No config at {:?}; using defaults", path);
            return Ok(SiteConfig::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let config = parse_config(&text).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    site_info!("Loaded config from {:?}", path);
    Ok(config)
}

/// `Option` fields may be written bare, without `Some(..)`.
pub fn parse_config(text: &str) -> Result<SiteConfig, ron::error::SpannedError> {
    ron::Options::default()
        .with_default_extension(Extensions::IMPLICIT_SOME)
        .from_str(text)
}

/// Flags and environment win over the file.
pub fn apply_sync_overrides(config: &mut SiteConfig, args: &SyncArgs) {
    if let Some(folder_id) = args.folder_id.as_ref().filter(|id| !id.trim().is_empty()) {
        config.drive.folder_id = Some(folder_id.trim().to_string());
    }
    if let Some(creds) = &args.creds_file {
        config.drive.credentials_file = Some(creds.clone());
    }
    if args.prefetch {
        config.sync.prefetch_parts = true;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{apply_sync_overrides, parse_config};
    use crate::cli::SyncArgs;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse_config("()").expect("parse");
        assert_eq!(config, sitesync_engine::SiteConfig::default());
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = parse_config(r#"(drive: (folder_id: "from-file"))"#).expect("parse");
        assert_eq!(config.drive.folder_id.as_deref(), Some("from-file"));

        let args = SyncArgs {
            folder_id: Some(" from-flag ".to_string()),
            creds_file: Some(PathBuf::from("creds.json")),
            dry_run: false,
            prefetch: true,
        };
        apply_sync_overrides(&mut config, &args);
        assert_eq!(config.drive.folder_id.as_deref(), Some("from-flag"));
        assert_eq!(config.drive.credentials_file, Some(PathBuf::from("creds.json")));
        assert!(config.sync.prefetch_parts);
    }

    #[test]
    fn blank_folder_flag_keeps_file_value() {
        let mut config = parse_config(r#"(drive: (folder_id: "kept"))"#).expect("parse");
        let args = SyncArgs {
            folder_id: Some("  ".to_string()),
            ..SyncArgs::default()
        };
        apply_sync_overrides(&mut config, &args);
        assert_eq!(config.drive.folder_id.as_deref(), Some("kept"));
    }
}
