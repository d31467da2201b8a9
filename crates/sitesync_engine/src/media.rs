//! Localization of images referenced by exported documents.
//!
//! Each external image is downloaded next to its post, under
//! `<stem>.files/`, named by a hash of its bytes so re-exports that only
//! change the signed download URL produce no new files. A rewrite is only
//! registered once the file is confirmed on disk; a failed download leaves
//! the remote reference in place.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use site_logging::{site_debug, site_warn};
use sitesync_core::media_dir_name;
use url::Url;

use crate::config::RetryPolicy;
use crate::normalize::{image_sources, MediaMap};
use crate::persist::{remove_path, AtomicFileWriter, PersistError, WriteOutcome};
use crate::retry::with_retry;
use crate::source::RemoteSource;

const HASH_BYTES: usize = 8;
const FALLBACK_EXTENSION: &str = "img";

/// Outcome of localizing the images of one document.
#[derive(Debug, Default)]
pub struct LocalizedMedia {
    pub map: MediaMap,
    pub written: usize,
    pub failed: usize,
    pub removed: Vec<String>,
}

/// Downloads every http(s) image of `html` into the post's media directory
/// and removes files there that the document no longer references.
///
/// With `dry_run` nothing is written or removed and the map stays empty.
pub async fn localize_media(
    source: &dyn RemoteSource,
    retry: RetryPolicy,
    html: &str,
    posts_dir: &Path,
    post_filename: &str,
    dry_run: bool,
) -> Result<LocalizedMedia, PersistError> {
    let dir_name = media_dir_name(post_filename);
    let dir = posts_dir.join(&dir_name);
    let remote: Vec<String> = image_sources(html)
        .into_iter()
        .filter(|src| is_remote(src))
        .collect();

    let mut result = LocalizedMedia::default();
    if dry_run {
        return Ok(result);
    }
    if remote.is_empty() {
        if remove_path(&dir)? {
            result.removed.push(dir_name);
        }
        return Ok(result);
    }

    let writer = AtomicFileWriter::new(dir.clone());
    let mut kept = BTreeSet::new();
    for src in &remote {
        let output = match with_retry(retry, "image download", || source.fetch_attachment(src)).await {
            Ok(output) => output,
            Err(err) => {
                site_warn!("Keeping remote image {} for {}: {}", src, post_filename, err);
                result.failed += 1;
                continue;
            }
        };
        let name = media_file_name(&output.bytes, src, output.metadata.content_type.as_deref());
        if writer.write_if_changed(&name, &output.bytes)? == WriteOutcome::Written {
            result.written += 1;
        }
        result
            .map
            .insert_if_present(src, &format!("{dir_name}/{name}"), &dir.join(&name));
        kept.insert(name);
    }

    if kept.is_empty() {
        if remove_path(&dir)? {
            result.removed.push(dir_name);
        }
        return Ok(result);
    }
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !kept.contains(&name) && remove_path(&entry.path())? {
            site_debug!("Removed stale media file {}/{}", dir_name, name);
            result.removed.push(format!("{dir_name}/{name}"));
        }
    }
    Ok(result)
}

fn is_remote(src: &str) -> bool {
    Url::parse(src)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// `<hex of the first bytes of sha256(content)>.<ext>`.
pub fn media_file_name(content: &[u8], src: &str, content_type: Option<&str>) -> String {
    let digest = Sha256::digest(content);
    let hash: String = digest[..HASH_BYTES]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    let extension = extension_from_url(src)
        .or_else(|| content_type.and_then(extension_from_content_type))
        .unwrap_or(FALLBACK_EXTENSION);
    format!("{hash}.{extension}")
}

fn extension_from_url(src: &str) -> Option<&'static str> {
    let url = Url::parse(src).ok()?;
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    normalize_extension(&ext.to_ascii_lowercase())
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = mime.strip_prefix("image/")?;
    normalize_extension(subtype)
}

fn normalize_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        "svg" | "svg+xml" => Some("svg"),
        "bmp" => Some("bmp"),
        "avif" => Some("avif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::media_file_name;

    #[test]
    fn extension_prefers_url_then_content_type() {
        let name = media_file_name(b"abc", "https://img.example.com/a/photo.JPEG?x=1", Some("image/png"));
        assert!(name.ends_with(".jpg"), "{name}");

        let name = media_file_name(b"abc", "https://lh3.example.com/u/0/d/xyz", Some("image/png"));
        assert!(name.ends_with(".png"), "{name}");

        let name = media_file_name(b"abc", "https://lh3.example.com/u/0/d/xyz", None);
        assert!(name.ends_with(".img"), "{name}");
    }

    #[test]
    fn name_depends_only_on_content() {
        let a = media_file_name(b"same", "https://x.example.com/1.png?token=a", None);
        let b = media_file_name(b"same", "https://x.example.com/1.png?token=b", None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16 + ".png".len());
    }
}
