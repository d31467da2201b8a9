use std::collections::HashSet;

use crate::RemoteDocument;

const MAX_SLUG_LEN: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const FALLBACK_TIMESTAMP: &str = "1970-01-01-00-00-00";
const TIMESTAMP_LEN: usize = 19;
const MEDIA_DIR_SUFFIX: &str = ".files";

/// ASCII-folded, lowercase, hyphenated slug: `Hello, World!` -> `hello-world`.
pub fn slugify_title(title: &str) -> String {
    let mut slug = slug::slugify(title);
    if slug.len() > MAX_SLUG_LEN {
        // slugify output is pure ASCII, so any index is a char boundary.
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug = "untitled".to_string();
    }
    slug
}

/// `<YYYY-MM-DD>-<HH-MM-SS>-<slug>` without extension or collision suffix.
pub fn post_basename(document: &RemoteDocument) -> String {
    let timestamp = document
        .modified_at()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| FALLBACK_TIMESTAMP.to_string());
    format!("{timestamp}-{}", slugify_title(&document.name))
}

/// Deterministic post filenames for a whole listing, aligned with `documents`.
///
/// Documents are visited in `(modified_time, id)` order so the same listing
/// always hands the bare name to the same document; later duplicates get
/// `-2`, `-3`, ... appended.
pub fn assign_post_filenames(documents: &[RemoteDocument]) -> Vec<String> {
    let mut order: Vec<usize> = (0..documents.len()).collect();
    order.sort_by(|&a, &b| {
        let (da, db) = (&documents[a], &documents[b]);
        (da.modified_time.as_str(), da.id.as_str()).cmp(&(db.modified_time.as_str(), db.id.as_str()))
    });

    let mut used = HashSet::with_capacity(documents.len());
    let mut names = vec![String::new(); documents.len()];
    for idx in order {
        let base = post_basename(&documents[idx]);
        let mut n = 1usize;
        loop {
            let candidate = if n == 1 {
                format!("{base}.html")
            } else {
                format!("{base}-{n}.html")
            };
            if used.insert(candidate.clone()) {
                names[idx] = candidate;
                break;
            }
            n += 1;
        }
    }
    names
}

/// Filename without the `.html` extension.
pub fn post_stem(post_filename: &str) -> &str {
    post_filename
        .strip_suffix(".html")
        .unwrap_or(post_filename)
}

/// `<stem>.part<n>.html`, 1-based.
pub fn part_filename(post_filename: &str, n: usize) -> String {
    format!("{}.part{n}.html", post_stem(post_filename))
}

/// Directory holding the localized attachments of a post.
pub fn media_dir_name(post_filename: &str) -> String {
    format!("{}{MEDIA_DIR_SUFFIX}", post_stem(post_filename))
}

/// True for `<anything>.part<N>.html` fragment files.
pub fn is_part_filename(name: &str) -> bool {
    split_part(name).is_some()
}

/// Artifacts the synchronizer owns inside the posts directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedFile {
    Post { stem: String },
    Part { stem: String, index: usize },
    MediaDir { stem: String },
}

impl GeneratedFile {
    pub fn stem(&self) -> &str {
        match self {
            GeneratedFile::Post { stem }
            | GeneratedFile::Part { stem, .. }
            | GeneratedFile::MediaDir { stem } => stem,
        }
    }

    /// Name of the post this artifact belongs to.
    pub fn post_filename(&self) -> String {
        format!("{}.html", self.stem())
    }
}

/// Recognizes names produced by this pipeline; anything else in the posts
/// directory (hand-written pages, Markdown-built posts) yields `None`.
pub fn classify_generated(name: &str) -> Option<GeneratedFile> {
    if let Some(stem) = name.strip_suffix(MEDIA_DIR_SUFFIX) {
        return is_generated_stem(stem).then(|| GeneratedFile::MediaDir {
            stem: stem.to_string(),
        });
    }
    if let Some((stem, index)) = split_part(name) {
        return is_generated_stem(stem).then(|| GeneratedFile::Part {
            stem: stem.to_string(),
            index,
        });
    }
    let stem = name.strip_suffix(".html")?;
    is_generated_stem(stem).then(|| GeneratedFile::Post {
        stem: stem.to_string(),
    })
}

fn split_part(name: &str) -> Option<(&str, usize)> {
    let base = name.strip_suffix(".html")?;
    let (stem, index) = base.rsplit_once(".part")?;
    if stem.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = index.parse().ok()?;
    Some((stem, index))
}

fn is_generated_stem(stem: &str) -> bool {
    let bytes = stem.as_bytes();
    if bytes.len() < TIMESTAMP_LEN + 2 || bytes[TIMESTAMP_LEN] != b'-' {
        return false;
    }
    let timestamp_ok = bytes[..TIMESTAMP_LEN].iter().enumerate().all(|(i, b)| {
        if matches!(i, 4 | 7 | 10 | 13 | 16) {
            *b == b'-'
        } else {
            b.is_ascii_digit()
        }
    });
    let slug_ok = bytes[TIMESTAMP_LEN + 1..]
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    timestamp_ok && slug_ok
}
