//! Sitesync engine: remote sync, rendering and site catalog IO.
mod auth;
mod chunk;
mod config;
mod decode;
mod feed;
mod index;
mod listing;
mod media;
mod normalize;
mod persist;
mod preview;
mod render;
mod retry;
mod sitemap;
mod source;
mod state_store;
mod sync;
mod types;

pub use auth::{ServiceAccountAuth, ServiceAccountKey, DRIVE_READONLY_SCOPE};
pub use chunk::{chunk_html, DEFAULT_CHUNK_SIZE};
pub use config::{
    CategoryRule, DriveOptions, FeedOptions, FeedSettings, IndexOptions, IndexSettings,
    RetryPolicy, SiteConfig, SitemapOptions, SitemapSettings, SyncOptions, SyncSettings,
    DEFAULT_LARGE_DOC_THRESHOLD,
};
pub use decode::{decode_html, decode_lossy, DecodeError, DecodedHtml};
pub use feed::{absolute_url, build_atom_feed, write_atom_feed, FeedError};
pub use index::{
    build_site_index, categorize, index_file, load_site_index, sort_entries, write_site_index,
    IndexError,
};
pub use listing::{replace_marked_region, update_listing_page, ListingError, ListingMarkers};
pub use media::{localize_media, media_file_name, LocalizedMedia};
pub use normalize::{image_sources, text_to_html, DocsNormalizer, MediaMap, Normalizer};
pub use persist::{
    ensure_output_dir, remove_path, write_atomic, write_atomic_if_changed, AtomicFileWriter,
    PersistError, WriteOutcome,
};
pub use preview::{collapse_whitespace, summarize_html, truncate_preview, visible_text, MAX_PREVIEW_CHARS};
pub use render::{placeholder_body, render_listing, render_post, ListingItem, PostPage, PREFETCH_DELAY_MS};
pub use retry::with_retry;
pub use sitemap::{build_sitemap, write_sitemap};
pub use source::{
    Credentials, CredentialsError, DriveSettings, DriveSource, ExportFormat, RemoteSource,
};
pub use state_store::{StateStore, StateStoreError};
pub use sync::{DocumentError, SyncError, SyncReport, Synchronizer};
pub use types::{ContentSource, FailureKind, FetchError, FetchMetadata, FetchOutput};
