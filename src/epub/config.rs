//! Writer configuration.

use chrono::{DateTime, Utc};

/// Media type of an EPUB container, stored verbatim in the `mimetype` entry.
pub const EPUB_MIME_TYPE: &str = "application/epub+zip";

/// Name of the first archive entry.
pub const MIMETYPE_PATH: &str = "mimetype";

/// Location of the container descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Media type of the package document.
pub const PACKAGE_MEDIA_TYPE: &str = "application/oebps-package+xml";

const DEFAULT_CONTENT_ROOT: &str = "OEBPS";
const DEFAULT_PACKAGE_FILENAME: &str = "package.opf";

/// Configuration for a publication [`Writer`](super::Writer).
///
/// # Example
///
/// ```
/// use quire::WriterConfig;
///
/// let config = WriterConfig::default()
///     .with_content_root("EPUB")
///     .with_package_filename("content.opf")
///     .with_compression_level(9);
/// assert_eq!(config.package_path(), "EPUB/content.opf");
/// ```
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Folder holding the package document and every added resource.
    /// An empty root places them at the top of the archive.
    pub content_root: String,
    /// File name of the package document inside `content_root`.
    pub package_filename: String,
    /// Deflate level for compressed entries (0-9, default 6).
    pub compression_level: Option<i64>,
    /// Fixed value for the `dcterms:modified` timestamp instead of the
    /// current time.
    pub modified: Option<DateTime<Utc>>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            content_root: DEFAULT_CONTENT_ROOT.to_string(),
            package_filename: DEFAULT_PACKAGE_FILENAME.to_string(),
            compression_level: None,
            modified: None,
        }
    }
}

impl WriterConfig {
    pub fn with_content_root(mut self, root: impl Into<String>) -> Self {
        self.content_root = root.into();
        self
    }

    pub fn with_package_filename(mut self, filename: impl Into<String>) -> Self {
        self.package_filename = filename.into();
        self
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Archive path of a resource stored under the content root.
    pub fn storage_path(&self, name: &str) -> String {
        let root = self.content_root.trim_matches('/');
        if root.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", root, name)
        }
    }

    /// Archive path of the package document.
    pub fn package_path(&self) -> String {
        self.storage_path(&self.package_filename)
    }
}
