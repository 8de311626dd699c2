use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::config::WriterConfig;
use super::container::{Container, write_bootstrap};
use super::manifest::{ContentType, Manifest, ManifestItem, Resource, SpineEntry};
use super::metadata::Metadata;
use super::package::{Package, PackageOptions};
use super::sink::{AtomicFile, Sink};
use crate::error::{Error, Result};

enum State<W: Sink> {
    Open(ZipWriter<W>),
    /// Terminal. Holds the committed sink after a successful close.
    Closed(Option<W>),
}

/// Streaming writer for a single EPUB 3 publication.
///
/// Creating a writer emits the container bootstrap entries. Each
/// [`add_content`](Writer::add_content) call streams one resource into the
/// archive and records it in the manifest (and spine, for primary and
/// auxiliary content). [`close`](Writer::close) writes the package document
/// as the last entry and commits the sink.
///
/// # Example
///
/// ```no_run
/// use quire::{ContentType, Writer};
///
/// let mut pub_writer = Writer::create("book.epub")?;
/// pub_writer.metadata_mut().add_title("Test").add_language("en");
/// pub_writer.metadata_mut().add_author("Author");
///
/// let chapter = std::fs::File::open("chapter1.xhtml")?;
/// pub_writer.add_content("chapter1.xhtml", ContentType::Primary, chapter, &[])?;
/// pub_writer.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Writer<W: Sink> {
    state: State<W>,
    config: WriterConfig,
    deflated: SimpleFileOptions,
    metadata: Metadata,
    manifest: Manifest,
    options: PackageOptions,
}

impl Writer<AtomicFile> {
    /// Write a publication to `path`. The file only appears there once
    /// [`close`](Writer::close) succeeds.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_config(path, WriterConfig::default())
    }

    pub fn create_with_config<P: AsRef<Path>>(path: P, config: WriterConfig) -> Result<Self> {
        let path = path.as_ref();
        let sink = AtomicFile::create(path)
            .map_err(|e| Error::io(format!("creating {}", path.display()), e))?;
        Self::with_config(sink, config)
    }
}

impl<W: Sink> Writer<W> {
    /// Start a publication over `sink` with the default configuration.
    pub fn new(sink: W) -> Result<Self> {
        Self::with_config(sink, WriterConfig::default())
    }

    /// Start a publication over `sink`, writing the `mimetype` and
    /// `META-INF/container.xml` entries.
    pub fn with_config(sink: W, config: WriterConfig) -> Result<Self> {
        let mut zip = ZipWriter::new(sink);
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(config.compression_level);

        let package_path = config.package_path();
        write_bootstrap(&mut zip, &Container::for_package(&package_path), deflated)?;
        info!(package = %package_path, "started EPUB publication");

        // The package document and, with an empty content root, the
        // bootstrap entries share the resource namespace.
        let mut reserved = vec![config.package_filename.clone()];
        if config.content_root.trim_matches('/').is_empty() {
            reserved.push(super::config::MIMETYPE_PATH.to_string());
            reserved.push(super::config::CONTAINER_PATH.to_string());
        }

        Ok(Self {
            state: State::Open(zip),
            config,
            deflated,
            metadata: Metadata::new(),
            manifest: Manifest::with_reserved(reserved),
            options: PackageOptions::default(),
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn package_options_mut(&mut self) -> &mut PackageOptions {
        &mut self.options
    }

    /// Manifest items in the order they were added.
    pub fn manifest(&self) -> &[ManifestItem] {
        self.manifest.items()
    }

    /// Spine entries in reading order.
    pub fn spine(&self) -> &[SpineEntry] {
        self.manifest.spine()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed(_))
    }

    /// Add a resource, streaming its bytes from `reader`.
    ///
    /// Returns the manifest id assigned to it.
    pub fn add_content<R: Read>(
        &mut self,
        name: &str,
        content_type: ContentType,
        reader: R,
        properties: &[&str],
    ) -> Result<String> {
        let resource =
            Resource::new(name, content_type).with_properties(properties.iter().copied());
        self.add_resource(resource, reader)
    }

    /// Add a resource copied from a file on disk.
    pub fn add_file<P: AsRef<Path>>(
        &mut self,
        source: P,
        name: &str,
        content_type: ContentType,
        properties: &[&str],
    ) -> Result<String> {
        if self.is_closed() {
            return Err(Error::ClosedWriter);
        }
        let source = source.as_ref();
        let file =
            File::open(source).map_err(|e| Error::io(format!("opening {}", source.display()), e))?;
        self.add_content(name, content_type, file, properties)
    }

    /// Add a fully described resource, streaming its bytes from `reader`.
    ///
    /// Either the bytes land in the archive and the manifest records the
    /// item, or neither happens. Returns the manifest id assigned to it.
    ///
    /// A failed copy removes the entry from the archive directory, but the
    /// bytes already written stay in the output as unreferenced space. The
    /// archive remains valid. Callers that retry large sources should
    /// buffer them first to keep the file compact.
    pub fn add_resource<R: Read>(&mut self, resource: Resource, mut reader: R) -> Result<String> {
        let zip = match &mut self.state {
            State::Open(zip) => zip,
            State::Closed(_) => return Err(Error::ClosedWriter),
        };

        let pending = self.manifest.prepare(&resource)?;
        let path = self.config.storage_path(&pending.item.href);

        if let Err(e) = zip.start_file(path.as_str(), self.deflated) {
            // Nothing to roll back to: the archive may hold a partial header.
            self.state = State::Closed(None);
            return Err(Error::zip(format!("creating {}", path), e));
        }

        match io::copy(&mut reader, zip) {
            Ok(bytes) => {
                let item = self.manifest.commit(pending);
                debug!(
                    id = %item.id,
                    path = %path,
                    media_type = %item.media_type,
                    bytes,
                    "added resource"
                );
                Ok(item.id.clone())
            }
            Err(e) => {
                warn!(path = %path, error = %e, "aborting resource entry");
                if let Err(abort) = zip.abort_file() {
                    warn!(path = %path, error = %abort, "could not remove aborted entry");
                    self.state = State::Closed(None);
                }
                Err(Error::io(format!("copying {}", path), e))
            }
        }
    }

    /// Finish the publication.
    ///
    /// Fills metadata defaults, writes the package document as the last
    /// archive entry, writes the central directory and commits the sink.
    /// The writer is closed from the first step on, so a second call fails
    /// with [`Error::ClosedWriter`].
    pub fn close(&mut self) -> Result<()> {
        let mut zip = match std::mem::replace(&mut self.state, State::Closed(None)) {
            State::Open(zip) => zip,
            closed @ State::Closed(_) => {
                self.state = closed;
                return Err(Error::ClosedWriter);
            }
        };

        let modified = self.config.modified.unwrap_or_else(Utc::now);
        let item_ids: HashSet<String> =
            self.manifest.items().iter().map(|item| item.id.clone()).collect();
        let unique_identifier = self.metadata.finalize(modified, &item_ids)?;

        let package = Package {
            unique_identifier: &unique_identifier,
            metadata: &self.metadata,
            manifest: self.manifest.items(),
            spine: self.manifest.spine(),
            options: &self.options,
        };
        let xml = package
            .to_xml()
            .map_err(|e| Error::io("serializing package document", e))?;

        let path = self.config.package_path();
        zip.start_file(path.as_str(), self.deflated)
            .map_err(|e| Error::zip(format!("creating {}", path), e))?;
        zip.write_all(&xml)
            .map_err(|e| Error::io(format!("writing {}", path), e))?;

        let mut sink = zip
            .finish()
            .map_err(|e| Error::zip("writing central directory", e))?;
        sink.commit()
            .map_err(|e| Error::io("committing publication", e))?;

        info!(
            items = self.manifest.items().len(),
            spine = self.manifest.spine().len(),
            "finished EPUB publication"
        );
        self.state = State::Closed(Some(sink));
        Ok(())
    }

    /// The committed sink, if the writer was closed successfully.
    pub fn into_inner(self) -> Option<W> {
        match self.state {
            State::Closed(sink) => sink,
            State::Open(_) => None,
        }
    }
}
