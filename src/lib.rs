//! # quire
//!
//! A streaming writer for EPUB 3 publications.
//!
//! ## Features
//!
//! - Writes the container bootstrap (`mimetype`, `META-INF/container.xml`)
//!   exactly as reading systems expect it
//! - Streams resources straight into the archive, one entry per call
//! - Builds manifest and spine as content is added, in call order
//! - Fills required metadata (title, language, unique identifier,
//!   modification time) when the publication is closed
//! - Output files only appear at their destination once complete
//!
//! ## Quick Start
//!
//! ```no_run
//! use quire::{ContentType, Writer};
//!
//! let mut book = Writer::create("book.epub")?;
//! book.metadata_mut().add_title("My Book");
//! book.metadata_mut().add_author("Author Name");
//!
//! book.add_content(
//!     "chapter1.xhtml",
//!     ContentType::Primary,
//!     &b"<html>...</html>"[..],
//!     &[],
//! )?;
//! book.add_file("cover.png", "cover.png", ContentType::Media, &["cover-image"])?;
//! book.close()?;
//! # Ok::<(), quire::Error>(())
//! ```
//!
//! ## In-memory output
//!
//! Any [`Sink`] works as a destination, including `Cursor<Vec<u8>>`:
//!
//! ```
//! use std::io::Cursor;
//! use quire::{ContentType, Writer};
//!
//! let mut book = Writer::new(Cursor::new(Vec::new()))?;
//! let id = book.add_content("a.xhtml", ContentType::Primary, &b"<html/>"[..], &[])?;
//! assert_eq!(id, "id01");
//! book.close()?;
//! let bytes = book.into_inner().unwrap().into_inner();
//! assert_eq!(&bytes[0..4], b"PK\x03\x04");
//! # Ok::<(), quire::Error>(())
//! ```

pub mod epub;
pub mod error;

pub use epub::{
    AtomicFile, ContentType, DcTerm, Direction, LangString, Link, ManifestItem, Meta, Metadata,
    PackageOptions, PageDirection, Resource, Sink, SpineEntry, TitleType, Writer, WriterConfig,
};
pub use error::{Error, Result};
