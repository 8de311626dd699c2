//! EPUB 3 packaging: container bootstrap, metadata, manifest/spine and the
//! package document.

mod config;
mod container;
mod identifier;
mod manifest;
mod media_type;
mod metadata;
mod package;
mod sink;
mod writer;

pub use config::{
    CONTAINER_PATH, EPUB_MIME_TYPE, MIMETYPE_PATH, PACKAGE_MEDIA_TYPE, WriterConfig,
};
pub use container::{Container, RootFile};
pub use identifier::{new_urn, new_uuid};
pub use manifest::{ContentType, ManifestItem, Resource, SpineEntry, normalize_name};
pub use media_type::media_type_for;
pub use metadata::{
    DcTerm, Direction, Element, LangString, Link, MODIFIED_FORMAT, MODIFIED_PROPERTY, Meta,
    Metadata, TitleType,
};
pub use package::{Package, PackageOptions, PageDirection};
pub use sink::{AtomicFile, Sink};
pub use writer::Writer;
