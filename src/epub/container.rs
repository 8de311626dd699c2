//! Container bootstrap: the `mimetype` entry and `META-INF/container.xml`.
//!
//! Reading systems probe these two entries before anything else, so they are
//! written first and in this order. `mimetype` must be stored uncompressed so
//! its bytes sit at a fixed offset from the start of the archive.

use std::io::{self, Seek, Write};

use quick_xml::Writer as XmlWriter;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::config::{CONTAINER_PATH, EPUB_MIME_TYPE, MIMETYPE_PATH, PACKAGE_MEDIA_TYPE};
use crate::error::{Error, Result};

const CONTAINER_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:container";

/// Container descriptor pointing at the package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

/// A single `rootfile` pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

impl Container {
    /// Container with one rootfile naming the package document.
    pub fn for_package(package_path: impl Into<String>) -> Self {
        Self {
            rootfiles: vec![RootFile {
                full_path: package_path.into(),
                media_type: PACKAGE_MEDIA_TYPE.to_string(),
            }],
        }
    }

    /// Serialize the container descriptor as indented XML.
    pub fn to_xml(&self) -> io::Result<Vec<u8>> {
        let mut xml = XmlWriter::new_with_indent(Vec::new(), b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("container");
        root.push_attribute(("xmlns", CONTAINER_NS));
        root.push_attribute(("version", "1.0"));
        xml.write_event(Event::Start(root))?;
        xml.write_event(Event::Start(BytesStart::new("rootfiles")))?;
        for rootfile in &self.rootfiles {
            let mut elem = BytesStart::new("rootfile");
            elem.push_attribute(("full-path", rootfile.full_path.as_str()));
            elem.push_attribute(("media-type", rootfile.media_type.as_str()));
            xml.write_event(Event::Empty(elem))?;
        }
        xml.write_event(Event::End(BytesEnd::new("rootfiles")))?;
        xml.write_event(Event::End(BytesEnd::new("container")))?;

        Ok(xml.into_inner())
    }
}

/// Write `mimetype` (stored) followed by `META-INF/container.xml`.
pub(crate) fn write_bootstrap<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    container: &Container,
    deflated: SimpleFileOptions,
) -> Result<()> {
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    zip.start_file(MIMETYPE_PATH, stored)
        .map_err(|e| Error::zip("creating mimetype entry", e))?;
    zip.write_all(EPUB_MIME_TYPE.as_bytes())
        .map_err(|e| Error::io("writing mimetype entry", e))?;

    let xml = container
        .to_xml()
        .map_err(|e| Error::io("serializing container descriptor", e))?;
    zip.start_file(CONTAINER_PATH, deflated)
        .map_err(|e| Error::zip(format!("creating {}", CONTAINER_PATH), e))?;
    zip.write_all(&xml)
        .map_err(|e| Error::io(format!("writing {}", CONTAINER_PATH), e))?;

    Ok(())
}
