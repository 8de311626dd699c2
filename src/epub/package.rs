//! Package document (OPF) serialization.
//!
//! Elements are written explicitly in the order EPUB 3 requires:
//! `metadata`, then `manifest`, then `spine`.

use std::io::{self, Write};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use quick_xml::Writer as XmlWriter;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::manifest::{ManifestItem, SpineEntry};
use super::metadata::{DcTerm, Direction, Element, LangString, Metadata};

const OPF_NS: &str = "http://www.idpf.org/2007/opf";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const PACKAGE_VERSION: &str = "3.0";

/// Characters that cannot appear literally in a relative URL path.
/// `/` is kept as the segment separator.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Global direction in which the content flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Ltr,
    Rtl,
    Default,
}

impl PageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageDirection::Ltr => "ltr",
            PageDirection::Rtl => "rtl",
            PageDirection::Default => "default",
        }
    }
}

/// Optional attributes of the `package` and `spine` elements.
#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    /// `xml:lang` of the package document.
    pub lang: Option<String>,
    pub dir: Option<Direction>,
    /// Prefix declarations for non-reserved metadata vocabularies.
    pub prefix: Option<String>,
    pub page_direction: Option<PageDirection>,
    /// Manifest id of an NCX document, for EPUB 2 reading systems.
    pub toc: Option<String>,
}

/// The package document, assembled from a writer's final state.
#[derive(Debug, Clone, Copy)]
pub struct Package<'a> {
    /// Id of the `dc:identifier` holding the unique identifier.
    pub unique_identifier: &'a str,
    pub metadata: &'a Metadata,
    pub manifest: &'a [ManifestItem],
    pub spine: &'a [SpineEntry],
    pub options: &'a PackageOptions,
}

impl Package<'_> {
    /// Serialize to indented XML, preceded by an XML declaration.
    pub fn to_xml(&self) -> io::Result<Vec<u8>> {
        let mut xml = XmlWriter::new_with_indent(Vec::new(), b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("package");
        root.push_attribute(("xmlns", OPF_NS));
        root.push_attribute(("version", PACKAGE_VERSION));
        root.push_attribute(("unique-identifier", self.unique_identifier));
        if let Some(prefix) = &self.options.prefix {
            root.push_attribute(("prefix", prefix.as_str()));
        }
        if let Some(lang) = &self.options.lang {
            root.push_attribute(("xml:lang", lang.as_str()));
        }
        if let Some(dir) = self.options.dir {
            root.push_attribute(("dir", dir.as_str()));
        }
        xml.write_event(Event::Start(root))?;

        write_metadata(&mut xml, self.metadata)?;
        write_manifest(&mut xml, self.manifest)?;
        write_spine(&mut xml, self.spine, self.options)?;

        xml.write_event(Event::End(BytesEnd::new("package")))?;
        Ok(xml.into_inner())
    }
}

fn write_text<W: Write>(
    xml: &mut XmlWriter<W>,
    name: &str,
    attrs: &[(&str, &str)],
    value: &str,
) -> io::Result<()> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    xml.write_event(Event::Start(start))?;
    xml.write_event(Event::Text(BytesText::new(value)))?;
    xml.write_event(Event::End(BytesEnd::new(name)))
}

fn write_element<W: Write>(xml: &mut XmlWriter<W>, name: &str, element: &Element) -> io::Result<()> {
    let mut attrs = Vec::new();
    if let Some(id) = &element.id {
        attrs.push(("id", id.as_str()));
    }
    write_text(xml, name, &attrs, &element.value)
}

fn write_lang_string<W: Write>(
    xml: &mut XmlWriter<W>,
    name: &str,
    value: &LangString,
) -> io::Result<()> {
    let mut attrs = Vec::new();
    if let Some(id) = &value.id {
        attrs.push(("id", id.as_str()));
    }
    if let Some(lang) = &value.lang {
        attrs.push(("xml:lang", lang.as_str()));
    }
    if let Some(dir) = value.dir {
        attrs.push(("dir", dir.as_str()));
    }
    write_text(xml, name, &attrs, &value.value)
}

fn write_metadata<W: Write>(xml: &mut XmlWriter<W>, metadata: &Metadata) -> io::Result<()> {
    let mut start = BytesStart::new("metadata");
    start.push_attribute(("xmlns:dc", DC_NS));
    xml.write_event(Event::Start(start))?;

    // Required elements first: identifier, title, language.
    for identifier in metadata.identifiers() {
        write_element(xml, "dc:identifier", identifier)?;
    }
    for title in metadata.titles() {
        write_lang_string(xml, "dc:title", title)?;
    }
    for language in metadata.languages() {
        write_element(xml, "dc:language", language)?;
    }

    for term in DcTerm::ALL.into_iter().filter(|t| *t != DcTerm::Title) {
        for value in metadata.get(term) {
            write_lang_string(xml, term.element_name(), value)?;
        }
    }
    if let Some(date) = metadata.date() {
        write_element(xml, "dc:date", date)?;
    }
    for format in metadata.formats() {
        write_element(xml, "dc:format", format)?;
    }

    for meta in metadata.meta() {
        let mut attrs = vec![("property", meta.property.as_str())];
        if let Some(id) = &meta.id {
            attrs.push(("id", id.as_str()));
        }
        if let Some(refines) = &meta.refines {
            attrs.push(("refines", refines.as_str()));
        }
        if let Some(scheme) = &meta.scheme {
            attrs.push(("scheme", scheme.as_str()));
        }
        if let Some(lang) = &meta.lang {
            attrs.push(("xml:lang", lang.as_str()));
        }
        write_text(xml, "meta", &attrs, &meta.value)?;
    }

    for link in metadata.links() {
        let mut elem = BytesStart::new("link");
        elem.push_attribute(("rel", link.rel.as_str()));
        elem.push_attribute(("href", link.href.as_str()));
        if let Some(id) = &link.id {
            elem.push_attribute(("id", id.as_str()));
        }
        if let Some(refines) = &link.refines {
            elem.push_attribute(("refines", refines.as_str()));
        }
        if let Some(media_type) = &link.media_type {
            elem.push_attribute(("media-type", media_type.as_str()));
        }
        if let Some(properties) = &link.properties {
            elem.push_attribute(("properties", properties.as_str()));
        }
        xml.write_event(Event::Empty(elem))?;
    }

    xml.write_event(Event::End(BytesEnd::new("metadata")))
}

fn write_manifest<W: Write>(xml: &mut XmlWriter<W>, items: &[ManifestItem]) -> io::Result<()> {
    xml.write_event(Event::Start(BytesStart::new("manifest")))?;
    for item in items {
        let mut elem = BytesStart::new("item");
        elem.push_attribute(("id", item.id.as_str()));
        let href = utf8_percent_encode(&item.href, HREF).to_string();
        elem.push_attribute(("href", href.as_str()));
        elem.push_attribute(("media-type", item.media_type.as_str()));
        if let Some(fallback) = &item.fallback {
            elem.push_attribute(("fallback", fallback.as_str()));
        }
        if let Some(properties) = &item.properties {
            elem.push_attribute(("properties", properties.as_str()));
        }
        if let Some(overlay) = &item.media_overlay {
            elem.push_attribute(("media-overlay", overlay.as_str()));
        }
        xml.write_event(Event::Empty(elem))?;
    }
    xml.write_event(Event::End(BytesEnd::new("manifest")))
}

fn write_spine<W: Write>(
    xml: &mut XmlWriter<W>,
    spine: &[SpineEntry],
    options: &PackageOptions,
) -> io::Result<()> {
    let mut start = BytesStart::new("spine");
    if let Some(toc) = &options.toc {
        start.push_attribute(("toc", toc.as_str()));
    }
    if let Some(direction) = options.page_direction {
        start.push_attribute(("page-progression-direction", direction.as_str()));
    }
    xml.write_event(Event::Start(start))?;
    for entry in spine {
        let mut elem = BytesStart::new("itemref");
        elem.push_attribute(("idref", entry.idref.as_str()));
        if !entry.linear {
            elem.push_attribute(("linear", "no"));
        }
        if let Some(properties) = &entry.properties {
            elem.push_attribute(("properties", properties.as_str()));
        }
        xml.write_event(Event::Empty(elem))?;
    }
    xml.write_event(Event::End(BytesEnd::new("spine")))
}
