//! End-to-end tests: build publications and read the archives back.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use chrono::{TimeZone, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quire::{ContentType, Error, LangString, Meta, Resource, Sink, Writer, WriterConfig};
use tempfile::TempDir;
use zip::ZipArchive;

const CHAPTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Chapter 1</title></head>
<body><h1>Chapter 1</h1><p>This is the first chapter.</p></body>
</html>"#;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

#[derive(Debug, Default, PartialEq)]
struct ParsedItem {
    id: String,
    href: String,
    media_type: String,
    properties: Option<String>,
}

#[derive(Debug, Default)]
struct ParsedPackage {
    version: String,
    unique_identifier: String,
    /// (element name, id attribute, text)
    metadata: Vec<(String, Option<String>, String)>,
    /// (property, refines, text)
    meta: Vec<(String, Option<String>, String)>,
    items: Vec<ParsedItem>,
    spine: Vec<(String, Option<String>)>,
    root_children: Vec<String>,
}

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8(a.value.to_vec()).unwrap())
}

fn parse_package(xml: &str) -> ParsedPackage {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut package = ParsedPackage::default();
    let mut depth = 0usize;
    let mut current: Option<(String, Option<String>, Option<String>)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) => {
                let name = String::from_utf8(e.name().as_ref().to_vec()).unwrap();
                depth += 1;
                if depth == 1 && name == "package" {
                    package.version = attr(&e, b"version").unwrap_or_default();
                    package.unique_identifier = attr(&e, b"unique-identifier").unwrap_or_default();
                } else if depth == 2 {
                    package.root_children.push(name);
                } else if depth == 3 {
                    if name == "meta" {
                        current = Some((name, attr(&e, b"property"), attr(&e, b"refines")));
                    } else {
                        current = Some((name, attr(&e, b"id"), None));
                    }
                    text.clear();
                }
            }
            Event::Text(e) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(_) => {
                if depth == 3
                    && let Some((name, first, second)) = current.take()
                {
                    if name == "meta" {
                        package.meta.push((first.unwrap_or_default(), second, text.clone()));
                    } else {
                        package.metadata.push((name, first, text.clone()));
                    }
                }
                depth -= 1;
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"item" => package.items.push(ParsedItem {
                    id: attr(&e, b"id").unwrap(),
                    href: attr(&e, b"href").unwrap(),
                    media_type: attr(&e, b"media-type").unwrap(),
                    properties: attr(&e, b"properties"),
                }),
                b"itemref" => package
                    .spine
                    .push((attr(&e, b"idref").unwrap(), attr(&e, b"linear"))),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    package
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> String {
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

fn entry_names<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> ZipArchive<Cursor<Vec<u8>>> {
    let bytes = writer.into_inner().expect("writer not closed").into_inner();
    ZipArchive::new(Cursor::new(bytes)).unwrap()
}

#[test]
fn test_chapter_and_cover_publication() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.epub");

    let mut writer = Writer::create(&path).unwrap();
    writer
        .add_content("chapter1.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[])
        .unwrap();
    writer
        .add_content("cover.png", ContentType::Media, PNG, &["cover-image"])
        .unwrap();
    assert!(!path.exists(), "output must not be visible before close");
    writer.close().unwrap();
    assert!(path.exists());

    let mut archive = ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(
        entry_names(&mut archive),
        vec![
            "mimetype",
            "META-INF/container.xml",
            "OEBPS/chapter1.xhtml",
            "OEBPS/cover.png",
            "OEBPS/package.opf",
        ]
    );

    let package = parse_package(&read_entry(&mut archive, "OEBPS/package.opf"));
    assert_eq!(
        package.items,
        vec![
            ParsedItem {
                id: "id01".into(),
                href: "chapter1.xhtml".into(),
                media_type: "application/xhtml+xml".into(),
                properties: None,
            },
            ParsedItem {
                id: "id02".into(),
                href: "cover.png".into(),
                media_type: "image/png".into(),
                properties: Some("cover-image".into()),
            },
        ]
    );
    assert_eq!(package.spine, vec![("id01".to_string(), None)]);

    assert_eq!(read_entry(&mut archive, "OEBPS/chapter1.xhtml"), CHAPTER);
    let mut cover = Vec::new();
    archive.by_name("OEBPS/cover.png").unwrap().read_to_end(&mut cover).unwrap();
    assert_eq!(cover, PNG);
}

#[test]
fn test_mimetype_is_first_and_stored() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer.close().unwrap();
    let bytes = writer.into_inner().unwrap().into_inner();

    assert_eq!(&bytes[0..4], b"PK\x03\x04");
    assert_eq!(&bytes[30..38], b"mimetype");

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut first = archive.by_index(0).unwrap();
    assert_eq!(first.name(), "mimetype");
    assert_eq!(first.compression(), zip::CompressionMethod::Stored);
    let mut content = String::new();
    first.read_to_string(&mut content).unwrap();
    assert_eq!(content, "application/epub+zip");
}

#[test]
fn test_container_points_at_package() {
    let config = WriterConfig::default()
        .with_content_root("EPUB")
        .with_package_filename("content.opf");
    let mut writer = Writer::with_config(Cursor::new(Vec::new()), config).unwrap();
    writer
        .add_content("text/ch1.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[])
        .unwrap();
    writer.close().unwrap();
    let mut archive = finish(writer);

    let container = read_entry(&mut archive, "META-INF/container.xml");
    assert!(container.contains(
        r#"<rootfile full-path="EPUB/content.opf" media-type="application/oebps-package+xml"/>"#
    ));
    assert!(entry_names(&mut archive).contains(&"EPUB/text/ch1.xhtml".to_string()));
    assert_eq!(entry_names(&mut archive).last().unwrap(), "EPUB/content.opf");
}

#[test]
fn test_close_without_metadata_fills_defaults() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer.close().unwrap();
    let mut archive = finish(writer);
    let package = parse_package(&read_entry(&mut archive, "OEBPS/package.opf"));

    assert_eq!(package.version, "3.0");
    assert_eq!(package.root_children, vec!["metadata", "manifest", "spine"]);

    let titles: Vec<_> = package.metadata.iter().filter(|m| m.0 == "dc:title").collect();
    assert_eq!(titles.len(), 1);
    assert!(!titles[0].2.is_empty());

    let languages: Vec<_> = package.metadata.iter().filter(|m| m.0 == "dc:language").collect();
    assert_eq!(languages.len(), 1);
    assert_eq!(languages[0].2, "en");

    let identifiers: Vec<_> = package
        .metadata
        .iter()
        .filter(|m| m.0 == "dc:identifier")
        .collect();
    assert_eq!(identifiers.len(), 1);
    assert_eq!(identifiers[0].1.as_deref(), Some(package.unique_identifier.as_str()));
    assert!(identifiers[0].2.starts_with("urn:uuid:"));

    let modified: Vec<_> = package
        .meta
        .iter()
        .filter(|m| m.0 == "dcterms:modified")
        .collect();
    assert_eq!(modified.len(), 1);
}

#[test]
fn test_metadata_is_serialized() {
    let stamp = Utc.with_ymd_and_hms(2023, 11, 2, 17, 4, 5).unwrap();
    let config = WriterConfig::default().with_modified(stamp);
    let mut writer = Writer::with_config(Cursor::new(Vec::new()), config).unwrap();

    let meta = writer.metadata_mut();
    meta.add_identifier("isbn", "urn:isbn:9780000000002");
    meta.add_title("Main Title");
    meta.add_subtitle("Sub Title");
    meta.add_author("First Author");
    meta.add_language("de");
    meta.add_publisher(LangString::new("Verlag").with_lang("de"));
    meta.add_meta(Meta::new("dcterms:modified", "2000-01-01T00:00:00Z"));
    meta.set_date("2023-11").unwrap();
    assert!(matches!(meta.set_date("Nov 2023"), Err(Error::InvalidDate(_))));

    writer.close().unwrap();
    let mut archive = finish(writer);
    let package = parse_package(&read_entry(&mut archive, "OEBPS/package.opf"));

    assert_eq!(package.unique_identifier, "isbn");
    let names: Vec<_> = package.metadata.iter().map(|m| m.0.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "dc:identifier",
            "dc:title",
            "dc:title",
            "dc:language",
            "dc:creator",
            "dc:publisher",
            "dc:date",
        ]
    );
    assert!(package.metadata.contains(&(
        "dc:date".to_string(),
        None,
        "2023-11".to_string()
    )));
    assert!(package.meta.contains(&(
        "title-type".to_string(),
        Some("#subtitle".to_string()),
        "subtitle".to_string()
    )));
    let modified: Vec<_> = package
        .meta
        .iter()
        .filter(|m| m.0 == "dcterms:modified")
        .collect();
    assert_eq!(modified.len(), 1);
    assert_eq!(modified[0].2, "2023-11-02T17:04:05Z");
}

#[test]
fn test_spine_follows_call_order() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer.add_content("a.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[]).unwrap();
    writer.add_content("b.png", ContentType::Media, PNG, &[]).unwrap();
    writer.add_content("c.xhtml", ContentType::Auxiliary, CHAPTER.as_bytes(), &[]).unwrap();
    writer.add_content("d.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[]).unwrap();
    writer.close().unwrap();

    let mut archive = finish(writer);
    let package = parse_package(&read_entry(&mut archive, "OEBPS/package.opf"));
    assert_eq!(
        package.spine,
        vec![
            ("id01".to_string(), None),
            ("id03".to_string(), Some("no".to_string())),
            ("id04".to_string(), None),
        ]
    );
}

#[test]
fn test_duplicate_resource_is_rejected() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer.add_content("img/a.png", ContentType::Media, PNG, &[]).unwrap();

    let err = writer
        .add_content("img/a.png", ContentType::Primary, PNG, &[])
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateResource(ref p) if p == "img/a.png"));
    assert_eq!(writer.manifest().len(), 1);
    assert!(writer.spine().is_empty());

    let id = writer.add_content("img/b.png", ContentType::Media, PNG, &[]).unwrap();
    assert_eq!(id, "id02");

    writer.close().unwrap();
    let mut archive = finish(writer);
    assert_eq!(archive.len(), 5);
    assert!(archive.by_name("OEBPS/img/a.png").is_ok());
}

#[test]
fn test_add_resource_with_fallback() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    let fallback = writer
        .add_content("page.xhtml", ContentType::Media, CHAPTER.as_bytes(), &[])
        .unwrap();
    let resource = Resource::new("figure.heic", ContentType::Media)
        .with_media_type("image/heic")
        .with_fallback(fallback.as_str());
    writer.add_resource(resource, PNG).unwrap();
    writer.close().unwrap();

    let mut archive = finish(writer);
    let xml = read_entry(&mut archive, "OEBPS/package.opf");
    assert!(xml.contains(
        r#"<item id="id02" href="figure.heic" media-type="image/heic" fallback="id01"/>"#
    ));
}

#[test]
fn test_package_ids_are_unique() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer
        .metadata_mut()
        .add_identifier("pub-id", "urn:isbn:9780000000000")
        .add_identifier("pub-id", "doi:10.1000/1")
        .add_identifier("id01", "urn:x:other");
    writer.add_content("a.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[]).unwrap();
    writer.close().unwrap();

    let mut archive = finish(writer);
    let package = parse_package(&read_entry(&mut archive, "OEBPS/package.opf"));
    assert_eq!(package.unique_identifier, "pub-id");

    let mut ids: Vec<String> = package
        .metadata
        .iter()
        .filter_map(|(_, id, _)| id.clone())
        .chain(package.items.iter().map(|item| item.id.clone()))
        .collect();
    assert_eq!(ids.iter().filter(|id| id.as_str() == "pub-id").count(), 1);
    assert_eq!(ids.iter().filter(|id| id.as_str() == "id01").count(), 1);
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert_eq!(package.items[0].id, "id01");
}

#[test]
fn test_ncx_toc_and_page_spreads() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    let left = Resource::new("text/chapter one.xhtml", ContentType::Primary)
        .with_spine_property("page-spread-left");
    writer.add_resource(left, CHAPTER.as_bytes()).unwrap();
    let ncx = writer
        .add_content("toc.ncx", ContentType::Media, &b"<ncx/>"[..], &[])
        .unwrap();
    writer.package_options_mut().toc = Some(ncx);
    writer.close().unwrap();

    let mut archive = finish(writer);
    assert!(archive.by_name("OEBPS/text/chapter one.xhtml").is_ok());
    let xml = read_entry(&mut archive, "OEBPS/package.opf");
    assert!(xml.contains(
        r#"<item id="id01" href="text/chapter%20one.xhtml" media-type="application/xhtml+xml"/>"#
    ));
    assert!(xml.contains(r#"<item id="id02" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#));
    assert!(xml.contains(r#"<spine toc="id02">"#));
    assert!(xml.contains(r#"<itemref idref="id01" properties="page-spread-left"/>"#));
}

#[test]
fn test_add_after_close_does_not_touch_archive() {
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer.add_content("a.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[]).unwrap();
    writer.close().unwrap();

    let err = writer
        .add_content("b.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[])
        .unwrap_err();
    assert!(matches!(err, Error::ClosedWriter));
    assert_eq!(writer.manifest().len(), 1);

    let mut archive = finish(writer);
    assert_eq!(archive.len(), 4);
    assert!(archive.by_name("OEBPS/b.xhtml").is_err());
}

#[test]
fn test_add_file_from_disk() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("style.css");
    std::fs::write(&source, "body { margin: 0 }").unwrap();

    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer.add_file(&source, "css/style.css", ContentType::Media, &[]).unwrap();
    let err = writer
        .add_file(dir.path().join("missing.css"), "css/missing.css", ContentType::Media, &[])
        .unwrap_err();
    assert!(err.is_stream_io());
    assert_eq!(writer.manifest().len(), 1);
    assert_eq!(writer.manifest()[0].media_type, "text/css");

    writer.close().unwrap();
    let mut archive = finish(writer);
    assert_eq!(read_entry(&mut archive, "OEBPS/css/style.css"), "body { margin: 0 }");
}

#[test]
fn test_abandoned_publication_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.epub");

    let mut writer = Writer::create(&path).unwrap();
    writer.add_content("a.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[]).unwrap();
    drop(writer);

    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// In-memory sink whose commit always fails.
struct RefusingSink(Cursor<Vec<u8>>);

impl Write for RefusingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Seek for RefusingSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

impl Sink for RefusingSink {
    fn commit(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
    }
}

#[test]
fn test_commit_failure_is_reported() {
    let mut writer = Writer::new(RefusingSink(Cursor::new(Vec::new()))).unwrap();
    writer.add_content("a.xhtml", ContentType::Primary, CHAPTER.as_bytes(), &[]).unwrap();

    let err = writer.close().unwrap_err();
    assert!(err.is_stream_io());
    assert!(err.to_string().contains("committing publication"));
    assert!(writer.is_closed());
    assert!(matches!(writer.close(), Err(Error::ClosedWriter)));
    assert!(writer.into_inner().is_none());
}
