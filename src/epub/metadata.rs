//! Publication metadata (Dublin Core elements + EPUB 3 refinements).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};

use super::identifier;
use crate::error::{Error, Result};

/// Property refined by the single `dcterms:modified` meta entry.
pub const MODIFIED_PROPERTY: &str = "dcterms:modified";

/// Timestamp layout required for `dcterms:modified`.
pub const MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub(crate) const DEFAULT_LANGUAGE: &str = "en";
pub(crate) const DEFAULT_TITLE: &str = "Untitled";
pub(crate) const DEFAULT_IDENTIFIER_ID: &str = "uuid";

/// Base text direction of an element's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Dublin Core elements that carry language-tagged text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcTerm {
    Title,
    Creator,
    Contributor,
    Publisher,
    Subject,
    Rights,
    Description,
    Coverage,
    Relation,
}

impl DcTerm {
    /// Serialization order after `dc:identifier`.
    pub const ALL: [DcTerm; 9] = [
        DcTerm::Title,
        DcTerm::Creator,
        DcTerm::Contributor,
        DcTerm::Publisher,
        DcTerm::Subject,
        DcTerm::Rights,
        DcTerm::Description,
        DcTerm::Coverage,
        DcTerm::Relation,
    ];

    /// Qualified element name, e.g. `dc:title`.
    pub fn element_name(&self) -> &'static str {
        match self {
            DcTerm::Title => "dc:title",
            DcTerm::Creator => "dc:creator",
            DcTerm::Contributor => "dc:contributor",
            DcTerm::Publisher => "dc:publisher",
            DcTerm::Subject => "dc:subject",
            DcTerm::Rights => "dc:rights",
            DcTerm::Description => "dc:description",
            DcTerm::Coverage => "dc:coverage",
            DcTerm::Relation => "dc:relation",
        }
    }
}

/// A text value with optional `id`, `xml:lang` and `dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangString {
    pub id: Option<String>,
    pub value: String,
    pub lang: Option<String>,
    pub dir: Option<Direction>,
}

impl LangString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn with_dir(mut self, dir: Direction) -> Self {
        self.dir = Some(dir);
        self
    }
}

impl From<&str> for LangString {
    fn from(value: &str) -> Self {
        LangString::new(value)
    }
}

impl From<String> for LangString {
    fn from(value: String) -> Self {
        LangString::new(value)
    }
}

/// A plain element value with an optional `id` (identifiers, languages, date).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub id: Option<String>,
    pub value: String,
}

impl Element {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: None,
            value: value.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A `meta` element: a property/value statement, optionally refining
/// another element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub id: Option<String>,
    pub property: String,
    pub value: String,
    /// Reference to the refined element, e.g. `#title`.
    pub refines: Option<String>,
    pub scheme: Option<String>,
    pub lang: Option<String>,
}

impl Meta {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// A statement about the element whose `id` is `target`.
    pub fn refining(
        target: impl AsRef<str>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let target = target.as_ref();
        let refines = if target.starts_with('#') {
            target.to_string()
        } else {
            format!("#{}", target)
        };
        Self {
            refines: Some(refines),
            ..Self::new(property, value)
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    fn is_modified(&self) -> bool {
        self.property == MODIFIED_PROPERTY && self.refines.is_none()
    }
}

/// A `link` element associating an external or contained resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub rel: String,
    pub id: Option<String>,
    pub refines: Option<String>,
    pub media_type: Option<String>,
    pub properties: Option<String>,
}

impl Link {
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            ..Default::default()
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// Kind of a `dc:title`, recorded as a `title-type` refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleType {
    Main,
    Subtitle,
    Short,
    Collection,
    Edition,
    Expanded,
}

impl TitleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleType::Main => "main",
            TitleType::Subtitle => "subtitle",
            TitleType::Short => "short",
            TitleType::Collection => "collection",
            TitleType::Edition => "edition",
            TitleType::Expanded => "expanded",
        }
    }
}

/// Publication-level descriptive metadata.
///
/// Title, language and identifier may be left empty; defaults are filled in
/// when the publication is closed.
///
/// # Example
///
/// ```
/// use quire::{Metadata, LangString};
///
/// let mut meta = Metadata::new();
/// meta.add_title("The Book");
/// meta.add_subtitle("A Subtitle");
/// meta.add_author("Author Name");
/// meta.add_language("en");
/// meta.add_description(LangString::new("Beschreibung").with_lang("de"));
/// meta.set_date("2014-03")?;
/// assert_eq!(meta.titles().len(), 2);
/// # Ok::<(), quire::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    identifiers: Vec<Element>,
    titles: Vec<LangString>,
    languages: Vec<Element>,
    creators: Vec<LangString>,
    contributors: Vec<LangString>,
    publishers: Vec<LangString>,
    subjects: Vec<LangString>,
    rights: Vec<LangString>,
    descriptions: Vec<LangString>,
    coverages: Vec<LangString>,
    relations: Vec<LangString>,
    formats: Vec<Element>,
    date: Option<Element>,
    meta: Vec<Meta>,
    links: Vec<Link>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values recorded for a Dublin Core text element.
    pub fn get(&self, term: DcTerm) -> &[LangString] {
        match term {
            DcTerm::Title => &self.titles,
            DcTerm::Creator => &self.creators,
            DcTerm::Contributor => &self.contributors,
            DcTerm::Publisher => &self.publishers,
            DcTerm::Subject => &self.subjects,
            DcTerm::Rights => &self.rights,
            DcTerm::Description => &self.descriptions,
            DcTerm::Coverage => &self.coverages,
            DcTerm::Relation => &self.relations,
        }
    }

    fn list_mut(&mut self, term: DcTerm) -> &mut Vec<LangString> {
        match term {
            DcTerm::Title => &mut self.titles,
            DcTerm::Creator => &mut self.creators,
            DcTerm::Contributor => &mut self.contributors,
            DcTerm::Publisher => &mut self.publishers,
            DcTerm::Subject => &mut self.subjects,
            DcTerm::Rights => &mut self.rights,
            DcTerm::Description => &mut self.descriptions,
            DcTerm::Coverage => &mut self.coverages,
            DcTerm::Relation => &mut self.relations,
        }
    }

    /// Append a value to a Dublin Core text element.
    pub fn add(&mut self, term: DcTerm, value: impl Into<LangString>) -> &mut Self {
        self.list_mut(term).push(value.into());
        self
    }

    pub fn add_title(&mut self, title: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Title, title)
    }

    /// Add a title and refine it with its `title-type`.
    ///
    /// Returns the id assigned to the new `dc:title`.
    pub fn add_typed_title(&mut self, title: impl Into<LangString>, kind: TitleType) -> String {
        let mut title = title.into();
        let id = match title.id.clone() {
            Some(id) => id,
            None => self.unique_id(kind.as_str()),
        };
        title.id = Some(id.clone());
        self.titles.push(title);
        self.meta
            .push(Meta::refining(&id, "title-type", kind.as_str()));
        id
    }

    pub fn add_subtitle(&mut self, subtitle: impl Into<LangString>) -> String {
        self.add_typed_title(subtitle, TitleType::Subtitle)
    }

    /// Add the title of a collection this publication belongs to, with its
    /// position in that collection when known.
    pub fn add_collection(&mut self, name: impl Into<LangString>, position: Option<&str>) -> String {
        let id = self.add_typed_title(name, TitleType::Collection);
        if let Some(position) = position {
            self.meta
                .push(Meta::refining(&id, "group-position", position));
        }
        id
    }

    pub fn add_creator(&mut self, creator: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Creator, creator)
    }

    /// Add a creator with the MARC relator role `aut`.
    pub fn add_author(&mut self, name: impl Into<LangString>) -> String {
        let mut creator = name.into();
        let id = match creator.id.clone() {
            Some(id) => id,
            None => self.unique_id("creator"),
        };
        creator.id = Some(id.clone());
        self.creators.push(creator);
        self.meta
            .push(Meta::refining(&id, "role", "aut").with_scheme("marc:relators"));
        id
    }

    pub fn add_contributor(&mut self, contributor: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Contributor, contributor)
    }

    pub fn add_publisher(&mut self, publisher: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Publisher, publisher)
    }

    pub fn add_subject(&mut self, subject: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Subject, subject)
    }

    pub fn add_rights(&mut self, rights: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Rights, rights)
    }

    pub fn add_description(&mut self, description: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Description, description)
    }

    pub fn add_coverage(&mut self, coverage: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Coverage, coverage)
    }

    pub fn add_relation(&mut self, relation: impl Into<LangString>) -> &mut Self {
        self.add(DcTerm::Relation, relation)
    }

    pub fn add_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.formats.push(Element::new(format));
        self
    }

    pub fn add_language(&mut self, tag: impl Into<String>) -> &mut Self {
        self.languages.push(Element::new(tag));
        self
    }

    /// Add an identifier. A non-empty `id` makes it eligible as the
    /// package's unique identifier; the first such identifier wins.
    /// An `id` that is already in use is renamed when the publication is
    /// closed.
    pub fn add_identifier(&mut self, id: &str, value: impl Into<String>) -> &mut Self {
        let mut element = Element::new(value);
        if !id.is_empty() {
            element.id = Some(id.to_string());
        }
        self.identifiers.push(element);
        self
    }

    pub fn add_meta(&mut self, meta: Meta) -> &mut Self {
        self.meta.push(meta);
        self
    }

    pub fn add_link(&mut self, link: Link) -> &mut Self {
        self.links.push(link);
        self
    }

    /// Set the publication date.
    ///
    /// Accepts an RFC 3339 timestamp, `YYYY-MM-DD`, `YYYY-MM`, or `YYYY`.
    /// Anything else fails with [`Error::InvalidDate`] and leaves the
    /// current date untouched.
    pub fn set_date(&mut self, value: &str) -> Result<()> {
        if !is_valid_date(value) {
            return Err(Error::InvalidDate(value.to_string()));
        }
        self.date = Some(Element::new(value));
        Ok(())
    }

    pub fn identifiers(&self) -> &[Element] {
        &self.identifiers
    }

    pub fn titles(&self) -> &[LangString] {
        &self.titles
    }

    pub fn languages(&self) -> &[Element] {
        &self.languages
    }

    pub fn formats(&self) -> &[Element] {
        &self.formats
    }

    pub fn date(&self) -> Option<&Element> {
        self.date.as_ref()
    }

    pub fn meta(&self) -> &[Meta] {
        &self.meta
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// The id of the identifier that serves as the unique identifier, if any.
    pub fn unique_identifier(&self) -> Option<&str> {
        self.identifiers
            .iter()
            .filter_map(|item| item.id.as_deref())
            .find(|id| !id.is_empty())
    }

    /// Fill in required elements, make every `id` unique and stamp the
    /// modification time. `reserved` holds ids used elsewhere in the package
    /// document (the manifest item ids).
    ///
    /// Returns the id of the unique identifier.
    pub(crate) fn finalize(
        &mut self,
        modified: DateTime<Utc>,
        reserved: &HashSet<String>,
    ) -> Result<String> {
        if self.unique_identifier().is_none() {
            let id = self.unique_id(DEFAULT_IDENTIFIER_ID);
            let urn = identifier::new_urn()?;
            self.identifiers.push(Element::new(urn).with_id(id));
        }
        self.dedupe_ids(reserved);
        let uid = self
            .unique_identifier()
            .unwrap_or(DEFAULT_IDENTIFIER_ID)
            .to_string();

        if self.languages.is_empty() {
            self.add_language(DEFAULT_LANGUAGE);
        }
        if self.titles.is_empty() {
            self.add_title(DEFAULT_TITLE);
        }

        let stamp = modified.format(MODIFIED_FORMAT).to_string();
        let mut seen = false;
        self.meta.retain_mut(|meta| {
            if !meta.is_modified() {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            meta.value = stamp.clone();
            true
        });
        if !seen {
            self.meta.push(Meta::new(MODIFIED_PROPERTY, stamp));
        }

        Ok(uid)
    }

    /// Every `id` slot. Identifiers come first, so the unique identifier
    /// keeps its id when another element repeats it.
    fn id_slots(&mut self) -> Vec<&mut Option<String>> {
        let mut slots: Vec<&mut Option<String>> = Vec::new();
        slots.extend(self.identifiers.iter_mut().map(|e| &mut e.id));
        for list in [
            &mut self.titles,
            &mut self.creators,
            &mut self.contributors,
            &mut self.publishers,
            &mut self.subjects,
            &mut self.rights,
            &mut self.descriptions,
            &mut self.coverages,
            &mut self.relations,
        ] {
            for value in list {
                slots.push(&mut value.id);
            }
        }
        slots.extend(
            self.languages
                .iter_mut()
                .chain(&mut self.formats)
                .chain(self.date.iter_mut())
                .map(|e| &mut e.id),
        );
        slots.extend(self.meta.iter_mut().map(|m| &mut m.id));
        slots.extend(self.links.iter_mut().map(|l| &mut l.id));
        slots
    }

    /// Rename every id that repeats an earlier one or is in `reserved`.
    ///
    /// When the first element carrying an id is renamed because of a
    /// reserved clash, refinements pointing at it follow the new id.
    fn dedupe_ids(&mut self, reserved: &HashSet<String>) {
        let existing: HashSet<String> = self.ids().map(str::to_string).collect();
        let mut taken = reserved.clone();
        let mut seen = HashSet::new();
        let mut moved: HashMap<String, String> = HashMap::new();

        for slot in self.id_slots() {
            let Some(id) = slot.as_mut().filter(|id| !id.is_empty()) else {
                continue;
            };
            if taken.insert(id.clone()) {
                seen.insert(id.clone());
                continue;
            }
            let renamed = (2..)
                .map(|n| format!("{}-{}", id, n))
                .find(|candidate| !taken.contains(candidate) && !existing.contains(candidate))
                .unwrap_or_else(|| id.clone());
            if seen.insert(id.clone()) {
                moved.insert(id.clone(), renamed.clone());
            }
            taken.insert(renamed.clone());
            *id = renamed;
        }

        if moved.is_empty() {
            return;
        }
        let targets = self
            .meta
            .iter_mut()
            .map(|m| &mut m.refines)
            .chain(self.links.iter_mut().map(|l| &mut l.refines));
        for target in targets.flatten() {
            if let Some(new) = target.strip_prefix('#').and_then(|old| moved.get(old)) {
                *target = format!("#{}", new);
            }
        }
    }

    fn ids(&self) -> impl Iterator<Item = &str> {
        let text = DcTerm::ALL
            .into_iter()
            .flat_map(|term| self.get(term).iter().filter_map(|s| s.id.as_deref()));
        let plain = self
            .identifiers
            .iter()
            .chain(&self.languages)
            .chain(&self.formats)
            .chain(self.date.iter())
            .filter_map(|e| e.id.as_deref());
        let meta = self.meta.iter().filter_map(|m| m.id.as_deref());
        let links = self.links.iter().filter_map(|l| l.id.as_deref());
        text.chain(plain).chain(meta).chain(links)
    }

    /// `base`, or `base-2`, `base-3`, ... if that id is already taken.
    fn unique_id(&self, base: &str) -> String {
        let taken = |candidate: &str| self.ids().any(|id| id == candidate);
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

fn is_valid_date(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    let bytes = value.as_bytes();
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    match bytes.len() {
        4 => digits(0..4),
        7 => {
            bytes[4] == b'-'
                && digits(0..4)
                && digits(5..7)
                && NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").is_ok()
        }
        10 => {
            bytes[4] == b'-'
                && bytes[7] == b'-'
                && digits(0..4)
                && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        }
        _ => false,
    }
}
