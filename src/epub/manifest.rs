//! Manifest and spine bookkeeping.
//!
//! Every added resource gets exactly one [`ManifestItem`] with a sequential
//! id (`id01`, `id02`, ...). Primary and auxiliary content is also appended to
//! the spine, whose order is the order of the calls.

use std::collections::HashSet;

use super::media_type::media_type_for;
use crate::error::{Error, Result};

/// How a resource participates in the reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Part of the linear reading order.
    Primary,
    /// In the spine, but marked `linear="no"`.
    Auxiliary,
    /// Not in the spine (images, styles, fonts, ...).
    Media,
}

impl ContentType {
    fn in_spine(&self) -> bool {
        !matches!(self, ContentType::Media)
    }
}

/// An `item` of the package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Path relative to the package document.
    pub href: String,
    pub media_type: String,
    /// Space-separated property tags, e.g. `cover-image` or `nav`.
    pub properties: Option<String>,
    pub fallback: Option<String>,
    pub media_overlay: Option<String>,
}

/// An `itemref` of the spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineEntry {
    pub idref: String,
    pub linear: bool,
    /// Space-separated rendition properties, e.g. `page-spread-left`.
    pub properties: Option<String>,
}

impl SpineEntry {
    pub fn new(idref: impl Into<String>, linear: bool) -> Self {
        Self {
            idref: idref.into(),
            linear,
            properties: None,
        }
    }

    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = Some(properties.into());
        self
    }
}

/// Description of a resource to add to a publication.
///
/// # Example
///
/// ```
/// use quire::{ContentType, Resource};
///
/// let cover = Resource::new("images/cover.jpg", ContentType::Media)
///     .with_property("cover-image");
/// assert_eq!(cover.name(), "images/cover.jpg");
/// ```
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    content_type: ContentType,
    properties: Vec<String>,
    spine_properties: Vec<String>,
    media_type: Option<String>,
    fallback: Option<String>,
    media_overlay: Option<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            name: name.into(),
            content_type,
            properties: Vec::new(),
            spine_properties: Vec::new(),
            media_type: None,
            fallback: None,
            media_overlay: None,
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.properties.push(property.into());
        self
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(properties.into_iter().map(Into::into));
        self
    }

    /// Add a property to the resource's `itemref` rather than its manifest
    /// item. Ignored for media, which has no spine entry.
    pub fn with_spine_property(mut self, property: impl Into<String>) -> Self {
        self.spine_properties.push(property.into());
        self
    }

    /// Use this media type instead of the one derived from the extension.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Id of the manifest item to use when this one is not supported.
    pub fn with_fallback(mut self, idref: impl Into<String>) -> Self {
        self.fallback = Some(idref.into());
        self
    }

    /// Id of the media overlay document for this item.
    pub fn with_media_overlay(mut self, idref: impl Into<String>) -> Self {
        self.media_overlay = Some(idref.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }
}

/// Normalize a resource name to a forward-slash relative path.
///
/// Backslashes become slashes; empty and `.` segments are dropped. Names
/// that are empty or climb out of the content root with `..` are rejected.
pub fn normalize_name(name: &str) -> Result<String> {
    let slashed = name.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(Error::InvalidResourceName(name.to_string())),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(Error::InvalidResourceName(name.to_string()));
    }
    Ok(segments.join("/"))
}

fn joined(properties: &[String]) -> Option<String> {
    Some(properties.join(" ")).filter(|p| !p.is_empty())
}

/// A manifest addition that has been validated but not yet recorded.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub item: ManifestItem,
    pub spine: Option<SpineEntry>,
    counter: u32,
}

/// Ordered manifest and spine, plus the resource counter.
#[derive(Debug, Default)]
pub(crate) struct Manifest {
    items: Vec<ManifestItem>,
    spine: Vec<SpineEntry>,
    hrefs: HashSet<String>,
    reserved: HashSet<String>,
    counter: u32,
}

impl Manifest {
    /// A manifest that refuses the given names in addition to duplicates
    /// (paths the writer fills itself, such as the package document).
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: reserved.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Validate a resource and compute its manifest record without
    /// changing any state.
    pub fn prepare(&self, resource: &Resource) -> Result<Pending> {
        let href = normalize_name(&resource.name)?;
        if self.hrefs.contains(&href) || self.reserved.contains(&href) {
            return Err(Error::DuplicateResource(href));
        }

        let counter = self.counter.checked_add(1).ok_or(Error::TooManyResources)?;
        let id = format!("id{:02x}", counter);
        let media_type = resource
            .media_type
            .clone()
            .unwrap_or_else(|| media_type_for(&href));
        let properties = joined(&resource.properties);

        let spine = resource.content_type.in_spine().then(|| SpineEntry {
            idref: id.clone(),
            linear: resource.content_type != ContentType::Auxiliary,
            properties: joined(&resource.spine_properties),
        });

        Ok(Pending {
            item: ManifestItem {
                id,
                href,
                media_type,
                properties,
                fallback: resource.fallback.clone(),
                media_overlay: resource.media_overlay.clone(),
            },
            spine,
            counter,
        })
    }

    /// Record a prepared addition.
    pub fn commit(&mut self, pending: Pending) -> &ManifestItem {
        self.counter = pending.counter;
        self.hrefs.insert(pending.item.href.clone());
        if let Some(entry) = pending.spine {
            self.spine.push(entry);
        }
        self.items.push(pending.item);
        &self.items[self.items.len() - 1]
    }

    pub fn items(&self) -> &[ManifestItem] {
        &self.items
    }

    pub fn spine(&self) -> &[SpineEntry] {
        &self.spine
    }

    #[cfg(test)]
    pub fn counter(&self) -> u32 {
        self.counter
    }
}
