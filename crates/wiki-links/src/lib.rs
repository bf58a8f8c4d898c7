//! Resolution of Obsidian-style wiki links to note slugs
//!
//! Supports:
//! - Basic targets: `Note`
//! - Anchors: `Note#Header`, `Note#^block-id`
//! - Display text: `Note#Header|shown text` (ignored for resolution)
//! - Alias matching: a note listing `aliases: [Other Name]` answers to `Other Name`
//!
//! Everything here is pure. Callers supply the candidate notes (usually rows
//! of a metadata index) through the [`LinkCandidate`] trait.

use serde::{Deserialize, Serialize};

/// Extension that marks a file as a linkable document.
pub const DOCUMENT_EXTENSION: &str = ".md";

/// A link target split into the note reference and its optional anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    /// The note reference as written, without anchor or display text: "My Note"
    pub name: String,
    /// Everything after the first `#`: "Header" or "^block-id"
    pub anchor: Option<String>,
}

impl LinkTarget {
    /// Split a raw link (`Note#anchor|display`) into name and anchor.
    ///
    /// Only the first `#` separates: `a#b#c` has the anchor `b#c`. An
    /// empty anchor (`Note#`) is treated as no anchor.
    pub fn parse(raw: &str) -> Self {
        let target = match raw.find('|') {
            Some(pipe_pos) => &raw[..pipe_pos],
            None => raw,
        };

        let (name, anchor) = match target.find('#') {
            Some(hash_pos) => (&target[..hash_pos], Some(&target[hash_pos + 1..])),
            None => (target, None),
        };

        LinkTarget {
            name: name.to_string(),
            anchor: anchor.filter(|a| !a.is_empty()).map(str::to_string),
        }
    }

    /// The comparison key for this target: trimmed and lowercased.
    pub fn normalized_name(&self) -> String {
        self.name.trim().to_lowercase()
    }

    /// Join a resolved slug with this target's anchor: "my-note#header"
    pub fn with_anchor(&self, slug: &str) -> String {
        match &self.anchor {
            Some(anchor) => format!("{}#{}", slug, anchor),
            None => slug.to_string(),
        }
    }
}

/// A note that a wiki link may resolve to.
pub trait LinkCandidate {
    /// Stable remote identifier of the note.
    fn id(&self) -> &str;
    /// File name including extension: "My Note.md"
    fn file_name(&self) -> &str;
    /// Alternative names declared by the note.
    fn aliases(&self) -> &[String];
}

/// Whether a file name denotes a linkable document.
pub fn is_document(file_name: &str) -> bool {
    file_name.ends_with(DOCUMENT_EXTENSION)
}

/// File name without the document extension: "My Note.md" -> "My Note"
pub fn strip_document_extension(file_name: &str) -> &str {
    file_name
        .strip_suffix(DOCUMENT_EXTENSION)
        .unwrap_or(file_name)
}

/// Derive the canonical slug for a document file name.
///
/// Strips the `.md` extension, replaces spaces with hyphens and lowercases:
/// `"My Note.md"` becomes `"my-note"`.
pub fn create_slug(file_name: &str) -> String {
    strip_document_extension(file_name)
        .replace(' ', "-")
        .to_lowercase()
}

/// Resolve a raw wiki link to a slug (anchor re-appended) over `candidates`.
///
/// Non-document candidates are ignored. An exact name match beats an alias
/// match; among equal matches the earliest candidate wins. Returns `None`
/// when nothing matches.
pub fn resolve_link<C: LinkCandidate>(raw: &str, candidates: &[C]) -> Option<String> {
    let target = LinkTarget::parse(raw);
    let matched = resolve_link_candidate(raw, candidates)?;
    Some(target.with_anchor(&create_slug(matched.file_name())))
}

/// The candidate a raw wiki link resolves to, by the same rules as [`resolve_link`].
///
/// Slugs are not unique across folders, so callers that need the note
/// itself should use this rather than feeding the slug to [`slug_to_id`].
pub fn resolve_link_candidate<'a, C: LinkCandidate>(raw: &str, candidates: &'a [C]) -> Option<&'a C> {
    let wanted = LinkTarget::parse(raw).normalized_name();

    let documents = || candidates.iter().filter(|c| is_document(c.file_name()));

    documents()
        .find(|c| strip_document_extension(c.file_name()).to_lowercase() == wanted)
        .or_else(|| {
            documents().find(|c| c.aliases().iter().any(|alias| alias.to_lowercase() == wanted))
        })
}

/// Find the id of the first document whose slug equals `slug` (case-insensitive).
pub fn slug_to_id<'a, C: LinkCandidate>(slug: &str, candidates: &'a [C]) -> Option<&'a str> {
    let wanted = slug.to_lowercase();
    candidates
        .iter()
        .filter(|c| is_document(c.file_name()))
        .find(|c| create_slug(c.file_name()) == wanted)
        .map(|c| c.id())
}
