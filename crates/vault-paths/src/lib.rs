//! Path utilities for vaults mirrored from a remote hierarchy
//!
//! Handles resolution of embedded-resource references (`![](./img/a.png)`,
//! `![[/assets/a.png]]`) against the note that contains them, plus the
//! small joins and splits the metadata index needs. These are pure functions
//! with no I/O.

mod frontmatter;

pub use frontmatter::{extract_aliases, split_frontmatter};

/// Separator used by remote paths regardless of platform.
pub const SEPARATOR: char = '/';

/// Directory portion of a vault-relative document path.
///
/// `"Folder/Sub/Note.md"` gives `"Folder/Sub"`; a root-level note gives `""`.
pub fn parent_dir(doc_path: &str) -> &str {
    match doc_path.rfind(SEPARATOR) {
        Some(pos) => &doc_path[..pos],
        None => "",
    }
}

/// Last path component: `"Folder/Note.md"` gives `"Note.md"`.
pub fn file_name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

/// Join a folder and a child name, treating an empty folder as the root.
pub fn join(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches(SEPARATOR);
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Collapse runs of separators into one: `"a//b///c"` gives `"a/b/c"`.
pub fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_was_separator = false;
    for ch in path.chars() {
        let is_separator = ch == SEPARATOR;
        if !(is_separator && previous_was_separator) {
            out.push(ch);
        }
        previous_was_separator = is_separator;
    }
    out
}

/// Apply `relative` to `base` with dot-segment semantics.
///
/// `..` pops a segment (never above the root), `.` and empty segments are
/// skipped. The result has no leading or trailing separator.
pub fn resolve_dot_segments(base: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = base.split(SEPARATOR).filter(|p| !p.is_empty()).collect();

    for part in relative.split(SEPARATOR).filter(|p| !p.is_empty()) {
        match part {
            ".." => {
                parts.pop();
            }
            "." => {}
            _ => parts.push(part),
        }
    }

    parts.join("/")
}

/// Resolve an embedded-resource reference to an absolute remote path.
///
/// - `/assets/a.png` is vault-root-relative: `vault_root + raw`
/// - `./x` and `../x` resolve against the directory of `current_doc_path`
/// - anything else is appended to that directory as written
///
/// Repeated separators are collapsed in every case.
pub fn resolve_embed_path(raw: &str, current_doc_path: &str, vault_root: &str) -> String {
    let current_dir = parent_dir(current_doc_path);

    let full = if raw.starts_with(SEPARATOR) {
        format!("{}{}", vault_root, raw)
    } else if raw.starts_with("./") || raw.starts_with("../") {
        format!("{}/{}", vault_root, resolve_dot_segments(current_dir, raw))
    } else {
        format!("{}/{}/{}", vault_root, current_dir, raw)
    };

    collapse_separators(&full)
}

/// Strip the vault root from an absolute path, giving the vault-relative path.
///
/// Returns `None` when `absolute` lies outside `vault_root`.
pub fn vault_relative<'a>(absolute: &'a str, vault_root: &str) -> Option<&'a str> {
    let root = vault_root.trim_end_matches(SEPARATOR);
    if root.is_empty() {
        return Some(absolute.trim_start_matches(SEPARATOR));
    }
    absolute
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
}

/// Validate that a relative path is safe (no directory traversal)
pub fn validate_relative_path(path: &str) -> Result<String, PathValidationError> {
    // Remove leading slash if present
    let clean_path = path.strip_prefix(SEPARATOR).unwrap_or(path);

    if clean_path.split(SEPARATOR).any(|segment| segment == "..") {
        return Err(PathValidationError::DirectoryTraversal);
    }

    if clean_path.starts_with(SEPARATOR) {
        return Err(PathValidationError::AbsolutePath);
    }

    Ok(clean_path.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathValidationError {
    DirectoryTraversal,
    AbsolutePath,
}

impl std::fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathValidationError::DirectoryTraversal => {
                write!(f, "Path contains directory traversal")
            }
            PathValidationError::AbsolutePath => write!(f, "Path is absolute"),
        }
    }
}

impl std::error::Error for PathValidationError {}
