//! YAML frontmatter alias extraction
//!
//! Notes declare alternative link names in their frontmatter:
//! ```markdown
//! ---
//! aliases: [Alias One, Other Name]
//! ---
//!
//! Note content here...
//! ```
//! A single string and the older singular `alias` key are accepted too.

use serde_yaml::Value;

const ALIAS_KEYS: &[&str] = &["aliases", "alias"];

/// Split a note into frontmatter YAML string and content, without parsing the YAML.
///
/// Returns (frontmatter_yaml, content) where frontmatter_yaml is None if
/// no valid frontmatter block was found.
pub fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    if !raw.starts_with("---") {
        return (None, raw);
    }

    let after_opening = &raw[3..];

    let content_start = if let Some(rest) = after_opening.strip_prefix('\n') {
        rest
    } else if let Some(rest) = after_opening.strip_prefix("\r\n") {
        rest
    } else {
        // No newline after opening --- means invalid frontmatter
        return (None, raw);
    };

    match find_closing_delimiter(content_start) {
        Some(close_pos) => {
            let yaml = &content_start[..close_pos];
            let after_close = &content_start[close_pos + 3..];
            let content = after_close
                .strip_prefix('\n')
                .or_else(|| after_close.strip_prefix("\r\n"))
                .unwrap_or(after_close);
            (Some(yaml), content)
        }
        None => (None, raw),
    }
}

/// Find the position of the closing --- delimiter (must be at start of line)
fn find_closing_delimiter(s: &str) -> Option<usize> {
    let mut pos = 0;
    for line in s.split('\n') {
        if line == "---" || line == "---\r" {
            return Some(pos);
        }
        pos += line.len() + 1;
    }
    None
}

/// Collect the aliases a note declares in its frontmatter.
///
/// Invalid YAML or a missing block yields an empty list. Blank entries are
/// dropped and duplicates keep their first position.
pub fn extract_aliases(raw: &str) -> Vec<String> {
    let Some(yaml) = split_frontmatter(raw).0 else {
        return Vec::new();
    };
    let Ok(Value::Mapping(map)) = serde_yaml::from_str::<Value>(yaml) else {
        return Vec::new();
    };

    let mut aliases: Vec<String> = Vec::new();
    for key in ALIAS_KEYS {
        let Some(value) = map.get(*key) else {
            continue;
        };
        let found: Vec<String> = match value {
            Value::String(s) => vec![s.clone()],
            Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
            other => scalar_to_string(other).into_iter().collect(),
        };
        for alias in found {
            let alias = alias.trim();
            if !alias.is_empty() && !aliases.iter().any(|a| a == alias) {
                aliases.push(alias.to_string());
            }
        }
    }
    aliases
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_note_with_frontmatter() {
        let raw = "---\ntitle: Test\n---\n\nContent here";
        let (yaml, content) = split_frontmatter(raw);
        assert_eq!(yaml, Some("title: Test\n"));
        assert_eq!(content, "\nContent here");
    }

    #[test]
    fn split_note_without_frontmatter() {
        let raw = "Just content, no frontmatter";
        let (yaml, content) = split_frontmatter(raw);
        assert!(yaml.is_none());
        assert_eq!(content, raw);
    }

    #[test]
    fn split_note_with_incomplete_frontmatter() {
        let raw = "---\ntitle: Test\nNo closing delimiter";
        let (yaml, content) = split_frontmatter(raw);
        assert!(yaml.is_none());
        assert_eq!(content, raw);
    }

    #[test]
    fn aliases_from_flow_list() {
        let raw = "---\naliases: [Alias One, Other Name]\n---\nBody";
        assert_eq!(extract_aliases(raw), vec!["Alias One", "Other Name"]);
    }

    #[test]
    fn aliases_from_block_list() {
        let raw = "---\ntitle: X\naliases:\n  - First\n  - Second\n---\nBody";
        assert_eq!(extract_aliases(raw), vec!["First", "Second"]);
    }

    #[test]
    fn alias_from_single_string_and_legacy_key() {
        let raw = "---\naliases: Solo\nalias: Legacy\n---\n";
        assert_eq!(extract_aliases(raw), vec!["Solo", "Legacy"]);
    }

    #[test]
    fn aliases_skip_blanks_and_duplicates() {
        let raw = "---\naliases: [\" Dup \", Dup, \"\", 2024]\n---\n";
        assert_eq!(extract_aliases(raw), vec!["Dup", "2024"]);
    }

    #[test]
    fn aliases_empty_without_frontmatter_or_on_bad_yaml() {
        assert!(extract_aliases("# Title\n\nBody").is_empty());
        assert!(extract_aliases("---\naliases: [unclosed\n---\n").is_empty());
        assert!(extract_aliases("---\n---\nBody").is_empty());
    }
}
