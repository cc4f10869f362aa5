//! Placeholder parser for `{{name}}` syntax.
//!
//! Parses strings to extract placeholder references with their byte
//! spans, so substitution can splice values without re-scanning.

use std::ops::Range;

/// A parsed placeholder reference in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRef {
    /// The name between the braces, trimmed.
    pub name: String,
    /// Byte range in the original string, braces included.
    pub span: Range<usize>,
}

impl PlaceholderRef {
    /// Creates a placeholder reference.
    #[must_use]
    pub fn new(name: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Parses a string and extracts all placeholder references.
///
/// Names may contain dots (`{{user.id}}`) for structured lookups.
/// Unterminated `{{` sequences are left alone.
#[must_use]
pub fn parse_placeholders(input: &str) -> Vec<PlaceholderRef> {
    let mut references = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if ch != '{' {
            continue;
        }
        let Some((_, '{')) = chars.peek() else {
            continue;
        };
        chars.next();

        let start = i;
        let mut name = String::new();
        let mut found_end = false;

        while let Some((_, ch)) = chars.next() {
            if ch == '}' {
                if let Some((end_idx, '}')) = chars.peek() {
                    let end = *end_idx + 1;
                    chars.next();

                    let trimmed = name.trim();
                    if !trimmed.is_empty() {
                        references.push(PlaceholderRef::new(trimmed, start..end));
                    }
                    found_end = true;
                    break;
                }
            }
            name.push(ch);
        }

        // Unterminated reference: nothing further can close it.
        if !found_end {
            break;
        }
    }

    references
}

/// Returns whether the input contains any placeholder syntax.
#[must_use]
pub fn has_placeholders(input: &str) -> bool {
    input.contains("{{") && input.contains("}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_names_and_spans() {
        let refs = parse_placeholders("https://{{host}}/users/{{user.id}}");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "host");
        assert_eq!(&"https://{{host}}/users/{{user.id}}"[refs[0].span.clone()], "{{host}}");
        assert_eq!(refs[1].name, "user.id");
    }

    #[test]
    fn trims_whitespace_inside_braces() {
        let refs = parse_placeholders("{{ host }}");
        assert_eq!(refs[0].name, "host");
    }

    #[test]
    fn ignores_unterminated_and_empty_references() {
        assert!(parse_placeholders("hello {{name").is_empty());
        assert!(parse_placeholders("{{}}").is_empty());
        assert!(parse_placeholders("plain text").is_empty());
    }

    #[test]
    fn single_braces_are_not_references() {
        assert!(parse_placeholders("{host}").is_empty());
    }
}
