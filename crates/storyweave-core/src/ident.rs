//! Export identifier synthesis, validation and collision detection.
//!
//! Every story is exported under an identifier. The identifier is either
//! given explicitly or derived from the story's display name:
//!
//! 1. Normalize the name to a slug: a separator is inserted before every
//!    capital, non-word characters become separators, everything is
//!    lower-cased (`"Primary Button"` → `primary-button`).
//! 2. Title-case each slug segment and concatenate (`PrimaryButton`).
//!
//! The result must be a legal, non-reserved identifier and unique across
//! the file. [`IdentifierRegistry`] checks uniqueness incrementally, in the
//! order declarations are resolved.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

/// ECMAScript reserved words, strict-mode reserved words and literals.
pub const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Identifier resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Neither a display name nor an explicit identifier was given.
    #[error("{declaration} has neither a name nor an exportName; add name=\"...\" or exportName=\"...\"")]
    Missing { declaration: String },

    /// The final identifier is not a legal identifier or is reserved.
    #[error("{declaration} resolves to invalid export identifier '{value}': {reason}")]
    Invalid {
        value: String,
        reason: String,
        declaration: String,
    },

    /// Two declarations resolve to the same identifier.
    #[error("duplicate export identifier '{identifier}': {first} and {second} resolve to the same export; set a distinct exportName on one of them")]
    Duplicate {
        identifier: String,
        first: String,
        second: String,
    },
}

/// Returns true if `word` is a reserved word.
pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.contains(&word)
}

/// Returns true if `candidate` is a legal, non-reserved identifier.
pub fn is_valid_identifier(candidate: &str) -> bool {
    IDENTIFIER.is_match(candidate) && !is_reserved_word(candidate)
}

/// Explain why `candidate` is not a valid identifier, if it is not.
fn invalid_reason(candidate: &str) -> Option<String> {
    if candidate.is_empty() {
        Some("identifier is empty".to_string())
    } else if !IDENTIFIER.is_match(candidate) {
        Some("must start with a letter, '_' or '$' and contain only letters, digits, '_' or '$'".to_string())
    } else if is_reserved_word(candidate) {
        Some("reserved word".to_string())
    } else {
        None
    }
}

/// Normalize a display name to a lower-case, dash-separated slug.
///
/// Word characters are ASCII letters, digits and `_`; everything else
/// separates segments.
pub fn name_to_slug(name: &str) -> String {
    fn push_separator(slug: &mut String) {
        if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let mut slug = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            push_separator(&mut slug);
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_ascii_alphanumeric() || ch == '_' {
            slug.push(ch);
        } else {
            push_separator(&mut slug);
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Title-case every slug segment and concatenate them.
pub fn slug_to_identifier(slug: &str) -> String {
    slug.split('-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Derive an export identifier from a display name.
///
/// Derivation is deterministic: the same name always yields the same
/// identifier. The result is not validated.
pub fn derive_identifier(name: &str) -> String {
    slug_to_identifier(&name_to_slug(name))
}

/// Turn an identifier back into a human display name
/// (`PrimaryButton` → `Primary Button`).
pub fn identifier_to_display_name(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    let mut prev: Option<char> = None;
    for ch in identifier.chars() {
        if ch == '_' || ch == '$' {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            prev = None;
            continue;
        }
        let boundary = match prev {
            Some(p) => ch.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()),
            None => false,
        };
        if boundary {
            out.push(' ');
        }
        if out.is_empty() || out.ends_with(' ') {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }
    out.trim_end().to_string()
}

/// Validate an explicit identifier, returning it unchanged when legal.
pub fn validate_identifier(candidate: &str, declaration: &str) -> Result<String, IdentifierError> {
    match invalid_reason(candidate) {
        None => Ok(candidate.to_string()),
        Some(reason) => Err(IdentifierError::Invalid {
            value: candidate.to_string(),
            reason,
            declaration: declaration.to_string(),
        }),
    }
}

/// Resolve the export identifier of one declaration.
///
/// An explicit identifier wins over derivation from the display name.
pub fn resolve_identifier(
    explicit: Option<&str>,
    name: Option<&str>,
    declaration: &str,
) -> Result<String, IdentifierError> {
    match (explicit, name) {
        (Some(explicit), _) => validate_identifier(explicit, declaration),
        (None, Some(name)) => validate_identifier(&derive_identifier(name), declaration),
        (None, None) => Err(IdentifierError::Missing {
            declaration: declaration.to_string(),
        }),
    }
}

/// Tracks resolved identifiers of one file to detect collisions.
#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    seen: HashMap<String, String>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `identifier` for `declaration`, failing if another
    /// declaration already claimed it.
    pub fn register(&mut self, identifier: &str, declaration: &str) -> Result<(), IdentifierError> {
        if let Some(first) = self.seen.get(identifier) {
            return Err(IdentifierError::Duplicate {
                identifier: identifier.to_string(),
                first: first.clone(),
                second: declaration.to_string(),
            });
        }
        self.seen
            .insert(identifier.to_string(), declaration.to_string());
        Ok(())
    }

    /// Returns true if `identifier` has been registered.
    pub fn contains(&self, identifier: &str) -> bool {
        self.seen.contains_key(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod derivation {
        use super::*;

        #[test]
        fn slug_inserts_separators_before_capitals() {
            assert_eq!(name_to_slug("Primary Button"), "primary-button");
            assert_eq!(name_to_slug("MyButton"), "my-button");
            assert_eq!(name_to_slug("with  spaces & symbols!"), "with-spaces-symbols");
            assert_eq!(name_to_slug("snake_case"), "snake_case");
        }

        #[test]
        fn non_ascii_letters_separate_segments() {
            assert_eq!(name_to_slug("Café au lait"), "caf-au-lait");
            assert_eq!(derive_identifier("Café au lait"), "CafAuLait");
            assert_eq!(derive_identifier("Über Größe"), "BerGrE");
            assert_eq!(
                validate_identifier(&derive_identifier("Café au lait"), "Story \"Café au lait\" at 1:1"),
                Ok("CafAuLait".to_string())
            );
        }

        #[test]
        fn identifiers_are_title_cased_segments() {
            assert_eq!(derive_identifier("Primary Button"), "PrimaryButton");
            assert_eq!(derive_identifier("default story"), "DefaultStory");
            assert_eq!(derive_identifier("Default"), "Default");
            assert_eq!(derive_identifier("default"), "Default");
            assert_eq!(derive_identifier("HTML"), "HTML");
            assert_eq!(derive_identifier("Size 2"), "Size2");
        }

        #[test]
        fn derivation_is_deterministic() {
            let name = "Very long story name, with punctuation.";
            assert_eq!(derive_identifier(name), derive_identifier(name));
        }

        #[test]
        fn display_name_from_identifier() {
            assert_eq!(identifier_to_display_name("PrimaryButton"), "Primary Button");
            assert_eq!(identifier_to_display_name("Size2Large"), "Size2 Large");
            assert_eq!(identifier_to_display_name("with_underscore"), "With Underscore");
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn valid_explicit_identifier_is_returned_unchanged() {
            assert_eq!(
                validate_identifier("Primary_2$", "Story \"x\"").unwrap(),
                "Primary_2$"
            );
        }

        #[test]
        fn reserved_and_malformed_identifiers_are_rejected() {
            assert!(!is_valid_identifier("default"));
            assert!(!is_valid_identifier("2fast"));
            assert!(!is_valid_identifier("with-dash"));
            assert!(!is_valid_identifier(""));
            assert!(is_valid_identifier("Default"));
        }

        #[test]
        fn invalid_identifier_names_the_value() {
            let err = resolve_identifier(None, Some("2 fast"), "Story \"2 fast\"").unwrap_err();
            match err {
                IdentifierError::Invalid { value, .. } => assert_eq!(value, "2Fast"),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn missing_name_and_identifier() {
            let err = resolve_identifier(None, None, "Story at 3:1").unwrap_err();
            assert!(matches!(err, IdentifierError::Missing { .. }));
        }

        #[test]
        fn explicit_identifier_wins() {
            assert_eq!(
                resolve_identifier(Some("Custom"), Some("Other name"), "Story").unwrap(),
                "Custom"
            );
        }
    }

    mod registry {
        use super::*;

        #[test]
        fn duplicate_cites_both_declarations() {
            let mut registry = IdentifierRegistry::new();
            registry.register("Default", "Story \"Default\" at 5:1").unwrap();
            let err = registry
                .register("Default", "Story \"default\" at 9:1")
                .unwrap_err();
            assert_eq!(
                err,
                IdentifierError::Duplicate {
                    identifier: "Default".to_string(),
                    first: "Story \"Default\" at 5:1".to_string(),
                    second: "Story \"default\" at 9:1".to_string(),
                }
            );
            let message = err.to_string();
            assert!(message.contains("5:1") && message.contains("9:1"));
        }
    }
}
