//! Materialized Activity Paths
//!
//! This module is the path codec for the activity taxonomy: it turns display
//! labels into path-segment tokens and composes/parses the dotted
//! materialized paths that address every node in the tree.
//!
//! # Representation
//!
//! A path is a `.`-separated sequence of tokens, one per ancestor from the
//! root down to the node itself (`Obrazovanie.Vysshee_obrazovanie`). Tokens
//! are restricted to `[A-Za-z0-9_]` so that paths stay legal in an ordered
//! text index and descendant lookups can be expressed as key-range scans
//! (see [`ActivityPath::descendant_range`]).
//!
//! The display label and the token are distinct: the label is what callers
//! see, the token is what addresses the node. Two labels can normalize to
//! the same token; the hierarchy store rejects that case as a conflict when
//! it happens at the same tree position.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Errors produced when composing or parsing a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path must contain at least one segment
    #[error("path must contain at least one segment")]
    Empty,

    /// Segments must be non-empty
    #[error("path segment must not be empty")]
    EmptySegment,

    /// Segment contains a character outside the token alphabet
    #[error("invalid character {character:?} in path segment {segment:?}")]
    InvalidCharacter { segment: String, character: char },
}

/// Normalize a display label into a path-segment token.
///
/// The mapping is total and deterministic: ASCII alphanumerics and `_` pass
/// through, Cyrillic letters transliterate (case-preserving), and every
/// other character (whitespace, punctuation, unmapped scripts) becomes `_`.
/// The soft and hard signs contribute nothing, so a label consisting only
/// of those normalizes to an empty token — callers must reject empty tokens
/// before composing a path.
///
/// # Examples
///
/// ```
/// use orgatlas_core::models::normalize_label;
///
/// assert_eq!(normalize_label("Higher education"), "Higher_education");
/// assert_eq!(normalize_label("Образование"), "Obrazovanie");
/// assert_eq!(normalize_label("ООО 'Ромашка'"), "OOO__Romashka_");
/// ```
pub fn normalize_label(label: &str) -> String {
    let mut token = String::with_capacity(label.len());
    for character in label.chars() {
        if character.is_ascii_alphanumeric() || character == '_' {
            token.push(character);
        } else if let Some(mapped) = transliterate(character) {
            token.push_str(mapped);
        } else {
            token.push('_');
        }
    }
    token
}

/// Fixed substitution table for Cyrillic letters.
///
/// Returns `None` for characters outside the table (the caller substitutes
/// `_`). The soft/hard signs map to the empty string.
fn transliterate(character: char) -> Option<&'static str> {
    let mapped = match character {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Е' => "E",
        'Ё' => "Yo",
        'Ж' => "Zh",
        'З' => "Z",
        'И' => "I",
        'Й' => "J",
        'К' => "K",
        'Л' => "L",
        'М' => "M",
        'Н' => "N",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'У' => "U",
        'Ф' => "F",
        'Х' => "H",
        'Ц' => "C",
        'Ч' => "Ch",
        'Ш' => "Sh",
        'Щ' => "Shch",
        'Ъ' => "",
        'Ы' => "Y",
        'Ь' => "",
        'Э' => "E",
        'Ю' => "Yu",
        'Я' => "Ya",
        _ => return None,
    };
    Some(mapped)
}

fn validate_token(token: &str) -> Result<(), PathError> {
    if token.is_empty() {
        return Err(PathError::EmptySegment);
    }
    for character in token.chars() {
        if !character.is_ascii_alphanumeric() && character != '_' {
            return Err(PathError::InvalidCharacter {
                segment: token.to_string(),
                character,
            });
        }
    }
    Ok(())
}

/// Materialized path of an activity node, root token first.
///
/// Paths are immutable after construction; composing a child returns a new
/// value. Serializes as the plain dotted string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityPath(String);

impl ActivityPath {
    /// Create a depth-1 path from a single token.
    pub fn root(token: &str) -> Result<Self, PathError> {
        validate_token(token)?;
        Ok(Self(token.to_string()))
    }

    /// Compose the path of a direct child.
    pub fn child(&self, token: &str) -> Result<Self, PathError> {
        validate_token(token)?;
        Ok(Self(format!("{}{}{}", self.0, PATH_SEPARATOR, token)))
    }

    /// Parse a stored path, validating every segment.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        for segment in path.split(PATH_SEPARATOR) {
            validate_token(segment)?;
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }

    /// Number of segments; equals the node's depth in the tree.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Path of the parent node, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (parent, _) = self.0.rsplit_once(PATH_SEPARATOR)?;
        Some(Self(parent.to_string()))
    }

    /// Segment-granular descendant test, non-strict: every path is a
    /// descendant of itself. `Food.Groceries` is a descendant of `Food`;
    /// `Foodstuff` is not.
    pub fn is_descendant_of(&self, ancestor: &ActivityPath) -> bool {
        if self.0 == ancestor.0 {
            return true;
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == PATH_SEPARATOR as u8
    }

    /// Half-open key range `[path + ".", path + "/")` covering exactly the
    /// strict descendants of this path in an ordered text index.
    ///
    /// Valid because `.` sorts below `/` and every token character sorts
    /// above `/` in ASCII, so `P.<anything>` lands inside the range while
    /// `P` itself and any sibling `P<token-char>...` land outside it.
    pub fn descendant_range(&self) -> (String, String) {
        let lower = format!("{}{}", self.0, PATH_SEPARATOR);
        let upper = format!("{}/", self.0);
        (lower, upper)
    }
}

impl fmt::Display for ActivityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ActivityPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_passes_ascii_alphanumerics_through() {
        assert_eq!(normalize_label("Dairy"), "Dairy");
        assert_eq!(normalize_label("shop_24"), "shop_24");
    }

    #[test]
    fn normalize_replaces_whitespace_and_punctuation() {
        assert_eq!(normalize_label("Higher education"), "Higher_education");
        assert_eq!(normalize_label("Food & Drink"), "Food___Drink");
    }

    #[test]
    fn normalize_transliterates_cyrillic() {
        assert_eq!(normalize_label("Образование"), "Obrazovanie");
        assert_eq!(
            normalize_label("Среднее образование"),
            "Srednee_obrazovanie"
        );
        assert_eq!(normalize_label("Больница"), "Bolnica");
    }

    #[test]
    fn normalize_is_stable() {
        let label = "Молочная продукция №1";
        assert_eq!(normalize_label(label), normalize_label(label));
    }

    #[test]
    fn normalize_can_produce_empty_token() {
        // Soft/hard signs contribute nothing
        assert_eq!(normalize_label("ьъ"), "");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn root_and_child_compose_dotted_paths() {
        let food = ActivityPath::root("Food").unwrap();
        let dairy = food.child("Groceries").unwrap().child("Dairy").unwrap();
        assert_eq!(dairy.as_str(), "Food.Groceries.Dairy");
        assert_eq!(dairy.depth(), 3);
        assert_eq!(dairy.parent().unwrap().as_str(), "Food.Groceries");
        assert_eq!(food.parent(), None);
    }

    #[test]
    fn invalid_tokens_are_rejected() {
        assert_eq!(ActivityPath::root(""), Err(PathError::EmptySegment));
        assert!(matches!(
            ActivityPath::root("no dots."),
            Err(PathError::InvalidCharacter { .. })
        ));
        assert_eq!(ActivityPath::parse("a..b"), Err(PathError::EmptySegment));
        assert_eq!(ActivityPath::parse(""), Err(PathError::Empty));
    }

    #[test]
    fn descendant_test_is_segment_granular() {
        let food = ActivityPath::parse("Food").unwrap();
        let dairy = ActivityPath::parse("Food.Groceries.Dairy").unwrap();
        let foodstuff = ActivityPath::parse("Foodstuff").unwrap();

        assert!(dairy.is_descendant_of(&food));
        assert!(food.is_descendant_of(&food));
        assert!(!foodstuff.is_descendant_of(&food));
        assert!(!food.is_descendant_of(&dairy));
    }

    #[test]
    fn descendant_range_brackets_exactly_the_subtree() {
        let food = ActivityPath::parse("Food").unwrap();
        let (lower, upper) = food.descendant_range();

        assert_eq!(lower, "Food.");
        assert_eq!(upper, "Food/");

        // Every token's first character sorts above the upper sentinel, so
        // siblings sharing the prefix stay outside the range.
        for descendant in ["Food.Groceries", "Food.Groceries.Dairy", "Food._x", "Food.2go"] {
            assert!(descendant >= lower.as_str() && descendant < upper.as_str());
        }
        for outsider in ["Food", "Foodstuff", "Fond.Groceries"] {
            assert!(outsider < lower.as_str() || outsider >= upper.as_str());
        }
    }
}
