//! Validation schema for submission fields.
//!
//! Every editable path maps to exactly one [`Constraint`]. Textual input is
//! turned into a typed [`Value`] by [`Constraint::coerce`], which is a total
//! function per constraint kind:
//!
//! | constraint      | accepts                                   | produces         |
//! |-----------------|-------------------------------------------|------------------|
//! | `RequiredText`  | any text with a non-blank character       | the text as typed|
//! | `Integer`       | a decimal number with no fraction, >= min | `Integer`        |
//! | `OneOf`         | an exact member of the set                | `Text`           |
//! | `PositiveTimes` | a JSON array of numbers, each > 0         | hundredths-rounded `Times` |
//! | `FreeText`      | anything                                  | `Text`           |
//! | `Tags`          | a JSON array of strings                   | deduplicated `Tags` |
//!
//! Coercion never looks at the value currently stored at the path.

mod fields;

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

pub use fields::{
    Counter, CycleGroup, CycleLeaf, Field, FieldDescriptor, FieldPath, Kind, LeafField,
    NotesLeaf, Phase, CYCLE_TIMES, PATH_SEPARATOR,
};

/// Allowed alliance colors.
pub const ALLIANCES: &[&str] = &["Red", "Blue"];

/// Allowed starting positions.
pub const STARTING_POSITIONS: &[&str] = &["Left", "Center", "Right"];

/// Allowed endgame outcomes.
pub const ENDGAME_OUTCOMES: &[&str] = &["None", "Park", "Shallow Climb", "Deep Climb"];

/// A field value that failed its constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct Rejection {
    /// Textual path of the rejected field.
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

impl Rejection {
    /// Create a rejection for a path.
    #[must_use]
    pub fn new(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// A validation rule attached to a field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// A string with at least one non-whitespace character.
    RequiredText,
    /// A whole number no smaller than `min`.
    Integer {
        /// Smallest accepted value.
        min: u32,
    },
    /// One of a fixed set of strings.
    OneOf(&'static [&'static str]),
    /// A sequence of positive times, kept to two decimal places.
    PositiveTimes,
    /// Any string.
    FreeText,
    /// A set of tag strings.
    Tags,
}

/// A typed, already-validated field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text or an enumerated choice.
    Text(String),
    /// A whole number.
    Integer(u32),
    /// Recorded times in seconds.
    Times(Vec<f64>),
    /// A tag set.
    Tags(BTreeSet<String>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Times(times) => {
                let json = serde_json::to_string(times).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
            Self::Tags(tags) => {
                let json = serde_json::to_string(tags).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// Round a time to hundredths of a second.
#[must_use]
pub fn round_hundredths(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// The constraint applying to a path.
#[must_use]
pub fn constraint(path: FieldPath) -> Constraint {
    match path {
        FieldPath::Leaf(leaf) => match leaf {
            LeafField::ScouterName => Constraint::RequiredText,
            LeafField::TeamNumber | LeafField::QualificationNumber => {
                Constraint::Integer { min: 1 }
            }
            LeafField::Alliance => Constraint::OneOf(ALLIANCES),
            LeafField::StartingPosition => Constraint::OneOf(STARTING_POSITIONS),
            LeafField::Endgame => Constraint::OneOf(ENDGAME_OUTCOMES),
            LeafField::DefenseTimes => Constraint::PositiveTimes,
        },
        FieldPath::Cycle(_, CycleLeaf::Counter(_)) => Constraint::Integer { min: 0 },
        FieldPath::Cycle(_, CycleLeaf::CycleTimes) => Constraint::PositiveTimes,
        FieldPath::Notes(NotesLeaf::Text) => Constraint::FreeText,
        FieldPath::Notes(NotesLeaf::Tags) => Constraint::Tags,
    }
}

/// Look up the constraint for a textual path.
///
/// Returns `None` for paths that do not name an editable field.
#[must_use]
pub fn lookup(path: &str) -> Option<Constraint> {
    path.parse::<FieldPath>().ok().map(constraint)
}

/// Coerce textual input for a path into a typed value.
///
/// # Errors
///
/// Returns a [`Rejection`] naming the path when the input fails the path's constraint.
pub fn coerce(path: FieldPath, raw: &str) -> Result<Value, Rejection> {
    constraint(path)
        .coerce(raw)
        .map_err(|reason| Rejection::new(path, reason))
}

/// Check an already-typed value against the constraint for its path.
///
/// # Errors
///
/// Returns a [`Rejection`] naming the path when the value fails the constraint.
pub fn check(path: FieldPath, value: &Value) -> Result<(), Rejection> {
    constraint(path)
        .check(value)
        .map_err(|reason| Rejection::new(path, reason))
}

impl Constraint {
    /// Coerce textual input into a value satisfying this constraint.
    ///
    /// # Errors
    ///
    /// Returns the human-readable reason the input was refused.
    pub fn coerce(self, raw: &str) -> Result<Value, String> {
        let value = match self {
            Self::RequiredText | Self::FreeText | Self::OneOf(_) => Value::Text(raw.to_string()),
            Self::Integer { .. } => Value::Integer(parse_whole_number(raw)?),
            Self::PositiveTimes => {
                let times: Vec<f64> = serde_json::from_str(raw)
                    .map_err(|e| format!("expected a list of times, e.g. [1.5, 2.25] ({e})"))?;
                Value::Times(times.into_iter().map(round_hundredths).collect())
            }
            Self::Tags => {
                let tags: Vec<String> = serde_json::from_str(raw)
                    .map_err(|e| format!("expected a list of tags, e.g. [\"defense\"] ({e})"))?;
                Value::Tags(tags.into_iter().collect())
            }
        };
        self.check(&value)?;
        Ok(value)
    }

    /// Check a typed value against this constraint.
    ///
    /// # Errors
    ///
    /// Returns the human-readable reason the value was refused.
    pub fn check(self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Self::RequiredText, Value::Text(text)) => {
                if text.trim().is_empty() {
                    Err("is required".to_string())
                } else {
                    Ok(())
                }
            }
            (Self::Integer { min }, Value::Integer(n)) => {
                if *n < min {
                    Err(format!("must be at least {min}"))
                } else {
                    Ok(())
                }
            }
            (Self::OneOf(allowed), Value::Text(text)) => {
                if allowed.contains(&text.as_str()) {
                    Ok(())
                } else {
                    Err(format!("must be one of: {}", allowed.join(", ")))
                }
            }
            (Self::PositiveTimes, Value::Times(times)) => {
                match times.iter().find(|t| !t.is_finite() || **t <= 0.0) {
                    Some(bad) => Err(format!("times must be positive, got {bad}")),
                    None => Ok(()),
                }
            }
            (Self::FreeText, Value::Text(_)) | (Self::Tags, Value::Tags(_)) => Ok(()),
            (expected, _) => Err(format!("expected {}", expected.describe())),
        }
    }

    /// Short description used in messages and the field listing.
    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::RequiredText => "non-empty text".to_string(),
            Self::Integer { min } => format!("whole number >= {min}"),
            Self::OneOf(allowed) => format!("one of: {}", allowed.join(", ")),
            Self::PositiveTimes => "list of positive times".to_string(),
            Self::FreeText => "text".to_string(),
            Self::Tags => "list of tags".to_string(),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_whole_number(raw: &str) -> Result<u32, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("expected a number".to_string());
    }
    let number: f64 = trimmed
        .parse()
        .map_err(|_| format!("expected a number, got '{trimmed}'"))?;
    if !number.is_finite() || number.fract() != 0.0 {
        return Err(format!("expected a whole number, got '{trimmed}'"));
    }
    if number < 0.0 {
        return Err("must be at least 0".to_string());
    }
    if number > f64::from(u32::MAX) {
        return Err(format!("must be at most {}", u32::MAX));
    }
    Ok(number as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(
            lookup("Autonomous Cycles.Coral Level 1"),
            Some(Constraint::Integer { min: 0 })
        );
        assert_eq!(lookup("Alliance"), Some(Constraint::OneOf(ALLIANCES)));
        assert_eq!(lookup("Notes.text"), Some(Constraint::FreeText));
        assert_eq!(lookup("Favourite Color"), None);
    }

    #[test]
    fn test_integer_coerces_text() {
        let value = coerce(path("Qualification Number"), "5").unwrap();
        assert_eq!(value, Value::Integer(5));

        let value = coerce(path("Team Number"), " 1114 ").unwrap();
        assert_eq!(value, Value::Integer(1114));

        let value = coerce(path("Team Number"), "254.0").unwrap();
        assert_eq!(value, Value::Integer(254));
    }

    #[test]
    fn test_integer_rejects_out_of_range_and_garbage() {
        let err = coerce(path("Team Number"), "0").unwrap_err();
        assert_eq!(err.path, "Team Number");
        assert!(err.reason.contains("at least 1"));

        assert!(coerce(path("Team Number"), "abc").is_err());
        assert!(coerce(path("Team Number"), "").is_err());
        assert!(coerce(path("Team Number"), "1.5").is_err());
        assert!(coerce(path("Teleop Cycles.Net"), "-1").is_err());
        assert!(coerce(path("Teleop Cycles.Net"), "NaN").is_err());
    }

    #[test]
    fn test_counter_accepts_zero() {
        assert_eq!(
            coerce(path("Teleop Cycles.Processor"), "0").unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_enumerated_reports_full_set() {
        let err = coerce(path("Endgame"), "Hang").unwrap_err();
        assert_eq!(
            err.reason,
            "must be one of: None, Park, Shallow Climb, Deep Climb"
        );
        assert!(coerce(path("Alliance"), "red").is_err());
        assert_eq!(
            coerce(path("Alliance"), "Red").unwrap(),
            Value::Text("Red".to_string())
        );
    }

    #[test]
    fn test_required_text() {
        assert!(coerce(path("Scouter Name"), "   ").is_err());
        assert_eq!(
            coerce(path("Scouter Name"), "Ada").unwrap(),
            Value::Text("Ada".to_string())
        );
    }

    #[test]
    fn test_times_are_quantized() {
        let value = coerce(path("Teleop Cycles.Cycle Times"), "[1.234, 2.5, 3.999]").unwrap();
        assert_eq!(value, Value::Times(vec![1.23, 2.5, 4.0]));
    }

    #[test]
    fn test_times_fail_closed() {
        assert!(coerce(path("Defense Times"), "[1.0, ").is_err());
        assert!(coerce(path("Defense Times"), "1.0").is_err());
        assert!(coerce(path("Defense Times"), "[\"a\"]").is_err());
        assert!(coerce(path("Defense Times"), "[1.0, 0]").is_err());
        assert!(coerce(path("Defense Times"), "[-2]").is_err());
        assert_eq!(
            coerce(path("Defense Times"), "[]").unwrap(),
            Value::Times(Vec::new())
        );
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let value = coerce(path("Notes.tags"), r#"["defense", "fast", "defense"]"#).unwrap();
        let Value::Tags(tags) = value else {
            panic!("expected tags");
        };
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("fast"));
    }

    #[test]
    fn test_tags_fail_closed() {
        assert!(coerce(path("Notes.tags"), "defense").is_err());
        assert!(coerce(path("Notes.tags"), "[1, 2]").is_err());
    }

    #[test]
    fn test_free_text_accepts_anything() {
        assert_eq!(
            coerce(path("Notes.text"), "").unwrap(),
            Value::Text(String::new())
        );
    }

    #[test]
    fn test_check_rejects_wrong_shape() {
        let err = check(path("Team Number"), &Value::Text("x".to_string())).unwrap_err();
        assert!(err.reason.contains("whole number"));
    }

    #[test]
    fn test_round_hundredths() {
        assert!((round_hundredths(1.005_1) - 1.01).abs() < f64::EPSILON);
        assert!((round_hundredths(12.344) - 12.34).abs() < f64::EPSILON);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Integer(5).to_string(), "5");
        assert_eq!(Value::Times(vec![1.5, 2.0]).to_string(), "[1.5,2.0]");
    }
}
