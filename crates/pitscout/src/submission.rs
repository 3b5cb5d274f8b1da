//! The scouting record.
//!
//! A [`Submission`] serializes to a JSON object keyed by field names, which
//! is the exact shape stored and exported.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::schema::{self, Counter, CycleGroup, CycleLeaf, FieldPath, LeafField, NotesLeaf, Value};

/// One complete scouting record for a team in a match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Who collected the record.
    #[serde(rename = "Scouter Name")]
    pub scouter_name: String,

    /// The team being scouted.
    #[serde(rename = "Team Number", deserialize_with = "number_or_text")]
    pub team_number: u32,

    /// The qualification match number.
    #[serde(rename = "Qualification Number", deserialize_with = "number_or_text")]
    pub qualification_number: u32,

    /// Red or blue alliance.
    #[serde(rename = "Alliance")]
    pub alliance: String,

    /// Where the robot started.
    #[serde(rename = "Starting Position")]
    pub starting_position: String,

    /// Autonomous scoring.
    #[serde(rename = "Autonomous Cycles", default)]
    pub autonomous: CycleCounts,

    /// Teleop scoring.
    #[serde(rename = "Teleop Cycles", default)]
    pub teleop: CycleCounts,

    /// How the match ended for the robot.
    #[serde(rename = "Endgame")]
    pub endgame: String,

    /// Recorded defense durations in seconds.
    #[serde(rename = "Defense Times", default)]
    pub defense_times: Vec<f64>,

    /// Scout's comments.
    #[serde(rename = "Notes", default)]
    pub notes: Notes,
}

/// Scoring counters and cycle times for one phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleCounts {
    /// Coral scored in the trough.
    #[serde(rename = "Coral Level 1")]
    pub coral_level_1: u32,
    /// Coral scored on level 2.
    #[serde(rename = "Coral Level 2")]
    pub coral_level_2: u32,
    /// Coral scored on level 3.
    #[serde(rename = "Coral Level 3")]
    pub coral_level_3: u32,
    /// Coral scored on level 4.
    #[serde(rename = "Coral Level 4")]
    pub coral_level_4: u32,
    /// Algae scored in the processor.
    #[serde(rename = "Processor")]
    pub processor: u32,
    /// Algae scored in the net.
    #[serde(rename = "Net")]
    pub net: u32,
    /// Recorded cycle times in seconds.
    #[serde(rename = "Cycle Times")]
    pub cycle_times: Vec<f64>,
}

/// Free-form notes with tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notes {
    /// Comment text.
    pub text: String,
    /// Tag set.
    pub tags: BTreeSet<String>,
}

impl CycleCounts {
    /// Current value of a counter.
    #[must_use]
    pub fn counter(&self, counter: Counter) -> u32 {
        match counter {
            Counter::CoralLevel1 => self.coral_level_1,
            Counter::CoralLevel2 => self.coral_level_2,
            Counter::CoralLevel3 => self.coral_level_3,
            Counter::CoralLevel4 => self.coral_level_4,
            Counter::Processor => self.processor,
            Counter::Net => self.net,
        }
    }

    /// Mutable access to a counter.
    pub fn counter_mut(&mut self, counter: Counter) -> &mut u32 {
        match counter {
            Counter::CoralLevel1 => &mut self.coral_level_1,
            Counter::CoralLevel2 => &mut self.coral_level_2,
            Counter::CoralLevel3 => &mut self.coral_level_3,
            Counter::CoralLevel4 => &mut self.coral_level_4,
            Counter::Processor => &mut self.processor,
            Counter::Net => &mut self.net,
        }
    }
}

impl Submission {
    /// The cycle group for a phase.
    #[must_use]
    pub fn cycles(&self, group: CycleGroup) -> &CycleCounts {
        match group {
            CycleGroup::Autonomous => &self.autonomous,
            CycleGroup::Teleop => &self.teleop,
        }
    }

    /// Mutable access to the cycle group for a phase.
    pub fn cycles_mut(&mut self, group: CycleGroup) -> &mut CycleCounts {
        match group {
            CycleGroup::Autonomous => &mut self.autonomous,
            CycleGroup::Teleop => &mut self.teleop,
        }
    }

    /// Read the value stored at a path.
    #[must_use]
    pub fn get(&self, path: FieldPath) -> Value {
        match path {
            FieldPath::Leaf(leaf) => match leaf {
                LeafField::ScouterName => Value::Text(self.scouter_name.clone()),
                LeafField::TeamNumber => Value::Integer(self.team_number),
                LeafField::QualificationNumber => Value::Integer(self.qualification_number),
                LeafField::Alliance => Value::Text(self.alliance.clone()),
                LeafField::StartingPosition => Value::Text(self.starting_position.clone()),
                LeafField::Endgame => Value::Text(self.endgame.clone()),
                LeafField::DefenseTimes => Value::Times(self.defense_times.clone()),
            },
            FieldPath::Cycle(group, CycleLeaf::Counter(c)) => {
                Value::Integer(self.cycles(group).counter(c))
            }
            FieldPath::Cycle(group, CycleLeaf::CycleTimes) => {
                Value::Times(self.cycles(group).cycle_times.clone())
            }
            FieldPath::Notes(NotesLeaf::Text) => Value::Text(self.notes.text.clone()),
            FieldPath::Notes(NotesLeaf::Tags) => Value::Tags(self.notes.tags.clone()),
        }
    }

    /// Write a typed value at a path.
    ///
    /// The value must already satisfy the path's constraint; use
    /// [`schema::coerce`] to obtain one.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the value's shape does not match the path.
    pub fn set(&mut self, path: FieldPath, value: Value) -> Result<()> {
        match (path, value) {
            (FieldPath::Leaf(leaf), Value::Text(text)) => {
                let slot = match leaf {
                    LeafField::ScouterName => &mut self.scouter_name,
                    LeafField::Alliance => &mut self.alliance,
                    LeafField::StartingPosition => &mut self.starting_position,
                    LeafField::Endgame => &mut self.endgame,
                    _ => return Err(shape_mismatch(path)),
                };
                *slot = text;
            }
            (FieldPath::Leaf(LeafField::TeamNumber), Value::Integer(n)) => self.team_number = n,
            (FieldPath::Leaf(LeafField::QualificationNumber), Value::Integer(n)) => {
                self.qualification_number = n;
            }
            (FieldPath::Leaf(LeafField::DefenseTimes), Value::Times(times)) => {
                self.defense_times = times;
            }
            (FieldPath::Cycle(group, CycleLeaf::Counter(c)), Value::Integer(n)) => {
                *self.cycles_mut(group).counter_mut(c) = n;
            }
            (FieldPath::Cycle(group, CycleLeaf::CycleTimes), Value::Times(times)) => {
                self.cycles_mut(group).cycle_times = times;
            }
            (FieldPath::Notes(NotesLeaf::Text), Value::Text(text)) => self.notes.text = text,
            (FieldPath::Notes(NotesLeaf::Tags), Value::Tags(tags)) => self.notes.tags = tags,
            _ => return Err(shape_mismatch(path)),
        }
        Ok(())
    }

    /// A copy of this submission with one path replaced.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the value's shape does not match the path.
    pub fn with(&self, path: FieldPath, value: Value) -> Result<Self> {
        let mut updated = self.clone();
        updated.set(path, value)?;
        Ok(updated)
    }

    /// Validate every field of the record.
    ///
    /// This is the whole-record check the form runs before appending.
    ///
    /// # Errors
    ///
    /// Returns the first failing field as a validation error.
    pub fn validate(&self) -> Result<()> {
        for path in FieldPath::all() {
            schema::check(path, &self.get(path))?;
        }
        Ok(())
    }
}

fn shape_mismatch(path: FieldPath) -> Error {
    Error::internal(format!("value shape does not match field '{path}'"))
}

/// Accept a whole number written either as a JSON number or as text.
fn number_or_text<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u32),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A complete, valid submission for tests.
    pub(crate) fn sample(team: u32) -> Submission {
        Submission {
            scouter_name: "Ada".to_string(),
            team_number: team,
            qualification_number: 1,
            alliance: "Red".to_string(),
            starting_position: "Center".to_string(),
            autonomous: CycleCounts {
                coral_level_4: 1,
                cycle_times: vec![4.5],
                ..CycleCounts::default()
            },
            teleop: CycleCounts::default(),
            endgame: "Deep Climb".to_string(),
            defense_times: Vec::new(),
            notes: Notes::default(),
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample(1114).validate().is_ok());
    }

    #[test]
    fn test_default_is_invalid() {
        let err = Submission::default().validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().starts_with("Scouter Name"));
    }

    #[test]
    fn test_serializes_with_field_names() {
        let json = serde_json::to_value(sample(1114)).unwrap();
        assert_eq!(json["Team Number"], 1114);
        assert_eq!(json["Autonomous Cycles"]["Coral Level 4"], 1);
        assert_eq!(json["Autonomous Cycles"]["Cycle Times"][0], 4.5);
        assert_eq!(json["Notes"]["text"], "");
    }

    #[test]
    fn test_team_number_accepts_text() {
        let mut json = serde_json::to_value(sample(1)).unwrap();
        json["Team Number"] = serde_json::Value::String("971".to_string());
        let parsed: Submission = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.team_number, 971);
    }

    #[test]
    fn test_missing_groups_default() {
        let json = r#"{
            "Scouter Name": "Bo", "Team Number": 33, "Qualification Number": 2,
            "Alliance": "Blue", "Starting Position": "Left", "Endgame": "Park"
        }"#;
        let parsed: Submission = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.teleop, CycleCounts::default());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_get_and_set_nested_counter() {
        let path: FieldPath = "Teleop Cycles.Net".parse().unwrap();
        let mut record = sample(1);
        record.set(path, Value::Integer(3)).unwrap();
        assert_eq!(record.get(path), Value::Integer(3));
        assert_eq!(record.teleop.net, 3);
        assert_eq!(record.autonomous.net, 0);
    }

    #[test]
    fn test_set_rejects_wrong_shape() {
        let mut record = sample(1);
        let err = record
            .set(FieldPath::Leaf(LeafField::TeamNumber), Value::Text("x".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(record, sample(1));
    }

    #[test]
    fn test_with_leaves_original_untouched() {
        let original = sample(1);
        let updated = original
            .with(FieldPath::Notes(NotesLeaf::Text), Value::Text("fast".into()))
            .unwrap();
        assert_eq!(updated.notes.text, "fast");
        assert_eq!(original.notes.text, "");
    }

    #[test]
    fn test_validate_rejects_bad_cycle_time() {
        let mut record = sample(1);
        record.teleop.cycle_times.push(0.0);
        let err = record.validate().unwrap_err();
        assert!(err.to_string().contains("Teleop Cycles.Cycle Times"));
    }
}
