//! Field catalogue and typed field paths.
//!
//! Field names are human-readable and double as storage keys, so they are
//! spelled exactly as they appear in serialized submissions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator between a group name and a leaf name in a textual path.
pub const PATH_SEPARATOR: char = '.';

/// One of the three data-entry sections of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Robot runs pre-programmed routines.
    Autonomous,
    /// Drivers control the robot.
    Teleop,
    /// Everything recorded outside the two scoring periods.
    Misc,
}

impl Phase {
    /// All phases in form order.
    pub const ALL: [Phase; 3] = [Phase::Autonomous, Phase::Teleop, Phase::Misc];

    /// Lowercase name used on the command line and in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Teleop => "teleop",
            Self::Misc => "misc",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

/// The shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Free text or a number typed by the scout.
    ScalarInput,
    /// One of a fixed set of strings.
    EnumeratedChoice,
    /// Named scoring counters plus recorded cycle times.
    CycleCounterGroup,
    /// Recorded elapsed times.
    Stopwatch,
    /// Free-form text and a set of tags.
    Notes,
}

/// A top-level field of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Who collected the record.
    ScouterName,
    /// The team being scouted.
    TeamNumber,
    /// The qualification match number.
    QualificationNumber,
    /// Red or blue alliance.
    Alliance,
    /// Where the robot started on the field.
    StartingPosition,
    /// Scoring during the autonomous period.
    AutonomousCycles,
    /// Scoring during the teleop period.
    TeleopCycles,
    /// How the match ended for the robot.
    Endgame,
    /// Time spent playing defense.
    DefenseTimes,
    /// Scout's comments.
    Notes,
}

/// Static description of a field, shared by rendering, validation and editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// The field being described.
    pub field: Field,
    /// Human-readable name, also the storage key.
    pub name: &'static str,
    /// Shape of the field's value.
    pub kind: Kind,
    /// The form section the field belongs to.
    pub phase: Phase,
    /// Whether a submission must fill this field before it is stored.
    pub required: bool,
}

impl Field {
    /// All fields in form order.
    pub const ALL: [Field; 10] = [
        Field::ScouterName,
        Field::TeamNumber,
        Field::QualificationNumber,
        Field::Alliance,
        Field::StartingPosition,
        Field::AutonomousCycles,
        Field::TeleopCycles,
        Field::Endgame,
        Field::DefenseTimes,
        Field::Notes,
    ];

    /// The descriptor for this field.
    #[must_use]
    pub fn descriptor(self) -> FieldDescriptor {
        let (name, kind, phase, required) = match self {
            Self::ScouterName => ("Scouter Name", Kind::ScalarInput, Phase::Misc, true),
            Self::TeamNumber => ("Team Number", Kind::ScalarInput, Phase::Misc, true),
            Self::QualificationNumber => {
                ("Qualification Number", Kind::ScalarInput, Phase::Misc, true)
            }
            Self::Alliance => ("Alliance", Kind::EnumeratedChoice, Phase::Misc, true),
            Self::StartingPosition => (
                "Starting Position",
                Kind::EnumeratedChoice,
                Phase::Autonomous,
                true,
            ),
            Self::AutonomousCycles => (
                "Autonomous Cycles",
                Kind::CycleCounterGroup,
                Phase::Autonomous,
                false,
            ),
            Self::TeleopCycles => (
                "Teleop Cycles",
                Kind::CycleCounterGroup,
                Phase::Teleop,
                false,
            ),
            Self::Endgame => ("Endgame", Kind::EnumeratedChoice, Phase::Teleop, true),
            Self::DefenseTimes => ("Defense Times", Kind::Stopwatch, Phase::Misc, false),
            Self::Notes => ("Notes", Kind::Notes, Phase::Misc, false),
        };
        FieldDescriptor {
            field: self,
            name,
            kind,
            phase,
            required,
        }
    }

    /// Human-readable name of the field.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Look a field up by its human-readable name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// A scoring counter inside a cycle group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    /// Coral scored in the trough.
    CoralLevel1,
    /// Coral scored on the second level.
    CoralLevel2,
    /// Coral scored on the third level.
    CoralLevel3,
    /// Coral scored on the top level.
    CoralLevel4,
    /// Algae scored in the processor.
    Processor,
    /// Algae scored in the net.
    Net,
}

impl Counter {
    /// All counters in form order.
    pub const ALL: [Counter; 6] = [
        Counter::CoralLevel1,
        Counter::CoralLevel2,
        Counter::CoralLevel3,
        Counter::CoralLevel4,
        Counter::Processor,
        Counter::Net,
    ];

    /// Human-readable name, also the storage key inside the group.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CoralLevel1 => "Coral Level 1",
            Self::CoralLevel2 => "Coral Level 2",
            Self::CoralLevel3 => "Coral Level 3",
            Self::CoralLevel4 => "Coral Level 4",
            Self::Processor => "Processor",
            Self::Net => "Net",
        }
    }

    /// The coral counter for a reef level (1-4).
    #[must_use]
    pub fn coral_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::CoralLevel1),
            2 => Some(Self::CoralLevel2),
            3 => Some(Self::CoralLevel3),
            4 => Some(Self::CoralLevel4),
            _ => None,
        }
    }
}

/// Which of the two cycle groups a path points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleGroup {
    /// The "Autonomous Cycles" field.
    Autonomous,
    /// The "Teleop Cycles" field.
    Teleop,
}

impl CycleGroup {
    /// The top-level field holding this group.
    #[must_use]
    pub fn field(self) -> Field {
        match self {
            Self::Autonomous => Field::AutonomousCycles,
            Self::Teleop => Field::TeleopCycles,
        }
    }

    /// The cycle group scoring in a phase, if the phase has one.
    #[must_use]
    pub fn for_phase(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Autonomous => Some(Self::Autonomous),
            Phase::Teleop => Some(Self::Teleop),
            Phase::Misc => None,
        }
    }
}

/// A leaf inside a cycle group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleLeaf {
    /// One of the scoring counters.
    Counter(Counter),
    /// The recorded cycle times.
    CycleTimes,
}

/// Name of the cycle times leaf inside a cycle group.
pub const CYCLE_TIMES: &str = "Cycle Times";

/// A leaf inside the notes field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotesLeaf {
    /// Free-form comment text.
    Text,
    /// Tag set.
    Tags,
}

/// Top-level fields that hold a single value rather than a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafField {
    /// "Scouter Name".
    ScouterName,
    /// "Team Number".
    TeamNumber,
    /// "Qualification Number".
    QualificationNumber,
    /// "Alliance".
    Alliance,
    /// "Starting Position".
    StartingPosition,
    /// "Endgame".
    Endgame,
    /// "Defense Times".
    DefenseTimes,
}

impl LeafField {
    /// All leaf fields in form order.
    pub const ALL: [LeafField; 7] = [
        LeafField::ScouterName,
        LeafField::TeamNumber,
        LeafField::QualificationNumber,
        LeafField::Alliance,
        LeafField::StartingPosition,
        LeafField::Endgame,
        LeafField::DefenseTimes,
    ];

    /// The top-level field this leaf is.
    #[must_use]
    pub fn field(self) -> Field {
        match self {
            Self::ScouterName => Field::ScouterName,
            Self::TeamNumber => Field::TeamNumber,
            Self::QualificationNumber => Field::QualificationNumber,
            Self::Alliance => Field::Alliance,
            Self::StartingPosition => Field::StartingPosition,
            Self::Endgame => Field::Endgame,
            Self::DefenseTimes => Field::DefenseTimes,
        }
    }
}

/// Typed address of an editable value inside a submission.
///
/// Only combinations that exist in a submission can be built, so a
/// `FieldPath` never needs a runtime existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    /// A single-valued top-level field.
    Leaf(LeafField),
    /// A leaf inside one of the cycle groups.
    Cycle(CycleGroup, CycleLeaf),
    /// A leaf inside the notes field.
    Notes(NotesLeaf),
}

impl FieldPath {
    /// Every editable path, in form order.
    #[must_use]
    pub fn all() -> Vec<FieldPath> {
        let mut paths: Vec<FieldPath> = LeafField::ALL
            .iter()
            .take(5)
            .map(|&leaf| FieldPath::Leaf(leaf))
            .collect();
        for group in [CycleGroup::Autonomous, CycleGroup::Teleop] {
            paths.extend(
                Counter::ALL
                    .iter()
                    .map(|&c| FieldPath::Cycle(group, CycleLeaf::Counter(c))),
            );
            paths.push(FieldPath::Cycle(group, CycleLeaf::CycleTimes));
        }
        paths.push(FieldPath::Leaf(LeafField::Endgame));
        paths.push(FieldPath::Leaf(LeafField::DefenseTimes));
        paths.push(FieldPath::Notes(NotesLeaf::Text));
        paths.push(FieldPath::Notes(NotesLeaf::Tags));
        paths
    }

    /// The top-level field this path lives in.
    #[must_use]
    pub fn field(self) -> Field {
        match self {
            Self::Leaf(leaf) => leaf.field(),
            Self::Cycle(group, _) => group.field(),
            Self::Notes(_) => Field::Notes,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = self.field().name();
        match self {
            Self::Leaf(_) => f.write_str(group),
            Self::Cycle(_, CycleLeaf::Counter(c)) => {
                write!(f, "{group}{PATH_SEPARATOR}{}", c.name())
            }
            Self::Cycle(_, CycleLeaf::CycleTimes) => {
                write!(f, "{group}{PATH_SEPARATOR}{CYCLE_TIMES}")
            }
            Self::Notes(NotesLeaf::Text) => write!(f, "{group}{PATH_SEPARATOR}text"),
            Self::Notes(NotesLeaf::Tags) => write!(f, "{group}{PATH_SEPARATOR}tags"),
        }
    }
}

impl FromStr for FieldPath {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || crate::Error::UnknownField {
            path: s.to_string(),
        };

        let Some((group, leaf)) = s.split_once(PATH_SEPARATOR) else {
            return LeafField::ALL
                .into_iter()
                .find(|l| l.field().name() == s)
                .map(FieldPath::Leaf)
                .ok_or_else(unknown);
        };

        match Field::from_name(group).ok_or_else(unknown)? {
            Field::AutonomousCycles | Field::TeleopCycles => {
                let group = if group == Field::AutonomousCycles.name() {
                    CycleGroup::Autonomous
                } else {
                    CycleGroup::Teleop
                };
                if leaf == CYCLE_TIMES {
                    return Ok(FieldPath::Cycle(group, CycleLeaf::CycleTimes));
                }
                Counter::ALL
                    .into_iter()
                    .find(|c| c.name() == leaf)
                    .map(|c| FieldPath::Cycle(group, CycleLeaf::Counter(c)))
                    .ok_or_else(unknown)
            }
            Field::Notes => match leaf {
                "text" => Ok(FieldPath::Notes(NotesLeaf::Text)),
                "tags" => Ok(FieldPath::Notes(NotesLeaf::Tags)),
                _ => Err(unknown()),
            },
            _ => Err(unknown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_path_round_trips_through_text() {
        for path in FieldPath::all() {
            let text = path.to_string();
            let parsed: FieldPath = text.parse().unwrap();
            assert_eq!(parsed, path, "{text}");
        }
    }

    #[test]
    fn test_parse_nested_counter() {
        let path: FieldPath = "Autonomous Cycles.Coral Level 1".parse().unwrap();
        assert_eq!(
            path,
            FieldPath::Cycle(
                CycleGroup::Autonomous,
                CycleLeaf::Counter(Counter::CoralLevel1)
            )
        );
    }

    #[test]
    fn test_parse_unknown_paths() {
        for bad in [
            "",
            "Team",
            "Notes",
            "Autonomous Cycles",
            "Autonomous Cycles.Coral Level 5",
            "Team Number.value",
            "Notes.comment",
        ] {
            let err = bad.parse::<FieldPath>().unwrap_err();
            assert!(matches!(err, crate::Error::UnknownField { .. }), "{bad}");
        }
    }

    #[test]
    fn test_field_from_name() {
        assert_eq!(Field::from_name("Endgame"), Some(Field::Endgame));
        assert_eq!(Field::from_name("endgame"), None);
    }

    #[test]
    fn test_field_path_count() {
        // 7 leaves, 2 groups of 6 counters + times, 2 notes leaves
        assert_eq!(FieldPath::all().len(), 7 + 2 * 7 + 2);
    }

    #[test]
    fn test_phase_parse_and_display() {
        assert_eq!("Teleop".parse::<Phase>().unwrap(), Phase::Teleop);
        assert_eq!(Phase::Misc.to_string(), "misc");
        assert!("endgame".parse::<Phase>().is_err());
    }

    #[test]
    fn test_coral_level_lookup() {
        assert_eq!(Counter::coral_level(3), Some(Counter::CoralLevel3));
        assert_eq!(Counter::coral_level(0), None);
        assert_eq!(Counter::coral_level(5), None);
    }

    #[test]
    fn test_cycle_group_for_phase() {
        assert_eq!(CycleGroup::for_phase(Phase::Teleop), Some(CycleGroup::Teleop));
        assert_eq!(CycleGroup::for_phase(Phase::Misc), None);
    }

    #[test]
    fn test_required_fields() {
        let required: Vec<&str> = Field::ALL
            .iter()
            .map(|f| f.descriptor())
            .filter(|d| d.required)
            .map(|d| d.name)
            .collect();
        assert!(required.contains(&"Team Number"));
        assert!(!required.contains(&"Notes"));
    }
}
