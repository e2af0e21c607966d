use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FEMALE: &str = "female";
pub const MALE: &str = "male";

/// Midpoint of the 1..10 answer scale; also the fallback skill average.
pub const SCALE_MIDPOINT: f64 = 5.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkillLevel {
    Low,
    Medium,
    High,
}

impl SkillLevel {
    pub fn from_average(average: f64) -> Self {
        if average < 4.0 {
            SkillLevel::Low
        } else if average < 7.0 {
            SkillLevel::Medium
        } else {
            SkillLevel::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillLevel::Low => "low",
            SkillLevel::Medium => "medium",
            SkillLevel::High => "high",
        }
    }

    /// Position in the skill pass's scan of the unassigned pool: high, low, medium.
    pub fn pool_rank(self) -> u8 {
        match self {
            SkillLevel::High => 0,
            SkillLevel::Low => 1,
            SkillLevel::Medium => 2,
        }
    }

    /// Partner levels to look for, most preferred first.
    pub fn complements(self) -> &'static [SkillLevel] {
        match self {
            SkillLevel::Low => &[SkillLevel::High, SkillLevel::Medium],
            SkillLevel::High => &[SkillLevel::Low, SkillLevel::Medium],
            SkillLevel::Medium => &[SkillLevel::Medium],
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    MultipleChoice,
    Scale,
    Text,
}

impl AttributeKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mcq" | "multiple_choice" => AttributeKind::MultipleChoice,
            "scale" => AttributeKind::Scale,
            _ => AttributeKind::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKind::MultipleChoice => "mcq",
            AttributeKind::Scale => "scale",
            AttributeKind::Text => "text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub id: Uuid,
    pub name: String,
    pub kind: AttributeKind,
    pub options: Vec<String>,
    pub weightage: f64,
}

impl AttributeSpec {
    pub fn split_options(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|option| !option.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub section: String,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub student_id: Uuid,
    pub section: String,
    pub answers: HashMap<Uuid, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct Form {
    pub id: Uuid,
    pub title: String,
    pub attributes: Vec<AttributeSpec>,
    pub responses: Vec<Response>,
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub student_id: Uuid,
    pub section: String,
    pub gender: String,
    pub ethnicity: String,
    pub skill_average: f64,
    pub skill_level: SkillLevel,
    pub assigned: bool,
    pub team_id: Option<usize>,
}

/// Per-team tallies. Categories never seen count as zero.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    gender: BTreeMap<String, usize>,
    ethnicity: BTreeMap<String, usize>,
    skill: BTreeMap<SkillLevel, usize>,
}

impl Composition {
    pub fn gender(&self, gender: &str) -> usize {
        self.gender.get(gender).copied().unwrap_or(0)
    }

    pub fn ethnicity(&self, ethnicity: &str) -> usize {
        self.ethnicity.get(ethnicity).copied().unwrap_or(0)
    }

    pub fn skill(&self, level: SkillLevel) -> usize {
        self.skill.get(&level).copied().unwrap_or(0)
    }

    pub fn other_genders(&self) -> usize {
        self.gender
            .iter()
            .filter(|(gender, _)| !is_binary_gender(gender))
            .map(|(_, count)| count)
            .sum()
    }

    fn record(&mut self, student: &StudentRecord) {
        *self.gender.entry(student.gender.clone()).or_insert(0) += 1;
        *self.ethnicity.entry(student.ethnicity.clone()).or_insert(0) += 1;
        *self.skill.entry(student.skill_level).or_insert(0) += 1;
    }
}

pub fn is_binary_gender(gender: &str) -> bool {
    gender == FEMALE || gender == MALE
}

#[derive(Debug, Clone)]
pub struct Team {
    pub team_id: usize,
    pub capacity: usize,
    /// Always `capacity` long; `None` marks an open slot.
    pub members: Vec<Option<Uuid>>,
    pub composition: Composition,
    pub spots_left: usize,
}

impl Team {
    pub fn new(team_id: usize, capacity: usize) -> Self {
        Self {
            team_id,
            capacity,
            members: vec![None; capacity],
            composition: Composition::default(),
            spots_left: capacity,
        }
    }

    pub fn has_room(&self) -> bool {
        self.spots_left > 0
    }

    pub fn member_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.members.iter().flatten().copied()
    }

    pub fn member_count(&self) -> usize {
        self.capacity - self.spots_left
    }

    pub(crate) fn seat(&mut self, student: &StudentRecord) -> bool {
        let Some(slot) = self.members.iter_mut().find(|slot| slot.is_none()) else {
            return false;
        };
        *slot = Some(student.student_id);
        self.spots_left -= 1;
        self.composition.record(student);
        true
    }
}

/// Working state for one section while the balancing passes run.
///
/// Index sets (`by_gender`, `by_ethnicity`, `by_skill`, `unassigned`) only
/// ever hold students that are not yet on a team.
#[derive(Debug, Clone)]
pub struct SectionDistribution {
    pub section: String,
    pub students: BTreeMap<Uuid, StudentRecord>,
    pub by_gender: BTreeMap<String, BTreeSet<Uuid>>,
    pub by_ethnicity: BTreeMap<String, BTreeSet<Uuid>>,
    pub by_skill: BTreeMap<SkillLevel, BTreeSet<Uuid>>,
    pub unassigned: BTreeSet<Uuid>,
    pub teams: Vec<Team>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TeamDraft {
    pub name: String,
    pub section: String,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Clone)]
pub struct PersistedTeam {
    pub name: String,
    pub section: String,
    pub members: Vec<TeamMember>,
    pub created_at: DateTime<Utc>,
}
