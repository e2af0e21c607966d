use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use crate::models::{
    AttributeKind, AttributeSpec, Form, Response, SkillLevel, Student, StudentRecord,
};

pub const GENDER_ATTR: Uuid = Uuid::from_u128(0x1001);
pub const ETHNICITY_ATTR: Uuid = Uuid::from_u128(0x1002);
pub const PROGRAMMING_ATTR: Uuid = Uuid::from_u128(0x1003);
pub const WRITING_ATTR: Uuid = Uuid::from_u128(0x1004);

pub fn attribute(
    id: Uuid,
    name: &str,
    kind: AttributeKind,
    options: &str,
    weightage: f64,
) -> AttributeSpec {
    AttributeSpec {
        id,
        name: name.to_string(),
        kind,
        options: AttributeSpec::split_options(options),
        weightage,
    }
}

pub fn survey_form() -> Form {
    Form {
        id: Uuid::from_u128(0xF0),
        title: "Fall project teams".to_string(),
        attributes: vec![
            attribute(
                GENDER_ATTR,
                "Gender",
                AttributeKind::MultipleChoice,
                "Female, Male, Other",
                0.0,
            ),
            attribute(
                ETHNICITY_ATTR,
                "Ethnicity",
                AttributeKind::MultipleChoice,
                "Asian, Black, Hispanic, White",
                0.0,
            ),
            attribute(PROGRAMMING_ATTR, "Programming", AttributeKind::Scale, "", 2.0),
            attribute(WRITING_ATTR, "Writing", AttributeKind::Scale, "", 1.0),
        ],
        responses: Vec::new(),
    }
}

/// A form plus the students who answered it.
pub struct Survey {
    pub form: Form,
    pub roster: HashMap<Uuid, Student>,
    next_id: u128,
}

impl Survey {
    pub fn new() -> Self {
        Self {
            form: survey_form(),
            roster: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn respond(&mut self, section: &str, gender: &str, ethnicity: &str, skill: f64) -> Uuid {
        let student_id = Uuid::from_u128(self.next_id);
        self.next_id += 1;
        self.roster.insert(
            student_id,
            Student {
                id: student_id,
                full_name: format!("Student {}", self.next_id - 1),
                section: section.to_string(),
            },
        );
        let answers = HashMap::from([
            (GENDER_ATTR, json!(gender)),
            (ETHNICITY_ATTR, json!(ethnicity)),
            (PROGRAMMING_ATTR, json!(skill)),
            (WRITING_ATTR, json!(skill)),
        ]);
        self.form.responses.push(Response {
            student_id,
            section: section.to_string(),
            answers,
        });
        student_id
    }
}

pub fn record(id: u128, section: &str, gender: &str, ethnicity: &str, skill: f64) -> StudentRecord {
    StudentRecord {
        student_id: Uuid::from_u128(id),
        section: section.to_string(),
        gender: gender.to_string(),
        ethnicity: ethnicity.to_string(),
        skill_average: skill,
        skill_level: SkillLevel::from_average(skill),
        assigned: false,
        team_id: None,
    }
}

/// Cycles through low, medium and high averages.
pub fn skill_for(index: usize) -> f64 {
    [2.5, 5.0, 8.5][index % 3]
}
