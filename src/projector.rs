use serde_json::Value;

use crate::attributes::ResolvedAttributes;
use crate::models::{AttributeSpec, Response, SkillLevel, StudentRecord, SCALE_MIDPOINT};

/// Derives the balancing record for one response. Missing or malformed
/// answers fall back to defaults instead of failing.
pub fn project(response: &Response, attributes: &ResolvedAttributes<'_>) -> StudentRecord {
    let gender = choice_value(response, attributes.gender).to_lowercase();
    let ethnicity = choice_value(response, attributes.ethnicity);
    let skill_average = skill_average(response, &attributes.scales);

    StudentRecord {
        student_id: response.student_id,
        section: response.section.clone(),
        gender,
        ethnicity,
        skill_average,
        skill_level: SkillLevel::from_average(skill_average),
        assigned: false,
        team_id: None,
    }
}

fn choice_value(response: &Response, attribute: &AttributeSpec) -> String {
    let answer = match response.answers.get(&attribute.id) {
        Some(Value::String(text)) => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    };

    answer
        .filter(|text| !text.is_empty())
        .or_else(|| attribute.options.first().cloned())
        .unwrap_or_default()
}

fn scale_value(value: &Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

pub fn skill_average(response: &Response, scales: &[&AttributeSpec]) -> f64 {
    let (weighted_sum, total_weight) = scales
        .iter()
        .filter_map(|attribute| {
            let value = response.answers.get(&attribute.id).and_then(scale_value)?;
            Some((value * attribute.weightage, attribute.weightage))
        })
        .fold((0.0, 0.0), |(sum, weight), (value, w)| (sum + value, weight + w));

    if total_weight == 0.0 {
        return SCALE_MIDPOINT;
    }

    round_to_cents(weighted_sum / total_weight)
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes;
    use crate::fixtures::{survey_form, ETHNICITY_ATTR, GENDER_ATTR, PROGRAMMING_ATTR, WRITING_ATTR};
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn response(answers: Vec<(Uuid, Value)>) -> Response {
        Response {
            student_id: Uuid::from_u128(7),
            section: "A".to_string(),
            answers: answers.into_iter().collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn weighted_average_rounds_to_two_decimals() {
        let form = survey_form();
        let resolved = attributes::resolve(&form).unwrap();
        let record = project(
            &response(vec![
                (GENDER_ATTR, json!("Female")),
                (ETHNICITY_ATTR, json!("Asian")),
                (PROGRAMMING_ATTR, json!(7)),
                (WRITING_ATTR, json!("4")),
            ]),
            &resolved,
        );

        // (7 * 2 + 4 * 1) / 3 = 6.0
        assert_eq!(record.skill_average, 6.0);
        assert_eq!(record.skill_level, SkillLevel::Medium);
        assert_eq!(record.gender, "female");
        assert_eq!(record.ethnicity, "Asian");
        assert!(!record.assigned);
    }

    #[test]
    fn averages_are_rounded() {
        let form = survey_form();
        let resolved = attributes::resolve(&form).unwrap();
        let record = project(
            &response(vec![(PROGRAMMING_ATTR, json!(8)), (WRITING_ATTR, json!(9))]),
            &resolved,
        );
        // 25 / 3 = 8.333...
        assert_eq!(record.skill_average, 8.33);
        assert_eq!(record.skill_level, SkillLevel::High);
    }

    #[test]
    fn missing_choices_default_to_first_option() {
        let form = survey_form();
        let resolved = attributes::resolve(&form).unwrap();
        let record = project(&response(vec![(GENDER_ATTR, json!("  "))]), &resolved);
        assert_eq!(record.gender, "female");
        assert_eq!(record.ethnicity, "Asian");
    }

    #[test]
    fn no_usable_scale_answers_defaults_to_midpoint() {
        let form = survey_form();
        let resolved = attributes::resolve(&form).unwrap();
        let record = project(
            &response(vec![(PROGRAMMING_ATTR, json!("n/a")), (WRITING_ATTR, json!(null))]),
            &resolved,
        );
        assert_eq!(record.skill_average, SCALE_MIDPOINT);
        assert_eq!(record.skill_level, SkillLevel::Medium);
    }

    #[test]
    fn malformed_scale_answer_drops_its_weight() {
        let form = survey_form();
        let resolved = attributes::resolve(&form).unwrap();
        let record = project(
            &response(vec![(PROGRAMMING_ATTR, json!("oops")), (WRITING_ATTR, json!(3))]),
            &resolved,
        );
        assert_eq!(record.skill_average, 3.0);
        assert_eq!(record.skill_level, SkillLevel::Low);
    }

    #[test]
    fn skill_level_boundaries() {
        assert_eq!(SkillLevel::from_average(3.99), SkillLevel::Low);
        assert_eq!(SkillLevel::from_average(4.0), SkillLevel::Medium);
        assert_eq!(SkillLevel::from_average(6.99), SkillLevel::Medium);
        assert_eq!(SkillLevel::from_average(7.0), SkillLevel::High);
    }
}
