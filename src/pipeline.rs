use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attributes;
use crate::balance::{ethnicity, gender, skill, GenderOverflow};
use crate::distribution;
use crate::error::{Result, TeamFormationError};
use crate::models::{Form, SectionDistribution, Student, TeamDraft, TeamMember};
use crate::projector;

#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceOptions {
    pub gender_overflow: GenderOverflow,
}

/// Resolves the form's attributes, projects every response and runs the
/// gender, ethnicity and skill passes over each section.
pub fn balance_sections<R: Rng + ?Sized>(
    form: &Form,
    options: &BalanceOptions,
    rng: &mut R,
) -> Result<Vec<SectionDistribution>> {
    let resolved = attributes::resolve(form)?;
    let records = form
        .responses
        .iter()
        .map(|response| projector::project(response, &resolved))
        .collect();

    let mut sections = distribution::index_sections(records);
    debug!(form_id = %form.id, sections = sections.len(), "sections indexed");

    gender::run(&mut sections, options.gender_overflow, rng);
    for section in sections.iter_mut() {
        ethnicity::balance_section(section, rng);
    }
    for section in sections.iter_mut() {
        skill::balance_section(section)?;
        distribution::verify(section).map_err(|reason| TeamFormationError::Unbalanced {
            section: section.section.clone(),
            reason,
        })?;
    }

    Ok(sections)
}

pub fn plan_teams<R: Rng + ?Sized>(
    form: &Form,
    roster: &HashMap<Uuid, Student>,
    options: &BalanceOptions,
    rng: &mut R,
) -> Result<Vec<TeamDraft>> {
    let sections = balance_sections(form, options, rng)?;
    let drafts = materialize(&sections, roster)?;
    info!(
        form_id = %form.id,
        sections = sections.len(),
        teams = drafts.len(),
        "teams planned"
    );
    Ok(drafts)
}

/// Turns non-empty teams into named drafts with resolved members. Names run
/// "Team 1", "Team 2", ... across all sections in order.
pub fn materialize(
    sections: &[SectionDistribution],
    roster: &HashMap<Uuid, Student>,
) -> Result<Vec<TeamDraft>> {
    let mut drafts = Vec::new();

    for section in sections {
        for team in &section.teams {
            let members = team
                .member_ids()
                .map(|id| {
                    let student = roster.get(&id).ok_or_else(|| {
                        TeamFormationError::Data(format!(
                            "student {id} on team {} in section {} is not on the roster",
                            team.team_id, section.section
                        ))
                    })?;
                    if student.section != section.section {
                        warn!(
                            student_id = %student.id,
                            roster_section = %student.section,
                            response_section = %section.section,
                            "student answered from a different section than the roster lists"
                        );
                    }
                    Ok(TeamMember {
                        id: student.id,
                        name: student.full_name.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            if members.is_empty() {
                continue;
            }

            drafts.push(TeamDraft {
                name: format!("Team {}", drafts.len() + 1),
                section: section.section.clone(),
                members,
            });
        }
    }

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{skill_for, Survey, GENDER_ATTR};
    use crate::models::{Team, FEMALE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn mixed_survey(sections: &[(&str, usize)]) -> Survey {
        let mut survey = Survey::new();
        let ethnicities = ["White", "White", "Asian", "Black", "White", "Hispanic"];
        for (section, size) in sections {
            for index in 0..*size {
                let gender = if index % 2 == 0 { "Female" } else { "Male" };
                let ethnicity = ethnicities[index % ethnicities.len()];
                survey.respond(section, gender, ethnicity, skill_for(index * 7 + 1));
            }
        }
        survey
    }

    fn balance(survey: &Survey, seed: u64) -> Vec<SectionDistribution> {
        let mut rng = StdRng::seed_from_u64(seed);
        balance_sections(&survey.form, &BalanceOptions::default(), &mut rng).unwrap()
    }

    fn plan(survey: &Survey, seed: u64) -> Result<Vec<TeamDraft>> {
        let mut rng = StdRng::seed_from_u64(seed);
        plan_teams(&survey.form, &survey.roster, &BalanceOptions::default(), &mut rng)
    }

    #[test]
    fn eight_students_make_two_balanced_teams() {
        let mut survey = Survey::new();
        let skills = [2.0, 9.0, 4.5, 7.5, 3.0, 6.0, 8.0, 5.0];
        for (index, skill) in skills.iter().enumerate() {
            let gender = if index % 2 == 0 { "Female" } else { "Male" };
            let ethnicity = if index < 4 { "Asian" } else { "White" };
            survey.respond("A", gender, ethnicity, *skill);
        }

        let sections = balance(&survey, 42);
        let teams = &sections[0].teams;
        assert_eq!(teams.iter().map(|t| t.capacity).collect::<Vec<_>>(), vec![4, 4]);

        let mean = skills.iter().sum::<f64>() / skills.len() as f64;
        for index in 0..teams.len() {
            let average = distribution::team_average(&sections[0], index);
            assert!((average - mean).abs() <= 5.0);
            assert!((3.0..=8.0).contains(&average));
        }

        let drafts = materialize(&sections, &survey.roster).unwrap();
        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(|draft| draft.members.len() == 4));
    }

    #[test]
    fn every_student_lands_on_exactly_one_team() {
        let survey = mixed_survey(&[("A", 23), ("B", 14), ("C", 9)]);

        let sections = balance(&survey, 8);

        for section in &sections {
            let capacity: usize = section.teams.iter().map(|team| team.capacity).sum();
            assert_eq!(capacity, section.students.len());
            assert!(section.teams.iter().all(|team| team.capacity == 3 || team.capacity == 4));
            assert!(section.unassigned.is_empty());
            assert!(section.teams.iter().all(|team| team.spots_left == 0));
            distribution::verify(section).unwrap();
        }

        let drafts = plan(&survey, 9).unwrap();
        let placed: BTreeSet<Uuid> = drafts
            .iter()
            .flat_map(|draft| draft.members.iter().map(|member| member.id))
            .collect();
        let expected: BTreeSet<Uuid> = survey.roster.keys().copied().collect();
        assert_eq!(placed, expected);
        assert_eq!(drafts.iter().map(|d| d.members.len()).sum::<usize>(), 46);
    }

    #[test]
    fn gender_balance_survives_later_passes() {
        let survey = mixed_survey(&[("A", 24)]);

        let sections = balance(&survey, 15);

        assert!(sections[0]
            .teams
            .iter()
            .all(|team| team.composition.gender(FEMALE) != 1));
    }

    #[test]
    fn regeneration_keeps_team_sizes() {
        let survey = mixed_survey(&[("A", 17), ("B", 10)]);
        let sizes = |seed: u64| {
            plan(&survey, seed)
                .unwrap()
                .iter()
                .map(|draft| (draft.section.clone(), draft.members.len()))
                .collect::<Vec<_>>()
        };

        assert_eq!(sizes(1), sizes(2));
    }

    #[test]
    fn same_seed_gives_same_teams() {
        let survey = mixed_survey(&[("A", 19)]);
        let members = |seed: u64| {
            plan(&survey, seed)
                .unwrap()
                .into_iter()
                .map(|draft| draft.members)
                .collect::<Vec<_>>()
        };

        assert_eq!(members(77), members(77));
    }

    #[test]
    fn missing_gender_attribute_creates_no_teams() {
        let mut survey = mixed_survey(&[("A", 8)]);
        survey.form.attributes.retain(|attribute| attribute.id != GENDER_ATTR);

        let err = plan(&survey, 1).unwrap_err();
        assert!(matches!(err, TeamFormationError::Configuration { .. }));
        assert!(err.to_string().contains("gender"));
    }

    #[test]
    fn unknown_student_is_a_data_error() {
        let mut survey = mixed_survey(&[("A", 6)]);
        let missing = survey.form.responses[0].student_id;
        survey.roster.remove(&missing);

        let err = plan(&survey, 1).unwrap_err();
        assert!(matches!(
            err,
            TeamFormationError::Data(message) if message.contains(&missing.to_string())
        ));
    }

    #[test]
    fn names_run_across_sections_and_skip_empty_teams() {
        let survey = mixed_survey(&[("A", 3), ("B", 3)]);
        let mut sections = balance(&survey, 3);
        sections[0].teams.push(Team::new(2, 3));

        let drafts = materialize(&sections, &survey.roster).unwrap();
        let labels: Vec<(&str, &str)> = drafts
            .iter()
            .map(|draft| (draft.name.as_str(), draft.section.as_str()))
            .collect();
        assert_eq!(labels, vec![("Team 1", "A"), ("Team 2", "B")]);
    }

    #[test]
    fn members_keep_roster_identity_when_sections_disagree() {
        let mut survey = mixed_survey(&[("A", 3)]);
        let moved = survey.form.responses[0].student_id;
        if let Some(student) = survey.roster.get_mut(&moved) {
            student.section = "B".to_string();
        }

        let drafts = plan(&survey, 5).unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].section, "A");
        let member = drafts[0]
            .members
            .iter()
            .find(|member| member.id == moved)
            .expect("the student stays on the team");
        assert_eq!(member.name, survey.roster[&moved].full_name);
    }

    #[test]
    fn no_responses_means_no_teams() {
        let survey = Survey::new();
        let drafts = plan(&survey, 3).unwrap();
        assert!(drafts.is_empty());
    }
}
