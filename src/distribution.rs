//! Per-section working state and the helpers every balancing pass shares.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::models::{SectionDistribution, SkillLevel, StudentRecord, Team};
use crate::sizer;

/// Groups records by section and builds each section's indices and empty teams.
pub fn index_sections(records: Vec<StudentRecord>) -> Vec<SectionDistribution> {
    let mut grouped: BTreeMap<String, Vec<StudentRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.section.clone()).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(section, records)| index_section(section, records))
        .collect()
}

pub fn index_section(section: String, records: Vec<StudentRecord>) -> SectionDistribution {
    let mut students = BTreeMap::new();
    for record in records {
        if let Some(previous) = students.insert(record.student_id, record) {
            tracing::warn!(
                section = %section,
                student_id = %previous.student_id,
                "duplicate response; keeping the latest"
            );
        }
    }

    let mut by_gender: BTreeMap<String, BTreeSet<Uuid>> = BTreeMap::new();
    let mut by_ethnicity: BTreeMap<String, BTreeSet<Uuid>> = BTreeMap::new();
    let mut by_skill: BTreeMap<SkillLevel, BTreeSet<Uuid>> = BTreeMap::new();
    let mut unassigned = BTreeSet::new();

    for student in students.values() {
        by_gender
            .entry(student.gender.clone())
            .or_default()
            .insert(student.student_id);
        by_ethnicity
            .entry(student.ethnicity.clone())
            .or_default()
            .insert(student.student_id);
        by_skill
            .entry(student.skill_level)
            .or_default()
            .insert(student.student_id);
        unassigned.insert(student.student_id);
    }

    let teams = sizer::plan(students.len())
        .capacities()
        .into_iter()
        .enumerate()
        .map(|(index, capacity)| Team::new(index + 1, capacity))
        .collect();

    SectionDistribution {
        section,
        students,
        by_gender,
        by_ethnicity,
        by_skill,
        unassigned,
        teams,
    }
}

/// Seats a student on `teams[team_index]` and drops them from every index.
/// Returns false when the student is unknown, already placed, or the team is full.
pub fn assign(distribution: &mut SectionDistribution, student_id: Uuid, team_index: usize) -> bool {
    let Some(student) = distribution.students.get_mut(&student_id) else {
        return false;
    };
    let Some(team) = distribution.teams.get_mut(team_index) else {
        return false;
    };
    if student.assigned || !team.seat(student) {
        return false;
    }

    student.assigned = true;
    student.team_id = Some(team.team_id);

    distribution.unassigned.remove(&student_id);
    if let Some(ids) = distribution.by_gender.get_mut(&student.gender) {
        ids.remove(&student_id);
    }
    if let Some(ids) = distribution.by_ethnicity.get_mut(&student.ethnicity) {
        ids.remove(&student_id);
    }
    if let Some(ids) = distribution.by_skill.get_mut(&student.skill_level) {
        ids.remove(&student_id);
    }
    true
}

/// Mean skill of the students currently on the team, 0 for an empty team.
pub fn team_average(distribution: &SectionDistribution, team_index: usize) -> f64 {
    let Some(team) = distribution.teams.get(team_index) else {
        return 0.0;
    };
    let (sum, count) = team
        .member_ids()
        .filter_map(|id| distribution.students.get(&id))
        .fold((0.0, 0usize), |(sum, count), student| {
            (sum + student.skill_average, count + 1)
        });

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn skill_level(distribution: &SectionDistribution, student_id: Uuid) -> Option<SkillLevel> {
    distribution
        .students
        .get(&student_id)
        .map(|student| student.skill_level)
}

pub fn unassigned_by_gender(distribution: &SectionDistribution, gender: &str) -> Vec<Uuid> {
    distribution
        .by_gender
        .get(gender)
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default()
}

pub fn unassigned_by_ethnicity(distribution: &SectionDistribution, ethnicity: &str) -> Vec<Uuid> {
    distribution
        .by_ethnicity
        .get(ethnicity)
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default()
}

/// Picks a partner for `student_id` from `candidates` whose skill level
/// complements it: low pairs with high then medium, high with low then
/// medium, medium with medium.
pub fn find_matching_pair(
    distribution: &SectionDistribution,
    student_id: Uuid,
    candidates: &[Uuid],
) -> Option<Uuid> {
    let level = skill_level(distribution, student_id)?;
    level.complements().iter().find_map(|wanted| {
        candidates.iter().copied().find(|candidate| {
            *candidate != student_id && skill_level(distribution, *candidate) == Some(*wanted)
        })
    })
}

/// Like [`find_matching_pair`], falling back to the first other candidate.
pub fn pick_partner(
    distribution: &SectionDistribution,
    student_id: Uuid,
    candidates: &[Uuid],
) -> Option<Uuid> {
    find_matching_pair(distribution, student_id, candidates)
        .or_else(|| candidates.iter().copied().find(|id| *id != student_id))
}

/// Checks the capacity, conservation and index invariants of a section.
pub fn verify(distribution: &SectionDistribution) -> Result<(), String> {
    let mut seen = BTreeSet::new();

    for team in &distribution.teams {
        if team.members.len() != team.capacity {
            return Err(format!(
                "team {} has {} slots for capacity {}",
                team.team_id,
                team.members.len(),
                team.capacity
            ));
        }
        let filled = team.member_ids().count();
        if team.spots_left + filled != team.capacity {
            return Err(format!(
                "team {} reports {} spots left with {} of {} filled",
                team.team_id, team.spots_left, filled, team.capacity
            ));
        }
        for id in team.member_ids() {
            if !seen.insert(id) {
                return Err(format!("student {id} sits on more than one team"));
            }
            match distribution.students.get(&id) {
                Some(student) if student.assigned && student.team_id == Some(team.team_id) => {}
                _ => {
                    return Err(format!(
                        "student {id} on team {} is not marked as placed there",
                        team.team_id
                    ))
                }
            }
        }
    }

    for student in distribution.students.values() {
        let id = student.student_id;
        if student.assigned == distribution.unassigned.contains(&id) {
            return Err(format!("student {id} is out of sync with the unassigned set"));
        }
        let indexed = [
            distribution.by_gender.get(&student.gender),
            distribution.by_ethnicity.get(&student.ethnicity),
        ]
        .into_iter()
        .map(|ids| ids.is_some_and(|ids| ids.contains(&id)))
        .chain(std::iter::once(
            distribution
                .by_skill
                .get(&student.skill_level)
                .is_some_and(|ids| ids.contains(&id)),
        ))
        .filter(|present| *present)
        .count();
        let expected = if student.assigned { 0 } else { 3 };
        if indexed != expected {
            return Err(format!("student {id} is out of sync with the category indices"));
        }
    }

    if seen.len() + distribution.unassigned.len() != distribution.students.len() {
        return Err("placed and unassigned students do not add up to the roster".to_string());
    }

    Ok(())
}
