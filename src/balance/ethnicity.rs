use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::distribution::{
    assign, pick_partner, skill_level, team_average, unassigned_by_ethnicity,
};
use crate::models::{SectionDistribution, SkillLevel, SCALE_MIDPOINT};

/// Ethnicities with fewer than a quarter of the section's students, smallest first.
pub fn minority_groups(distribution: &SectionDistribution) -> Vec<(String, usize)> {
    let threshold = distribution.students.len() as f64 / 4.0;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for student in distribution.students.values() {
        *counts.entry(student.ethnicity.as_str()).or_insert(0) += 1;
    }

    let mut minorities: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| (*count as f64) < threshold)
        .map(|(ethnicity, count)| (ethnicity.to_string(), count))
        .collect();
    minorities.sort_by_key(|(_, count)| *count);
    minorities
}

pub fn balance_section<R: Rng + ?Sized>(distribution: &mut SectionDistribution, rng: &mut R) {
    for (ethnicity, count) in minority_groups(distribution) {
        debug!(section = %distribution.section, %ethnicity, count, "balancing minority group");
        fix_isolated(distribution, &ethnicity);
        pair_remaining(distribution, &ethnicity, rng);
    }
}

/// Skill level that would pull a team's average toward the middle.
pub fn level_needed(average: f64) -> SkillLevel {
    if average < 4.0 {
        SkillLevel::High
    } else if average > 7.0 {
        SkillLevel::Low
    } else {
        SkillLevel::Medium
    }
}

fn fix_isolated(distribution: &mut SectionDistribution, ethnicity: &str) {
    for team_index in 0..distribution.teams.len() {
        let team = &distribution.teams[team_index];
        if team.composition.ethnicity(ethnicity) != 1 || !team.has_room() {
            continue;
        }

        let pool = unassigned_by_ethnicity(distribution, ethnicity);
        let wanted = level_needed(team_average(distribution, team_index));
        let pick = pool
            .iter()
            .copied()
            .find(|id| skill_level(distribution, *id) == Some(wanted))
            .or_else(|| pool.first().copied());

        match pick {
            Some(student_id) => {
                assign(distribution, student_id, team_index);
            }
            None => return,
        }
    }
}

fn pair_remaining<R: Rng + ?Sized>(
    distribution: &mut SectionDistribution,
    ethnicity: &str,
    rng: &mut R,
) {
    loop {
        let pool = unassigned_by_ethnicity(distribution, ethnicity);
        if pool.len() < 2 {
            break;
        }
        let Some(team_index) = roomiest_team(distribution) else {
            return;
        };
        let Some(&first) = pool.choose(rng) else {
            break;
        };
        let partner = pick_partner(distribution, first, &pool);

        assign(distribution, first, team_index);
        if let Some(partner) = partner {
            if distribution.teams[team_index].has_room() {
                assign(distribution, partner, team_index);
            }
        }
    }

    if let [last] = unassigned_by_ethnicity(distribution, ethnicity).as_slice() {
        place_last(distribution, ethnicity, *last);
    }
}

/// Team with the most open slots, first one on ties; `None` when all are full.
fn roomiest_team(distribution: &SectionDistribution) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, team) in distribution.teams.iter().enumerate() {
        if team.spots_left > best.map_or(0, |(_, spots)| spots) {
            best = Some((index, team.spots_left));
        }
    }
    best.map(|(index, _)| index)
}

fn place_last(distribution: &mut SectionDistribution, ethnicity: &str, student_id: Uuid) {
    let Some(skill) = distribution
        .students
        .get(&student_id)
        .map(|student| student.skill_average)
    else {
        return;
    };

    let with_room: Vec<usize> = (0..distribution.teams.len())
        .filter(|index| distribution.teams[*index].has_room())
        .collect();
    let same_ethnicity: Vec<usize> = with_room
        .iter()
        .copied()
        .filter(|index| distribution.teams[*index].composition.ethnicity(ethnicity) > 0)
        .collect();
    let candidates = if same_ethnicity.is_empty() {
        with_room
    } else {
        same_ethnicity
    };

    let scored = candidates.into_iter().map(|index| {
        let team = &distribution.teams[index];
        let count = team.member_count();
        let total = team_average(distribution, index) * count as f64 + skill;
        let distance = (total / (count + 1) as f64 - SCALE_MIDPOINT).abs();
        (index, count, distance)
    });
    let best = scored.min_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)));

    if let Some((team_index, _, _)) = best {
        assign(distribution, student_id, team_index);
    }
}
