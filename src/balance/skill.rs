use tracing::debug;
use uuid::Uuid;

use crate::distribution::{assign, team_average};
use crate::error::{Result, TeamFormationError};
use crate::models::{SectionDistribution, SkillLevel};

const LOW_TEAM_PREFERENCE: [SkillLevel; 2] = [SkillLevel::High, SkillLevel::Medium];
const HIGH_TEAM_PREFERENCE: [SkillLevel; 2] = [SkillLevel::Low, SkillLevel::Medium];

/// Deals every still-unassigned student onto the teams, one per team per
/// round, weakest team first, steering each team's average toward the middle.
pub fn balance_section(distribution: &mut SectionDistribution) -> Result<()> {
    let mut rounds = 0usize;
    while !distribution.unassigned.is_empty() {
        if !distribution.teams.iter().any(|team| team.has_room()) {
            return Err(TeamFormationError::Unbalanced {
                section: distribution.section.clone(),
                reason: format!(
                    "{} students left with every team full",
                    distribution.unassigned.len()
                ),
            });
        }
        deal_round(distribution);
        rounds += 1;
    }

    for team in &distribution.teams {
        debug!(
            section = %distribution.section,
            team_id = team.team_id,
            low = team.composition.skill(SkillLevel::Low),
            medium = team.composition.skill(SkillLevel::Medium),
            high = team.composition.skill(SkillLevel::High),
            "team skill mix"
        );
    }
    debug!(section = %distribution.section, rounds, "skill pass finished");
    Ok(())
}

fn deal_round(distribution: &mut SectionDistribution) {
    let averages: Vec<f64> = (0..distribution.teams.len())
        .map(|index| team_average(distribution, index))
        .collect();
    let mut order: Vec<usize> = (0..distribution.teams.len()).collect();
    order.sort_by(|a, b| averages[*a].total_cmp(&averages[*b]));

    let mut pool: Vec<(Uuid, SkillLevel)> = distribution
        .unassigned
        .iter()
        .filter_map(|id| {
            distribution
                .students
                .get(id)
                .map(|student| (*id, student.skill_level))
        })
        .collect();
    pool.sort_by_key(|(_, level)| level.pool_rank());

    for team_index in order {
        if pool.is_empty() {
            return;
        }
        if !distribution.teams[team_index].has_room() {
            continue;
        }

        let preferred = if averages[team_index] > 7.0 {
            &HIGH_TEAM_PREFERENCE
        } else {
            &LOW_TEAM_PREFERENCE
        };
        let position = pool
            .iter()
            .position(|(_, level)| preferred.contains(level))
            .unwrap_or(0);
        let (student_id, _) = pool.remove(position);
        assign(distribution, student_id, team_index);
    }
}
