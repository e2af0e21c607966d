use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::distribution::{assign, pick_partner, unassigned_by_gender};
use crate::models::{is_binary_gender, SectionDistribution, FEMALE};

/// What to do when females are still unpaired after every team is out of pair slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenderOverflow {
    /// Stop the gender pass for that section and move on to the next one.
    #[default]
    SkipSection,
    /// Stop the gender pass for that section and every section after it.
    HaltRemainingSections,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenderOutcome {
    Balanced,
    Overflow { unpaired_females: usize },
}

pub fn run<R: Rng + ?Sized>(
    sections: &mut [SectionDistribution],
    policy: GenderOverflow,
    rng: &mut R,
) {
    for index in 0..sections.len() {
        let section = &mut sections[index];
        if let GenderOutcome::Overflow { unpaired_females } = balance_section(section, rng) {
            warn!(
                section = %section.section,
                unpaired_females,
                "females left unpaired after the gender pass"
            );
            if policy == GenderOverflow::HaltRemainingSections {
                let skipped = sections.len() - index - 1;
                if skipped > 0 {
                    warn!(skipped, "gender pass halted for the remaining sections");
                }
                return;
            }
        }
    }
}

/// Pairs females onto teams so none is alone, tops up a lone leftover
/// female, then spreads other-gender students onto two-female teams.
pub fn balance_section<R: Rng + ?Sized>(
    distribution: &mut SectionDistribution,
    rng: &mut R,
) -> GenderOutcome {
    let pairs = pair_females(distribution, rng);
    debug!(section = %distribution.section, pairs, "female pairs placed");

    let remaining = unassigned_by_gender(distribution, FEMALE);
    if remaining.len() > 1 {
        return GenderOutcome::Overflow {
            unpaired_females: remaining.len(),
        };
    }
    if let Some(&last) = remaining.first() {
        place_single_female(distribution, last);
    }

    place_other_genders(distribution);
    GenderOutcome::Balanced
}

fn pair_females<R: Rng + ?Sized>(distribution: &mut SectionDistribution, rng: &mut R) -> usize {
    let mut pairs = 0;
    loop {
        let mut placed_this_round = false;
        for team_index in 0..distribution.teams.len() {
            let females = unassigned_by_gender(distribution, FEMALE);
            if females.len() < 2 {
                return pairs;
            }
            if distribution.teams[team_index].spots_left < 2 {
                continue;
            }
            let Some(&first) = females.choose(rng) else {
                return pairs;
            };
            let Some(partner) = pick_partner(distribution, first, &females) else {
                return pairs;
            };
            assign(distribution, first, team_index);
            assign(distribution, partner, team_index);
            pairs += 1;
            placed_this_round = true;
        }
        if !placed_this_round {
            return pairs;
        }
    }
}

fn place_single_female(distribution: &mut SectionDistribution, student_id: Uuid) {
    let target = distribution
        .teams
        .iter()
        .position(|team| team.composition.gender(FEMALE) == 2 && team.has_room());

    match target {
        Some(team_index) => {
            assign(distribution, student_id, team_index);
        }
        None => warn!(
            section = %distribution.section,
            %student_id,
            "no two-female team has room for the remaining female"
        ),
    }
}

fn place_other_genders(distribution: &mut SectionDistribution) {
    let others: Vec<Uuid> = distribution
        .unassigned
        .iter()
        .copied()
        .filter(|id| {
            distribution
                .students
                .get(id)
                .is_some_and(|student| !is_binary_gender(&student.gender))
        })
        .collect();

    for (placed, student_id) in others.iter().enumerate() {
        let Some(team_index) = eligible_team_for_other(distribution) else {
            warn!(
                section = %distribution.section,
                left = others.len() - placed,
                "other-gender students left for the skill pass"
            );
            return;
        };
        assign(distribution, *student_id, team_index);
    }
}

fn eligible_team_for_other(distribution: &SectionDistribution) -> Option<usize> {
    let eligible: Vec<usize> = distribution
        .teams
        .iter()
        .enumerate()
        .filter(|(_, team)| {
            team.composition.gender(FEMALE) == 2
                && team.has_room()
                && team.composition.other_genders() == 0
        })
        .map(|(index, _)| index)
        .collect();

    eligible
        .iter()
        .copied()
        .find(|index| distribution.teams[*index].capacity == 4)
        .or_else(|| eligible.first().copied())
}
