use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::PersistedTeam;

#[derive(Debug, Clone, PartialEq)]
pub struct SectionSummary {
    pub section: String,
    pub team_count: usize,
    pub student_count: usize,
    pub teams_of_4: usize,
    pub teams_of_3: usize,
    pub other_sizes: usize,
}

pub fn summarize_by_section(teams: &[PersistedTeam]) -> Vec<SectionSummary> {
    let mut map: BTreeMap<&str, SectionSummary> = BTreeMap::new();

    for team in teams {
        let entry = map
            .entry(team.section.as_str())
            .or_insert_with(|| SectionSummary {
                section: team.section.clone(),
                team_count: 0,
                student_count: 0,
                teams_of_4: 0,
                teams_of_3: 0,
                other_sizes: 0,
            });
        entry.team_count += 1;
        entry.student_count += team.members.len();
        match team.members.len() {
            4 => entry.teams_of_4 += 1,
            3 => entry.teams_of_3 += 1,
            _ => entry.other_sizes += 1,
        }
    }

    map.into_values().collect()
}

pub fn build_report(form_title: &str, teams: &[PersistedTeam]) -> String {
    let summaries = summarize_by_section(teams);
    let mut output = String::new();

    let _ = writeln!(output, "# Team Roster Report");
    let _ = writeln!(output, "Generated for {form_title}");
    let generated_at = teams.iter().map(|team| team.created_at).max();
    if let Some(generated_at) = generated_at {
        let _ = writeln!(output, "Teams formed {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Section Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No teams have been generated for this form.");
        return output;
    }

    for summary in &summaries {
        let _ = write!(
            output,
            "- {}: {} students in {} teams ({} of 4, {} of 3",
            summary.section,
            summary.student_count,
            summary.team_count,
            summary.teams_of_4,
            summary.teams_of_3
        );
        if summary.other_sizes > 0 {
            let _ = write!(output, ", {} undersized", summary.other_sizes);
        }
        let _ = writeln!(output, ")");
    }

    let mut current_section: Option<&str> = None;
    for team in teams {
        if current_section != Some(team.section.as_str()) {
            let _ = writeln!(output);
            let _ = writeln!(output, "## Section {}", team.section);
            current_section = Some(team.section.as_str());
        }
        let names: Vec<&str> = team.members.iter().map(|member| member.name.as_str()).collect();
        let _ = writeln!(output, "- {}: {}", team.name, names.join(", "));
    }

    output
}
