use std::collections::HashMap;

use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Result, TeamFormationError};
use crate::models::{
    AttributeKind, AttributeSpec, Form, PersistedTeam, Response, Student, TeamDraft, TeamMember,
};
use crate::pipeline::{self, BalanceOptions};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const FIRST_NAMES: [&str; 12] = [
    "Avery", "Jules", "Kiara", "Mateo", "Noor", "Priya", "Sam", "Tariq", "Lena", "Diego", "Mei",
    "Jordan",
];
const LAST_NAMES: [&str; 10] = [
    "Lee", "Moreno", "Patel", "Okafor", "Nguyen", "Haddad", "Kowalski", "Santos", "Kim", "Brooks",
];

/// Creates a demo survey form and a synthetic roster that answered it.
pub async fn seed<R: Rng + ?Sized>(
    pool: &PgPool,
    sections: &[String],
    per_section: usize,
    rng: &mut R,
) -> anyhow::Result<Uuid> {
    let form_id = Uuid::new_v4();
    sqlx::query("INSERT INTO team_formation.forms (id, title) VALUES ($1, $2)")
        .bind(form_id)
        .bind("Project team survey")
        .execute(pool)
        .await
        .context("failed to insert seed form")?;

    let attributes = [
        ("Gender", AttributeKind::MultipleChoice, "Female, Male, Other", 0.0),
        (
            "Ethnicity",
            AttributeKind::MultipleChoice,
            "Asian, Black, Hispanic, White",
            0.0,
        ),
        ("Programming experience", AttributeKind::Scale, "", 2.0),
        ("Teamwork", AttributeKind::Scale, "", 1.0),
        ("Preferred role", AttributeKind::Text, "", 0.0),
    ];
    let mut attribute_ids = Vec::new();
    for (position, (name, kind, options, weightage)) in attributes.iter().enumerate() {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO team_formation.form_attributes
            (id, form_id, name, kind, options, weightage, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(form_id)
        .bind(*name)
        .bind(kind.as_str())
        .bind(*options)
        .bind(*weightage)
        .bind(position as i32)
        .execute(pool)
        .await?;
        attribute_ids.push(id);
    }

    let ethnicities = [("White", 5), ("Asian", 2), ("Hispanic", 2), ("Black", 1)];
    for section in sections {
        for index in 0..per_section {
            let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Alex");
            let last = LAST_NAMES.choose(rng).copied().unwrap_or("Doe");
            let email = format!(
                "{}.{}.{}{}@groupscholar.com",
                first.to_lowercase(),
                last.to_lowercase(),
                section.to_lowercase(),
                index
            );

            let student_id: Uuid = sqlx::query(
                r#"
                INSERT INTO team_formation.students (id, full_name, email, section)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (email) DO UPDATE
                SET full_name = EXCLUDED.full_name, section = EXCLUDED.section
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(format!("{first} {last}"))
            .bind(&email)
            .bind(section)
            .fetch_one(pool)
            .await?
            .get("id");

            let gender = match rng.gen_range(0..20) {
                0..=8 => "Female",
                9..=17 => "Male",
                _ => "Other",
            };
            let ethnicity = ethnicities
                .choose_weighted(rng, |(_, weight)| *weight)
                .map(|(name, _)| *name)
                .unwrap_or("White");
            let answers = json!({
                attribute_ids[0].to_string(): gender,
                attribute_ids[1].to_string(): ethnicity,
                attribute_ids[2].to_string(): rng.gen_range(1..=10),
                attribute_ids[3].to_string(): rng.gen_range(1..=10),
                attribute_ids[4].to_string(): "anything",
            });

            sqlx::query(
                r#"
                INSERT INTO team_formation.responses (id, form_id, student_id, section, answers)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (form_id, student_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(form_id)
            .bind(student_id)
            .bind(section)
            .bind(answers)
            .execute(pool)
            .await?;
        }
    }

    Ok(form_id)
}

fn parse_answers(form_id: Uuid, student_id: Uuid, raw: Value) -> HashMap<Uuid, Value> {
    match serde_json::from_value(raw) {
        Ok(answers) => answers,
        Err(err) => {
            warn!(%form_id, %student_id, error = %err, "unreadable answers; using defaults");
            HashMap::new()
        }
    }
}

/// Reads a form with its attributes and responses, plus the students who responded.
pub async fn load_form(
    conn: &mut PgConnection,
    form_id: Uuid,
) -> Result<(Form, HashMap<Uuid, Student>)> {
    let title: String = sqlx::query("SELECT title FROM team_formation.forms WHERE id = $1")
        .bind(form_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(TeamFormationError::FormNotFound(form_id))?
        .get("title");

    let attributes = sqlx::query(
        r#"
        SELECT id, name, kind, options, weightage
        FROM team_formation.form_attributes
        WHERE form_id = $1
        ORDER BY position
        "#,
    )
    .bind(form_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| AttributeSpec {
        id: row.get("id"),
        name: row.get("name"),
        kind: AttributeKind::parse(row.get("kind")),
        options: AttributeSpec::split_options(row.get("options")),
        weightage: row.get("weightage"),
    })
    .collect();

    let rows = sqlx::query(
        r#"
        SELECT r.student_id, r.section, r.answers, s.full_name, s.section AS roster_section
        FROM team_formation.responses r
        JOIN team_formation.students s ON s.id = r.student_id
        WHERE r.form_id = $1
        ORDER BY r.section, s.full_name
        "#,
    )
    .bind(form_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut responses = Vec::with_capacity(rows.len());
    let mut roster = HashMap::with_capacity(rows.len());
    for row in rows {
        let student_id: Uuid = row.get("student_id");
        let section: String = row.get("section");
        roster.insert(
            student_id,
            Student {
                id: student_id,
                full_name: row.get("full_name"),
                section: row.get("roster_section"),
            },
        );
        responses.push(Response {
            student_id,
            section,
            answers: parse_answers(form_id, student_id, row.get("answers")),
        });
    }

    let form = Form {
        id: form_id,
        title,
        attributes,
        responses,
    };
    Ok((form, roster))
}

/// Replaces a form's teams with a freshly balanced set. Wiping, planning and
/// inserting share one transaction; any failure rolls all of it back.
pub async fn generate_teams<R: Rng + ?Sized>(
    pool: &PgPool,
    form_id: Uuid,
    options: &BalanceOptions,
    rng: &mut R,
) -> Result<Vec<TeamDraft>> {
    let mut tx = pool.begin().await?;

    match regenerate(&mut tx, form_id, options, rng).await {
        Ok(teams) => {
            tx.commit().await?;
            info!(%form_id, teams = teams.len(), "teams generated");
            Ok(teams)
        }
        Err(err) => {
            error!(%form_id, error = %err, "team generation failed; rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                error!(%form_id, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn regenerate<R: Rng + ?Sized>(
    conn: &mut PgConnection,
    form_id: Uuid,
    options: &BalanceOptions,
    rng: &mut R,
) -> Result<Vec<TeamDraft>> {
    let removed = sqlx::query("DELETE FROM team_formation.teams WHERE form_id = $1")
        .bind(form_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    info!(%form_id, removed, "previous teams cleared");

    let (form, roster) = load_form(&mut *conn, form_id).await?;
    let teams = pipeline::plan_teams(&form, &roster, options, rng)?;

    for team in &teams {
        sqlx::query(
            r#"
            INSERT INTO team_formation.teams (id, form_id, name, section, members)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(&team.name)
        .bind(&team.section)
        .bind(Json(&team.members))
        .execute(&mut *conn)
        .await?;
    }

    Ok(teams)
}

pub async fn fetch_form_title(pool: &PgPool, form_id: Uuid) -> anyhow::Result<String> {
    let row = sqlx::query("SELECT title FROM team_formation.forms WHERE id = $1")
        .bind(form_id)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("form {form_id} not found"))?;
    Ok(row.get("title"))
}

pub async fn fetch_teams(pool: &PgPool, form_id: Uuid) -> anyhow::Result<Vec<PersistedTeam>> {
    let rows = sqlx::query(
        r#"
        SELECT name, section, members, created_at
        FROM team_formation.teams
        WHERE form_id = $1
        ORDER BY section, created_at, name
        "#,
    )
    .bind(form_id)
    .fetch_all(pool)
    .await?;

    let mut teams = Vec::new();
    for row in rows {
        let members: Json<Vec<TeamMember>> = row.get("members");
        teams.push(PersistedTeam {
            name: row.get("name"),
            section: row.get("section"),
            members: members.0,
            created_at: row.get("created_at"),
        });
    }

    Ok(teams)
}
