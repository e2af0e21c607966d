use crate::error::{Result, TeamFormationError};
use crate::models::{AttributeKind, AttributeSpec, Form};

pub const GENDER: &str = "gender";
pub const ETHNICITY: &str = "ethnicity";

/// The attributes of a form the balancing passes read.
#[derive(Debug, Clone)]
pub struct ResolvedAttributes<'a> {
    pub gender: &'a AttributeSpec,
    pub ethnicity: &'a AttributeSpec,
    pub scales: Vec<&'a AttributeSpec>,
}

pub fn resolve(form: &Form) -> Result<ResolvedAttributes<'_>> {
    let gender = find_choice_attribute(form, GENDER)?;
    let ethnicity = find_choice_attribute(form, ETHNICITY)?;
    let scales = form
        .attributes
        .iter()
        .filter(|attribute| attribute.kind == AttributeKind::Scale)
        .collect();

    Ok(ResolvedAttributes {
        gender,
        ethnicity,
        scales,
    })
}

fn find_choice_attribute<'a>(form: &'a Form, name: &str) -> Result<&'a AttributeSpec> {
    let mut matches = form.attributes.iter().filter(|attribute| {
        attribute.kind == AttributeKind::MultipleChoice
            && attribute.name.trim().eq_ignore_ascii_case(name)
    });

    let attribute = matches.next().ok_or_else(|| {
        TeamFormationError::configuration(
            name,
            format!("form \"{}\" has no multiple-choice attribute named \"{name}\"", form.title),
        )
    })?;

    if matches.next().is_some() {
        return Err(TeamFormationError::configuration(
            name,
            format!("form \"{}\" has more than one attribute named \"{name}\"", form.title),
        ));
    }

    if attribute.options.is_empty() {
        return Err(TeamFormationError::configuration(
            name,
            format!("attribute \"{}\" declares no options", attribute.name),
        ));
    }

    Ok(attribute)
}
