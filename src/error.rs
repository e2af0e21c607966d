use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, TeamFormationError>;

#[derive(Error, Debug)]
pub enum TeamFormationError {
    /// The form's gender/ethnicity attribute is missing or unusable.
    #[error("{attribute} attribute is misconfigured: {reason}")]
    Configuration { attribute: String, reason: String },

    /// A team member could not be resolved to a known student.
    #[error("data error: {0}")]
    Data(String),

    #[error("form {0} not found")]
    FormNotFound(Uuid),

    /// A section could not be fully and consistently placed into teams.
    #[error("section {section} could not be balanced: {reason}")]
    Unbalanced { section: String, reason: String },

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl TeamFormationError {
    pub fn configuration(attribute: &str, reason: impl Into<String>) -> Self {
        TeamFormationError::Configuration {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }
}
