//! The three balancing passes, run in order: gender, ethnicity, skill.

pub mod ethnicity;
pub mod gender;
pub mod skill;

pub use gender::GenderOverflow;
