//! Roster data model.
//!
//! A [`Child`] is created from a [`ChildDraft`] by the sync coordinator,
//! which assigns the id, owner and creation timestamp. Names are stored
//! sanitized: angle brackets are stripped so the text is safe to render.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Remote collection holding [`Child`] records.
pub const CHILDREN_COLLECTION: &str = "children";
/// Remote collection holding [`Parent`] records.
pub const PARENTS_COLLECTION: &str = "parents";

/// One study subject with its session length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    /// Session length in minutes, always positive.
    pub duration_min: u32,
}

impl Subject {
    /// Build a subject with a fresh id, sanitizing the name.
    pub fn new(name: &str, duration_min: u32) -> Result<Self, ValidationError> {
        let name = sanitize(name);
        if name.trim().is_empty() {
            return Err(ValidationError::Empty("subject.name".into()));
        }
        if duration_min == 0 {
            return Err(ValidationError::InvalidValue {
                field: "subject.duration_min".into(),
                message: "must be a positive number of minutes".into(),
            });
        }
        Ok(Self {
            id: generate_id(),
            name,
            duration_min,
        })
    }

    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_min) * 60
    }
}

/// A child on the parent's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub stars: u32,
    /// Owning parent's principal id. Empty when created while signed out.
    #[serde(default)]
    pub parent_id: String,
    pub created_at: DateTime<Utc>,
}

impl Child {
    pub fn subject(&self, subject_id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == subject_id)
    }
}

/// User input for a new child, before ids and timestamps are assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDraft {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub subjects: Vec<Subject>,
}

impl ChildDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn birth_date(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    /// Append a subject. Fails on an empty name or a zero duration.
    pub fn subject(mut self, name: &str, duration_min: u32) -> Result<Self, ValidationError> {
        self.subjects.push(Subject::new(name, duration_min)?);
        Ok(self)
    }

    /// Turn the draft into a roster entry owned by `parent_id`.
    pub fn into_child(self, parent_id: &str) -> Result<Child, ValidationError> {
        let name = sanitize(&self.name);
        if name.trim().is_empty() {
            return Err(ValidationError::Empty("name".into()));
        }
        for subject in &self.subjects {
            if subject.duration_min == 0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("subjects.{}.duration_min", subject.id),
                    message: "must be a positive number of minutes".into(),
                });
            }
        }
        let subjects = self
            .subjects
            .into_iter()
            .map(|s| Subject {
                name: sanitize(&s.name),
                ..s
            })
            .collect();
        Ok(Child {
            id: generate_id(),
            name,
            birth_date: self.birth_date,
            subjects,
            stars: 0,
            parent_id: parent_id.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// The signed-in account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    /// Matches the authentication principal's uid.
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Parent {
    /// Name shown in greetings; falls back to the email address.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Strip HTML angle brackets.
pub fn sanitize(input: &str) -> String {
    input.chars().filter(|c| *c != '<' && *c != '>').collect()
}

/// Opaque, globally unique identifier generated on the client.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
