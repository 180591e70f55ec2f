//! Core records: students and class offerings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::GradingError;

/// A student's national ID with punctuation and whitespace stripped.
///
/// `"123.456.789-00"` and `"12345678900"` are the same student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentId(String);

impl StudentId {
    pub fn parse(raw: &str) -> Result<Self, GradingError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_ascii_punctuation() && !c.is_whitespace())
            .collect();

        if cleaned.is_empty() {
            return Err(GradingError::InvalidStudent(format!(
                "national ID '{raw}' is empty after normalization"
            )));
        }

        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StudentId {
    type Error = GradingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StudentId> for String {
    fn from(id: StudentId) -> Self {
        id.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A registered student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
}

impl Student {
    /// Builds a student, rejecting blank names or emails.
    pub fn new(national_id: &str, name: &str, email: &str) -> Result<Self, GradingError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(GradingError::InvalidStudent(
                "name, national ID and email are required".into(),
            ));
        }

        Ok(Self {
            id: StudentId::parse(national_id)?,
            name: name.to_string(),
            email: email.to_string(),
        })
    }
}

/// Opaque identifier handed out when a class is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u64);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class-{}", self.0)
    }
}

/// The unique `(topic, year, semester)` triple of a class offering.
///
/// Text form is `TOPIC-YEAR-SEMESTER`; the topic may itself contain dashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassKey {
    pub topic: String,
    pub year: i32,
    pub semester: u8,
}

impl ClassKey {
    pub fn new(topic: impl Into<String>, year: i32, semester: u8) -> Self {
        Self {
            topic: topic.into(),
            year,
            semester,
        }
    }

    /// `true` when `other` is an earlier offering of the same topic.
    pub fn is_prior_offering(&self, other: &ClassKey) -> bool {
        self.topic == other.topic && other.term() < self.term()
    }

    fn term(&self) -> (i32, u8) {
        (self.year, self.semester)
    }
}

impl Ord for ClassKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.topic
            .cmp(&other.topic)
            .then_with(|| self.term().cmp(&other.term()))
    }
}

impl PartialOrd for ClassKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.topic, self.year, self.semester)
    }
}

impl FromStr for ClassKey {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, '-');
        let semester = parts.next().and_then(|p| p.trim().parse::<u8>().ok());
        let year = parts.next().and_then(|p| p.trim().parse::<i32>().ok());
        let topic = parts.next().map(str::trim).filter(|t| !t.is_empty());

        match (topic, year, semester) {
            (Some(topic), Some(year), Some(semester)) => Ok(ClassKey::new(topic, year, semester)),
            _ => Err(GradingError::InvalidClassKey(s.to_string())),
        }
    }
}
