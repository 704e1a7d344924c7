use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown subject: {0}")]
pub struct SubjectError(pub String);

/// School subject a topic, quota and ability score belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Math,
    Chinese,
    English,
    Science,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::Math,
        Subject::Chinese,
        Subject::English,
        Subject::Science,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Chinese => "chinese",
            Subject::English => "english",
            Subject::Science => "science",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "math" | "maths" | "mathematics" => Ok(Subject::Math),
            "chinese" => Ok(Subject::Chinese),
            "english" => Ok(Subject::English),
            "science" => Ok(Subject::Science),
            other => Err(SubjectError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("Maths".parse::<Subject>().unwrap(), Subject::Math);
        assert_eq!(" english ".parse::<Subject>().unwrap(), Subject::English);
        assert!("history".parse::<Subject>().is_err());
    }

    #[test]
    fn round_trips_through_as_str() {
        for subject in Subject::ALL {
            assert_eq!(subject.as_str().parse::<Subject>().unwrap(), subject);
        }
    }
}
