//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Tutorial language category (mirrors Postgres enum `post_language`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "post_language", rename_all = "lowercase")]
pub enum Language {
    #[serde(rename = "HTML")]
    Html,
    #[serde(rename = "CSS")]
    Css,
    #[serde(rename = "JavaScript")]
    JavaScript,
    #[serde(rename = "TypeScript")]
    TypeScript,
    #[serde(rename = "React")]
    React,
    #[serde(rename = "Node.js")]
    NodeJs,
    #[serde(rename = "Python")]
    Python,
    #[serde(rename = "Java")]
    Java,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C++")]
    Cpp,
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "Git")]
    Git,
}

impl Language {
    pub const ALL: [Language; 12] = [
        Language::Html,
        Language::Css,
        Language::JavaScript,
        Language::TypeScript,
        Language::React,
        Language::NodeJs,
        Language::Python,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::Sql,
        Language::Git,
    ];

    /// Display name used in the JSON contract.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::React => "React",
            Language::NodeJs => "Node.js",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Sql => "SQL",
            Language::Git => "Git",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim().to_ascii_lowercase();
        let alias = match needle.as_str() {
            "js" => Some(Language::JavaScript),
            "ts" => Some(Language::TypeScript),
            "node" | "nodejs" => Some(Language::NodeJs),
            "cpp" | "cplusplus" => Some(Language::Cpp),
            _ => None,
        };
        if let Some(language) = alias {
            return Ok(language);
        }

        Language::ALL
            .into_iter()
            .find(|language| language.as_str().to_ascii_lowercase() == needle)
            .ok_or_else(|| {
                DomainError::validation(format!("unknown language `{}`", value.trim()))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_difficulty", rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl FromStr for Difficulty {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(DomainError::validation(format!(
                "unknown difficulty `{other}`"
            ))),
        }
    }
}

/// Direction of a like mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    pub fn delta(self) -> i64 {
        match self {
            LikeAction::Like => 1,
            LikeAction::Unlike => -1,
        }
    }
}

impl FromStr for LikeAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "like" => Ok(LikeAction::Like),
            "unlike" => Ok(LikeAction::Unlike),
            other => Err(DomainError::validation(format!(
                "action must be `like` or `unlike`, got `{other}`"
            ))),
        }
    }
}
