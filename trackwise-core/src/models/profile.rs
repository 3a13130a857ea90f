use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    PreferNotToSay,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::PreferNotToSay => "prefer_not_to_say",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            "prefer_not_to_say" => Ok(Sex::PreferNotToSay),
            other => Err(format!(
                "unknown sex '{}': expected male, female or prefer_not_to_say",
                other
            )),
        }
    }
}

/// Optional details the user shares before chatting.
///
/// Blank values are never stored: every setter trims its input and keeps
/// `None` for empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl AsRef<str>) -> Self {
        self.name = non_blank(name.as_ref());
        self
    }

    pub fn with_age(mut self, age: Option<u32>) -> Self {
        self.age = age;
        self
    }

    pub fn with_sex(mut self, sex: Option<Sex>) -> Self {
        self.sex = sex;
        self
    }

    pub fn with_conditions(mut self, conditions: impl AsRef<str>) -> Self {
        self.conditions = non_blank(conditions.as_ref());
        self
    }

    /// Sex worth mentioning to the model; the opt-out value is dropped.
    pub fn disclosed_sex(&self) -> Option<Sex> {
        self.sex.filter(|s| *s != Sex::PreferNotToSay)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.sex.is_none() && self.conditions.is_none()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
