//! Applicant profile record and learned-answer cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// One applicant persona: identity, experience and the learned-answer cache.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub profile_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub current_company: String,
    #[serde(default)]
    pub years_experience: u32,
    /// Technology name → years.
    #[serde(default)]
    pub experience: BTreeMap<String, u32>,
    #[serde(default)]
    pub work_authorization: String,
    #[serde(default)]
    pub sponsorship: String,
    #[serde(default)]
    pub willing_to_relocate: String,
    /// Login email supplied alongside a resume, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
    /// Question key → answer. Entries are only ever added or replaced.
    #[serde(default)]
    pub question_cache: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let now = Utc::now();
        let first_name = first_name.into();
        let last_name = last_name.into();
        Self {
            id: Uuid::new_v4().to_string(),
            profile_name: display_name(&first_name, &last_name),
            first_name,
            last_name,
            created_at: Some(now),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    /// Builds a profile from a structured extraction record.
    ///
    /// Year counts may arrive as integers, floats or numeric strings; anything
    /// else is dropped rather than failing the whole record.
    pub fn from_extracted(record: &Value) -> Self {
        let text = |key: &str| -> String {
            match record.get(key) {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(true)) => "Yes".to_string(),
                Some(Value::Bool(false)) => "No".to_string(),
                _ => String::new(),
            }
        };
        let mut profile = Profile::new(text("firstName"), text("lastName"));
        profile.email = text("email");
        profile.phone = text("phone");
        profile.linkedin = text("linkedin");
        profile.github = text("github");
        profile.website = text("website");
        profile.city = text("city");
        profile.state = text("state");
        profile.country = text("country");
        profile.current_company = text("currentCompany");
        profile.years_experience = record
            .get("yearsExperience")
            .and_then(lenient_years)
            .unwrap_or(0);
        if let Some(Value::Object(map)) = record.get("experience") {
            for (tech, years) in map {
                if let Some(years) = lenient_years(years) {
                    profile.experience.insert(tech.trim().to_string(), years);
                }
            }
        }
        profile.work_authorization = text("workAuthorization");
        profile.sponsorship = text("sponsorship");
        profile.willing_to_relocate = text("willingToRelocate");
        profile
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    pub fn display_name(&self) -> String {
        if !self.profile_name.trim().is_empty() {
            return self.profile_name.clone();
        }
        display_name(&self.first_name, &self.last_name)
    }
}

fn display_name(first: &str, last: &str) -> String {
    let joined = format!("{} {}", first.trim(), last.trim());
    let joined = joined.trim();
    if joined.is_empty() {
        "Unnamed profile".to_string()
    } else {
        joined.to_string()
    }
}

fn lenient_years(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|v| u32::try_from(v).ok())
            .unwrap_or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f.round() as u32)
            }),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Lookup key for the question cache: trimmed and lower-cased.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Key under which a learned answer is written.
///
/// Learned answers keep the raw question text unless the install opted
/// into normalized keys, so a later lookup of a differently-cased phrasing
/// can miss them.
pub fn learned_cache_key(question: &str, normalize: bool) -> String {
    if normalize {
        normalize_question(question)
    } else {
        question.to_string()
    }
}
