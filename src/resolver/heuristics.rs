//! Profile-backed answers that need no cache, AI or operator.
//!
//! Questions are matched on their normalized text. Field keywords must start
//! at a word boundary so "ethnicity" never reads as "city"; technology keys
//! match anywhere, so "reactjs" still counts as React.

use crate::profiles::Profile;

use super::AnswerSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectField {
    FirstName,
    LastName,
    Email,
    Phone,
    City,
    Linkedin,
    Github,
    Website,
}

impl DirectField {
    fn value<'p>(&self, profile: &'p Profile) -> &'p str {
        match self {
            DirectField::FirstName => &profile.first_name,
            DirectField::LastName => &profile.last_name,
            DirectField::Email => &profile.email,
            DirectField::Phone => &profile.phone,
            DirectField::City => &profile.city,
            DirectField::Linkedin => &profile.linkedin,
            DirectField::Github => &profile.github,
            DirectField::Website => &profile.website,
        }
    }
}

/// Checked in order; the first keyword hit with a non-empty profile value wins.
const DIRECT_FIELDS: &[(DirectField, &[&str])] = &[
    (DirectField::FirstName, &["first name", "given name"]),
    (DirectField::LastName, &["last name", "surname", "family name"]),
    (DirectField::Email, &["email", "e-mail"]),
    (DirectField::Phone, &["phone", "mobile"]),
    (DirectField::City, &["city"]),
    (DirectField::Linkedin, &["linkedin"]),
    (DirectField::Github, &["github"]),
    (DirectField::Website, &["website", "portfolio"]),
];

/// Runs the direct-field, experience and authorization layers in order.
pub fn lookup(normalized: &str, profile: &Profile) -> Option<(String, AnswerSource)> {
    if let Some(value) = direct_field(normalized, profile) {
        return Some((value, AnswerSource::ProfileField));
    }
    if let Some(years) = experience_years(normalized, profile) {
        return Some((years, AnswerSource::Heuristic));
    }
    authorization(normalized, profile).map(|answer| (answer, AnswerSource::Heuristic))
}

fn direct_field(normalized: &str, profile: &Profile) -> Option<String> {
    DIRECT_FIELDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| contains_stem(normalized, k)))
        .map(|(field, _)| field.value(profile).trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Years for the longest experience key named in a "years"/"experience" question.
fn experience_years(normalized: &str, profile: &Profile) -> Option<String> {
    if !contains_stem(normalized, "year") && !contains_stem(normalized, "experience") {
        return None;
    }
    profile
        .experience
        .iter()
        .filter(|(tech, _)| {
            let tech = tech.trim().to_lowercase();
            !tech.is_empty() && normalized.contains(&tech)
        })
        .max_by_key(|(tech, _)| tech.trim().len())
        .map(|(_, years)| years.to_string())
}

fn authorization(normalized: &str, profile: &Profile) -> Option<String> {
    if contains_stem(normalized, "sponsor") && contains_stem(normalized, "require") {
        return Some(or_default(&profile.sponsorship, "No"));
    }
    if contains_stem(normalized, "authoriz") || contains_stem(normalized, "legal") {
        return Some(or_default(&profile.work_authorization, "Yes"));
    }
    if contains_stem(normalized, "relocat") {
        return Some(or_default(&profile.willing_to_relocate, "Yes"));
    }
    None
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}

/// `needle` occurs starting at a word boundary.
fn contains_stem(haystack: &str, needle: &str) -> bool {
    match_positions(haystack, needle).any(|start| boundary_before(haystack, start))
}

fn match_positions<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack.match_indices(needle).map(|(start, _)| start)
}

fn boundary_before(haystack: &str, start: usize) -> bool {
    haystack[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}
