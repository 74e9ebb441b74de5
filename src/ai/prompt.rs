//! Prompt construction and response sanitising for AI backends.

use crate::profiles::Profile;
use crate::resolver::{Question, QuestionKind};

/// Truncates to at most `budget` characters without splitting a code point.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Prompt asking the backend to answer one form question for the profile.
pub fn build_answer_prompt(question: &Question, profile: &Profile, profile_budget: usize) -> String {
    let serialized = serde_json::to_string_pretty(&PromptProfile::from(profile))
        .unwrap_or_default();
    let profile_text = truncate_chars(&serialized, profile_budget);

    let mut context = String::new();
    if !question.options.is_empty() {
        let options = serde_json::to_string(&question.options).unwrap_or_default();
        context.push_str(&format!(
            "This is a multiple choice/dropdown question. Available options: {options}. Pick the best one.\n"
        ));
    }
    match question.kind {
        QuestionKind::Number => {
            context.push_str("The answer MUST be a single number (integer).\n");
        }
        QuestionKind::Boolean => {
            context.push_str("The answer must be \"Yes\" or \"No\".\n");
        }
        _ => {}
    }

    format!(
        "You are an assistant applying for a job on my behalf.\n\
I need you to answer the following application form question based on my profile.\n\n\
QUESTION: \"{question}\"\n\n\
CONTEXT:\n{context}\n\
MY PROFILE:\n{profile_text}\n\n\
INSTRUCTIONS:\n\
- Answer ONLY the question. Do not explain.\n\
- If it's a number field, return JUST the number.\n\
- If it's yes/no, return JUST \"Yes\" or \"No\".\n\
- If selecting an option, return the exact text of the option.\n\
- If you don't know, make a best professional guess based on the profile.\n",
        question = question.text,
    )
}

/// Prompt asking the backend to emit only a structured profile record.
pub fn build_extraction_prompt(resume_text: &str, resume_budget: usize) -> String {
    let resume = truncate_chars(resume_text.trim(), resume_budget);
    format!(
        "You are a data extraction assistant for job applications.\n\
Extract profile information from this resume.\n\n\
RESUME:\n{resume}\n\n\
INSTRUCTIONS:\n\
- Return ONLY valid JSON.\n\
- No markdown code blocks.\n\
- Extract: firstName, lastName, email, phone, linkedin, github, website, city, state, country, \
currentCompany, yearsExperience (int), experience (map of tech->years), workAuthorization, \
sponsorship, willingToRelocate.\n\
- Example JSON structure:\n\
{{\n  \"firstName\": \"Mark\", \"lastName\": \"Smith\", \"email\": \"mark@test.com\", \"phone\": \"123-456-7890\",\n  \
\"linkedin\": \"...\", \"github\": \"...\", \"city\": \"NY\", \"state\": \"NY\", \"country\": \"USA\",\n  \
\"currentCompany\": \"StartUp\", \"yearsExperience\": 5,\n  \
\"experience\": {{ \"React\": 5, \"Node\": 3 }},\n  \
\"workAuthorization\": \"US Citizen\", \"sponsorship\": \"No\", \"willingToRelocate\": \"Yes\"\n}}\n"
    )
}

/// Strips code fences and slices from the first `{` to the last `}`.
pub fn sanitize_structured_output(raw: &str) -> String {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => cleaned[start..=end].to_string(),
        _ => cleaned.to_string(),
    }
}

/// Profile view sent to the backend. The learned-answer cache is included
/// so earlier answers inform new ones; bookkeeping fields are not.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptProfile<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    phone: &'a str,
    linkedin: &'a str,
    github: &'a str,
    website: &'a str,
    city: &'a str,
    state: &'a str,
    country: &'a str,
    current_company: &'a str,
    years_experience: u32,
    experience: &'a std::collections::BTreeMap<String, u32>,
    work_authorization: &'a str,
    sponsorship: &'a str,
    willing_to_relocate: &'a str,
    question_cache: &'a std::collections::BTreeMap<String, String>,
}

impl<'a> From<&'a Profile> for PromptProfile<'a> {
    fn from(p: &'a Profile) -> Self {
        Self {
            first_name: &p.first_name,
            last_name: &p.last_name,
            email: &p.email,
            phone: &p.phone,
            linkedin: &p.linkedin,
            github: &p.github,
            website: &p.website,
            city: &p.city,
            state: &p.state,
            country: &p.country,
            current_company: &p.current_company,
            years_experience: p.years_experience,
            experience: &p.experience,
            work_authorization: &p.work_authorization,
            sponsorship: &p.sponsorship,
            willing_to_relocate: &p.willing_to_relocate,
            question_cache: &p.question_cache,
        }
    }
}
