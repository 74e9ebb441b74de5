//! Seams to the live form. Element discovery, visibility and click/type
//! primitives live behind [`FormDriver`]; the navigator never touches a page.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resolver::QuestionKind;

/// Actionable controls the navigator may probe for and activate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Next,
    Review,
    Submit,
    Dismiss,
    ConfirmDiscard,
}

/// One field on the current step as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Driver-owned handle used to apply a value back to the field.
    pub id: String,
    pub label: String,
    pub kind: QuestionKind,
    /// Current value; `None` or blank means unanswered.
    pub value: Option<String>,
    pub options: Vec<String>,
    pub visible: bool,
    pub required: bool,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            value: None,
            options: Vec::new(),
            visible: true,
            required: false,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Non-blank current value, if the field is already filled.
    pub fn current_value(&self) -> Option<&str> {
        self.value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// What the page says it is an application for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDetails {
    pub title: String,
    pub company: String,
    pub link: String,
}

pub trait FormDriver {
    /// Visible fields on the current step, with their current values.
    fn fields(&mut self) -> Result<Vec<FieldDescriptor>>;

    fn apply_value(&mut self, field: &FieldDescriptor, value: &str) -> Result<()>;

    fn has_control(&mut self, control: Control) -> Result<bool>;

    fn activate(&mut self, control: Control) -> Result<()>;

    /// True when the form shows an inline validation error.
    fn has_validation_error(&mut self) -> Result<bool>;

    fn job_details(&mut self) -> Result<JobDetails>;
}

/// Opens a driver positioned on the application form for a job link.
pub trait DriverFactory: Send + Sync {
    fn open(&self, job_url: &str) -> Result<Box<dyn FormDriver + Send>>;
}

/// Pause primitive so timed delays can be skipped under test.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
