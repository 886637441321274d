//! Template types and error definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{Channel, RenderedMessage};

use super::substitution::{render_str, substitute_variables};

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Variable substitution failed: {0}")]
    SubstitutionFailed(String),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A message template for one (scope, type code, channel, locale)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,

    /// Owning merchant; `None` marks a global default
    pub merchant_id: Option<Uuid>,

    /// Notification type this template renders (e.g. `reminder_24h`)
    pub type_code: String,

    pub channel: Channel,

    pub locale: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Body with `{{variable}}` placeholders
    pub body: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,

    /// JSON array of button objects; string values may hold placeholders
    #[serde(default = "empty_buttons")]
    pub buttons: serde_json::Value,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn empty_buttons() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

fn default_active() -> bool {
    true
}

impl Template {
    /// Create an active template with only a body
    pub fn new(
        merchant_id: Option<Uuid>,
        type_code: impl Into<String>,
        channel: Channel,
        locale: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            type_code: type_code.into(),
            channel,
            locale: locale.into(),
            subject: None,
            title: None,
            body: body.into(),
            html_body: None,
            buttons: empty_buttons(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_html_body(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }

    pub fn with_buttons(mut self, buttons: serde_json::Value) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Validate the template
    pub fn validate(&self) -> TemplateResult<()> {
        if self.type_code.is_empty() || self.type_code.len() > 64 {
            return Err(TemplateError::InvalidTemplate(
                "Type code must be 1-64 characters".to_string(),
            ));
        }

        if self.locale.is_empty() || self.locale.len() > 16 {
            return Err(TemplateError::InvalidTemplate(
                "Locale must be 1-16 characters".to_string(),
            ));
        }

        if self.body.is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "Body must not be empty".to_string(),
            ));
        }

        if !self.buttons.is_array() {
            return Err(TemplateError::InvalidTemplate(
                "Buttons must be a JSON array".to_string(),
            ));
        }

        Ok(())
    }

    /// Render every text part of the template with the given variables
    pub fn render(&self, variables: &serde_json::Value) -> TemplateResult<RenderedMessage> {
        let vars = variables.as_object().ok_or_else(|| {
            TemplateError::SubstitutionFailed("Variables must be an object".to_string())
        })?;

        Ok(RenderedMessage {
            subject: self.subject.as_deref().map(|s| render_str(s, vars)),
            title: self.title.as_deref().map(|s| render_str(s, vars)),
            body: render_str(&self.body, vars),
            html_body: self.html_body.as_deref().map(|s| render_str(s, vars)),
            buttons: substitute_variables(&self.buttons, variables)?,
        })
    }
}
