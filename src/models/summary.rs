use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::Intent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub caller_intent: String,
    pub classification: Intent,
    pub outcome: String,
    pub scheduled_callback: Option<NaiveDateTime>,
    pub key_details: String,
    pub confidence_score: f32,
}

impl CallSummary {
    pub fn unavailable() -> Self {
        Self {
            caller_intent: "Unknown".to_string(),
            classification: Intent::Unclear,
            outcome: "error generating summary".to_string(),
            scheduled_callback: None,
            key_details: String::new(),
            confidence_score: 0.0,
        }
    }
}

impl fmt::Display for CallSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheduled = self
            .scheduled_callback
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "None".to_string());
        writeln!(f, "Caller Intent:  {}", self.caller_intent)?;
        writeln!(f, "Classification: {}", self.classification.as_str())?;
        writeln!(f, "Outcome:        {}", self.outcome)?;
        writeln!(f, "Scheduled:      {scheduled}")?;
        writeln!(f, "Key Details:    {}", self.key_details)?;
        write!(f, "Confidence:     {:.2}", self.confidence_score)
    }
}
