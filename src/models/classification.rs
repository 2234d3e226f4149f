use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Spam,
    Legitimate,
    #[default]
    Unclear,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Spam => "spam",
            Intent::Legitimate => "legitimate",
            Intent::Unclear => "unclear",
        }
    }

    /// Anything the model invents beyond the three known labels is unclear.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "spam" | "scam" => Intent::Spam,
            "legitimate" | "legit" => Intent::Legitimate,
            _ => Intent::Unclear,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Continue,
    Schedule,
    Decline,
    Confirm,
    EndCall,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Continue => "continue",
            Action::Schedule => "schedule",
            Action::Decline => "decline",
            Action::Confirm => "confirm",
            Action::EndCall => "end_call",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "schedule" => Action::Schedule,
            "decline" => Action::Decline,
            "confirm" => Action::Confirm,
            "end_call" | "end" => Action::EndCall,
            _ => Action::Continue,
        }
    }
}

/// One classified caller turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub response_text: String,
    pub intent: Intent,
    pub action: Action,
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn fallback(response_text: impl Into<String>, intent: Intent) -> Self {
        Self {
            response_text: response_text.into(),
            intent,
            action: Action::Continue,
            confidence: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_labels_fall_back() {
        assert_eq!(Intent::parse("robocall"), Intent::Unclear);
        assert_eq!(Intent::parse(" SPAM "), Intent::Spam);
        assert_eq!(Action::parse("hang_up"), Action::Continue);
        assert_eq!(Action::parse("end-call"), Action::EndCall);
        assert_eq!(Action::parse("Schedule"), Action::Schedule);
    }
}
