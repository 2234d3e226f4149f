use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::CallError;
use crate::models::{Action, ClassificationResult, Intent, TranscriptEntry};
use crate::services::ai::{extract_json, LlmProvider, Message};

pub const REPEAT_PROMPT: &str = "I apologize, could you repeat that?";
const CLARIFY_PROMPT: &str = "Could you tell me what this is regarding?";

/// Turns the conversation so far into a spoken reply plus a routing decision.
/// Never fails: malformed model output degrades to `Continue`, keeping
/// `previous` (the call's intent so far) as the intent.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn classify(&self, history: &[TranscriptEntry], previous: Intent)
        -> ClassificationResult;
}

fn system_prompt(owner_name: &str) -> String {
    format!(
        r#"You answer phone calls on behalf of {owner_name}. Decide whether the caller is legitimate or spam, and keep the call short and polite.

Treat as spam: unsolicited sales (warranties, insurance, timeshares, solar), prize or lottery claims, urgent "account" or security threats, requests for sensitive data (SSN, card or bank details), scripted robocall language.
Treat as legitimate: a specific purpose (project, partnership, appointment, follow-up), named people or companies, a reasonable request for a callback.

How to respond:
- Unclear purpose: ask what the call is regarding.
- Spam: decline politely and end the call.
- Legitimate: say you will check {owner_name}'s calendar for a callback time.
- Caller accepts an offered time: confirm it and thank them.
- Keep replies under 25 words, natural and spoken, without repeating calendar details already given.

Return ONLY a JSON object (no markdown):
{{
  "response": "what you say to the caller",
  "intent": "spam|legitimate|unclear",
  "action": "continue|schedule|decline|confirm|end_call",
  "confidence": 0.0
}}

Use "schedule" when the caller should be offered callback times, "confirm" when the caller picks or accepts a time, "decline" for spam, and "end_call" when the conversation is over."#
    )
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
}

fn confidence_from(value: Option<&Value>) -> f32 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    raw.filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .unwrap_or(0.5)
}

/// Validates model output. Unknown or missing labels map to `Unclear` / `Continue`.
fn decode_classification(response: &str) -> Result<ClassificationResult, CallError> {
    let raw: RawClassification = extract_json(response)
        .ok_or_else(|| CallError::Parse("classifier output as JSON".to_string()))?;

    let response_text = raw
        .response
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| CLARIFY_PROMPT.to_string());

    Ok(ClassificationResult {
        response_text,
        intent: raw.intent.as_deref().map(Intent::parse).unwrap_or_default(),
        action: raw.action.as_deref().map(Action::parse).unwrap_or_default(),
        confidence: confidence_from(raw.confidence.as_ref()),
    })
}

pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, owner_name: &str) -> Self {
        Self {
            llm,
            system_prompt: system_prompt(owner_name),
        }
    }
}

#[async_trait]
impl ClassificationService for LlmClassifier {
    async fn classify(
        &self,
        history: &[TranscriptEntry],
        previous: Intent,
    ) -> ClassificationResult {
        let messages: Vec<Message> = history.iter().map(Message::from).collect();

        match self.llm.chat(&self.system_prompt, &messages, None).await {
            Ok(response) => decode_classification(&response).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "classifier returned non-JSON, speaking raw text");
                ClassificationResult::fallback(response.trim(), previous)
            }),
            Err(e) => {
                tracing::warn!(error = %e, "classifier call failed");
                ClassificationResult::fallback(REPEAT_PROMPT, previous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::Speaker;

    #[test]
    fn test_decode_valid_json() {
        let json = r#"{"response":"Let me check the calendar.","intent":"legitimate","action":"schedule","confidence":0.92}"#;
        let result = decode_classification(json).unwrap();
        assert_eq!(result.intent, Intent::Legitimate);
        assert_eq!(result.action, Action::Schedule);
        assert!((result.confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn test_decode_fenced_json() {
        let json = "```json\n{\"response\":\"Not interested, goodbye.\",\"intent\":\"spam\",\"action\":\"decline\",\"confidence\":\"0.8\"}\n```";
        let result = decode_classification(json).unwrap();
        assert_eq!(result.intent, Intent::Spam);
        assert_eq!(result.action, Action::Decline);
        assert!((result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_unknown_labels_use_safe_defaults() {
        let json = r#"{"response":"Hmm.","intent":"telemarketer","action":"transfer","confidence":7}"#;
        let result = decode_classification(json).unwrap();
        assert_eq!(result.intent, Intent::Unclear);
        assert_eq!(result.action, Action::Continue);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_decode_missing_fields() {
        let result = decode_classification("{}").unwrap();
        assert_eq!(result.response_text, CLARIFY_PROMPT);
        assert_eq!(result.intent, Intent::Unclear);
        assert_eq!(result.action, Action::Continue);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_decode_prose_is_parse_error() {
        let err = decode_classification("Sure, I can help with that").unwrap_err();
        assert!(matches!(err, CallError::Parse(_)));
    }

    struct ScriptedLlm(Vec<anyhow::Result<String>>, Mutex<usize>);

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn chat(
            &self,
            _system_prompt: &str,
            messages: &[Message],
            _temperature: Option<f32>,
        ) -> anyhow::Result<String> {
            assert_eq!(messages.last().map(|m| m.role.as_str()), Some("user"));
            let mut i = self.1.lock().unwrap();
            let out = match &self.0[*i] {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            };
            *i += 1;
            out
        }
    }

    fn caller(text: &str) -> Vec<TranscriptEntry> {
        vec![TranscriptEntry {
            speaker: Speaker::Caller,
            text: text.to_string(),
        }]
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_intent() {
        let llm = ScriptedLlm(
            vec![
                Ok(r#"{"response":"No thanks.","intent":"spam","action":"continue","confidence":0.7}"#.into()),
                Err(anyhow::anyhow!("timeout")),
                Ok("plain words".into()),
            ],
            Mutex::new(0),
        );
        let classifier = LlmClassifier::new(Arc::new(llm), "Sam");

        let first = classifier
            .classify(&caller("car warranty"), Intent::Unclear)
            .await;
        assert_eq!(first.intent, Intent::Spam);

        let second = classifier.classify(&caller("hello?"), first.intent).await;
        assert_eq!(second.response_text, REPEAT_PROMPT);
        assert_eq!(second.intent, Intent::Spam);
        assert_eq!(second.action, Action::Continue);
        assert_eq!(second.confidence, 0.5);

        let third = classifier
            .classify(&caller("hello?"), Intent::Legitimate)
            .await;
        assert_eq!(third.response_text, "plain words");
        assert_eq!(third.intent, Intent::Legitimate);
        assert_eq!(third.action, Action::Continue);
    }

    #[tokio::test]
    async fn test_failure_does_not_leak_between_calls() {
        let llm = ScriptedLlm(
            vec![
                Ok(r#"{"response":"Goodbye.","intent":"spam","action":"decline","confidence":0.9}"#.into()),
                Err(anyhow::anyhow!("timeout")),
            ],
            Mutex::new(0),
        );
        let classifier = LlmClassifier::new(Arc::new(llm), "Sam");

        let spam = classifier
            .classify(&caller("extended warranty"), Intent::Unclear)
            .await;
        assert_eq!(spam.intent, Intent::Spam);

        // A fresh call starts from its own session intent
        let next = classifier.classify(&caller("hi"), Intent::Unclear).await;
        assert_eq!(next.response_text, REPEAT_PROMPT);
        assert_eq!(next.intent, Intent::Unclear);
    }
}
