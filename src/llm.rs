use crate::config;
use crate::error::{VerifyError, VerifyResult};
use crate::heuristic::AnswerSet;
use crate::{log_internal, log_warn};

/// Persona the completion endpoint scores with.  The reply format at the
/// bottom is what `parse_verdict` understands.
const PERSONA: &str = "\
You are a spiritually serious, Krishna-conscious gatekeeper for a sacred \
community following Srila Prabhupada's teachings. Assess the member's \
answers for sincerity, humility, and devotional mood. Be strict against \
impersonalism, pride, and mockery; be encouraging toward sincere seekers. \
Ignore grammar and spelling unless deliberately careless.

Scoring guide: strong humility and surrender +3; emotional connection to \
Krishna +2; respect for devotees and guru +2; honest confusion with a wish \
to learn +1; vague answers 0; cold or proud tone -1; clearly stated \
impersonalism -3; spiritual superiority -3; mocking or trolling -5.

Reply in exactly this format:
SCORE: <0-10>
REASONING: <2-4 lines>";

/// What the refiner returns: the refined score plus its reasoning line.
#[derive(Debug, Clone)]
pub struct AiVerdict {
    pub score: u8,
    pub reasoning: String,
}

/// A scoring stage that can refine a borderline heuristic result.
/// Production code uses [`AiClient`]; tests substitute stubs.
#[serenity::async_trait]
pub trait Refine: Send + Sync {
    async fn refine(&self, answers: &AnswerSet, suspicion: u8) -> VerifyResult<AiVerdict>;
}

#[derive(serde::Serialize)]
struct CompletionRequest {
    /// LLM model name
    model: String,
    /// System prompt
    system: String,
    /// Whether to stream one token at a time, or return entire response in one go
    stream: bool,
    /// Text for the model to respond to
    prompt: String,
    /// LLM temperature
    temperature: f32,
}

#[derive(serde::Deserialize)]
struct CompletionResponse {
    response: String,
}

/// Completion-endpoint wrapper with primary/backup credential failover.
pub struct AiClient {
    completion_url: String,
    model_name: String,
    api_key: String,
    backup_api_key: Option<String>,
    temperature: f32,
}

impl AiClient {
    /// `None` when no primary credential is configured; the orchestrator
    /// then never escalates.
    pub fn from_config(ai: &config::Ai) -> Option<Self> {
        let api_key = ai.api_key.clone()?;
        Some(Self {
            completion_url: ai.completion_url.clone(),
            model_name: ai.model_name.clone(),
            api_key,
            backup_api_key: ai.backup_api_key.clone(),
            temperature: ai.temperature,
        })
    }

    fn build_prompt(answers: &AnswerSet, suspicion: u8) -> String {
        let mut prompt = format!(
            "This member joined with a profile suspicion score of {}/4.\n\
             === MEMBER VERIFICATION ANSWERS ===\n",
            suspicion
        );
        for (i, answer) in answers.answers().iter().enumerate() {
            prompt.push_str(&format!(
                "[QUESTION {}]\nQ: {}\nA: {}\n",
                i + 1,
                answer.question,
                answer.text
            ));
        }
        prompt.push_str("=== END ANSWERS ===\n");
        prompt
    }

    async fn post(&self, prompt: &str, api_key: &str) -> VerifyResult<AiVerdict> {
        let request = CompletionRequest {
            model: self.model_name.clone(),
            system: PERSONA.to_string(),
            stream: false,
            prompt: prompt.to_string(),
            temperature: self.temperature,
        };

        let client = reqwest::Client::new();
        let response = client
            .post(&self.completion_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VerifyError::ExternalService(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| VerifyError::ExternalService(format!("endpoint rejected request: {e}")))?
            .json::<CompletionResponse>()
            .await
            .map_err(|e| VerifyError::ExternalService(format!("malformed response body: {e}")))?;

        parse_verdict(&response.response)
    }
}

#[serenity::async_trait]
impl Refine for AiClient {
    async fn refine(&self, answers: &AnswerSet, suspicion: u8) -> VerifyResult<AiVerdict> {
        let prompt = Self::build_prompt(answers, suspicion);

        log_internal!("Sending refinement request to {}... ", self.completion_url);
        let primary = self.post(&prompt, &self.api_key).await;
        let verdict = match (primary, &self.backup_api_key) {
            (Ok(verdict), _) => Ok(verdict),
            (Err(err), Some(backup)) => {
                log_warn!("Primary AI credential failed ({}), retrying with backup", err);
                self.post(&prompt, backup).await
            }
            (Err(err), None) => Err(err),
        }?;
        log_internal!(
            "Sending refinement request to {}... done",
            self.completion_url
        );

        Ok(verdict)
    }
}

/// Pull `SCORE:` and `REASONING:` out of a model reply.  A missing or
/// non-numeric score is an error so the caller can fall back to the
/// heuristic result.
fn parse_verdict(reply: &str) -> VerifyResult<AiVerdict> {
    let mut score = None;
    let mut reasoning = Vec::new();
    let mut in_reasoning = false;

    for line in reply.lines() {
        let trimmed = line.trim();
        if let Some(rest) = strip_label(trimmed, "SCORE:") {
            let digits: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            score = digits.parse::<u8>().ok();
            in_reasoning = false;
        } else if let Some(rest) = strip_label(trimmed, "REASONING:")
            .or_else(|| strip_label(trimmed, "REASON:"))
        {
            if !rest.is_empty() {
                reasoning.push(rest.to_string());
            }
            in_reasoning = true;
        } else if in_reasoning && !trimmed.is_empty() {
            reasoning.push(trimmed.to_string());
        }
    }

    let score = score
        .ok_or_else(|| VerifyError::ExternalService("reply contained no score".to_string()))?;
    Ok(AiVerdict {
        score: score.min(10),
        reasoning: if reasoning.is_empty() {
            "no reasoning provided".to_string()
        } else {
            reasoning.join(" ")
        },
    })
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reply() {
        let verdict = parse_verdict(
            "SCORE: 7\nREASONING: Respectful and open-hearted,\nbut needs guidance.",
        )
        .unwrap();
        assert_eq!(verdict.score, 7);
        assert!(verdict.reasoning.contains("needs guidance"));
    }

    #[test]
    fn clamps_out_of_range_scores() {
        let verdict = parse_verdict("score: 15\nreason: enthusiastic").unwrap();
        assert_eq!(verdict.score, 10);
    }

    #[test]
    fn score_with_trailing_text_still_parses() {
        let verdict = parse_verdict("SCORE: 8/10\nREASONING: sincere").unwrap();
        assert_eq!(verdict.score, 8);
    }

    #[test]
    fn missing_score_is_an_error() {
        assert!(parse_verdict("the member seems nice").is_err());
        assert!(parse_verdict("SCORE: high\nREASONING: vibes").is_err());
    }

    #[test]
    fn client_requires_a_primary_credential() {
        let ai = config::Ai::default();
        assert!(AiClient::from_config(&ai).is_none());

        let configured = config::Ai {
            api_key: Some("key".to_string()),
            ..config::Ai::default()
        };
        assert!(AiClient::from_config(&configured).is_some());
    }
}
