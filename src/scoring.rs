//! Scoring orchestration: a two-stage pipeline.
//!
//! Stage one is the local heuristic.  Stage two, the AI refiner, runs
//! only when the heuristic lands in the borderline band, the assist
//! cache has no verdict for the input, and today's usage ceiling has
//! room.  The result is tagged with the stage that produced it.
//!
//! Lock discipline: the scoring context is never held across the awaited
//! AI call.  The gate check happens under one lock acquisition, the
//! commit under a second, and the commit re-applies the day roll-over
//! and capacity check because both may have moved while the call was in
//! flight.

use crate::assist::{cache_key, AssistCache, CachedVerdict, UsageLimiter};
use crate::heuristic::{self, AnswerSet, Confidence, HeuristicScore, ThresholdBand};
use crate::llm::{AiVerdict, Refine};
use crate::{log_internal, log_warn};
use crate::profile::SuspicionResult;
use chrono::Utc;
use tokio::sync::RwLock;

/// Which stage of the pipeline produced the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreStage {
    Heuristic,
    AiRefined,
}

#[derive(Debug, Clone)]
pub struct FinalScore {
    pub score: u8,
    pub reasons: Vec<String>,
    pub confidence: Confidence,
    pub stage: ScoreStage,
    pub ai_consulted: bool,
}

impl FinalScore {
    fn from_heuristic(heuristic: HeuristicScore) -> Self {
        Self {
            score: heuristic.score,
            reasons: heuristic.reasons,
            confidence: heuristic.confidence,
            stage: ScoreStage::Heuristic,
            ai_consulted: false,
        }
    }

    /// The AI verdict takes precedence over the heuristic score; the
    /// heuristic's reasons are kept and the AI reasoning appended.
    fn refined(heuristic: HeuristicScore, verdict: AiVerdict) -> Self {
        let mut reasons = heuristic.reasons;
        reasons.push(format!("AI assessment: {}", verdict.reasoning));
        Self {
            score: verdict.score,
            reasons,
            confidence: heuristic.confidence,
            stage: ScoreStage::AiRefined,
            ai_consulted: true,
        }
    }
}

/// Access tier granted from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDecision {
    Devotee,
    Seeker,
    None,
}

impl RoleDecision {
    pub fn from_score(score: u8) -> Self {
        match score {
            8..=10 => RoleDecision::Devotee,
            5..=7 => RoleDecision::Seeker,
            _ => RoleDecision::None,
        }
    }
}

impl std::fmt::Display for RoleDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RoleDecision::Devotee => write!(f, "Devotee"),
            RoleDecision::Seeker => write!(f, "Seeker"),
            RoleDecision::None => write!(f, "no role"),
        }
    }
}

/// Shared scoring state: the assist cache and the daily usage counter.
/// Constructed once at startup and injected; tests build their own.
pub struct ScoringContext {
    pub cache: AssistCache,
    pub limiter: UsageLimiter,
}

enum EscalationGate {
    Cached(CachedVerdict),
    Permitted,
    Exhausted,
}

impl ScoringContext {
    pub fn new(cache_capacity: usize, daily_limit: u32) -> Self {
        Self {
            cache: AssistCache::new(cache_capacity),
            limiter: UsageLimiter::new(daily_limit, Utc::now().date_naive()),
        }
    }

    fn check_escalation(&mut self, key: &str) -> EscalationGate {
        if let Some(verdict) = self.cache.get(key) {
            return EscalationGate::Cached(verdict);
        }
        if self.limiter.would_allow(Utc::now().date_naive()) {
            EscalationGate::Permitted
        } else {
            EscalationGate::Exhausted
        }
    }

    fn commit_escalation(&mut self, key: String, verdict: &AiVerdict) {
        self.limiter.record_call(Utc::now().date_naive());
        self.cache.put(
            key,
            CachedVerdict {
                score: verdict.score,
                reasoning: verdict.reasoning.clone(),
            },
        );
    }
}

pub async fn score_verification(
    answers: &AnswerSet,
    suspicion: &SuspicionResult,
    band: ThresholdBand,
    scoring: &RwLock<ScoringContext>,
    refiner: Option<&dyn Refine>,
) -> FinalScore {
    let heuristic = heuristic::score_answers(answers, suspicion, band);
    if heuristic.confidence == Confidence::Clear {
        return FinalScore::from_heuristic(heuristic);
    }

    let Some(refiner) = refiner else {
        return FinalScore::from_heuristic(heuristic);
    };

    let key = cache_key(answers);
    {
        let mut ctx = scoring.write().await;
        match ctx.check_escalation(&key) {
            EscalationGate::Cached(cached) => {
                log_internal!("Reusing cached AI verdict for borderline answers");
                return FinalScore::refined(
                    heuristic,
                    AiVerdict {
                        score: cached.score,
                        reasoning: cached.reasoning,
                    },
                );
            }
            EscalationGate::Exhausted => {
                log_warn!("Daily AI ceiling reached, keeping heuristic score");
                return FinalScore::from_heuristic(heuristic);
            }
            EscalationGate::Permitted => {}
        }
    }

    // The lock is released for the duration of the call.
    match refiner.refine(answers, suspicion.score).await {
        Ok(verdict) => {
            let mut ctx = scoring.write().await;
            ctx.commit_escalation(key, &verdict);
            FinalScore::refined(heuristic, verdict)
        }
        Err(err) => {
            log_warn!("AI refinement failed ({}), keeping heuristic score", err);
            FinalScore::from_heuristic(heuristic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{VerifyError, VerifyResult};
    use crate::heuristic::Answer;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubRefiner {
        calls: AtomicU32,
        verdict: Option<AiVerdict>,
    }

    impl StubRefiner {
        fn returning(score: u8) -> Self {
            Self {
                calls: AtomicU32::new(0),
                verdict: Some(AiVerdict {
                    score,
                    reasoning: "stub".to_string(),
                }),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                verdict: None,
            }
        }
    }

    #[serenity::async_trait]
    impl Refine for StubRefiner {
        async fn refine(&self, _answers: &AnswerSet, _suspicion: u8) -> VerifyResult<AiVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
                .clone()
                .ok_or_else(|| VerifyError::ExternalService("stub failure".to_string()))
        }
    }

    fn band() -> ThresholdBand {
        ThresholdBand { low: 3, high: 8 }
    }

    fn suspicion() -> SuspicionResult {
        SuspicionResult {
            score: 0,
            reasons: Vec::new(),
        }
    }

    fn borderline_answers() -> AnswerSet {
        let mut set = AnswerSet::new();
        for i in 0..4 {
            set.push(Answer {
                question_id: format!("Q{i}"),
                question: format!("Question {i}?"),
                text: "ok".to_string(),
            });
        }
        set
    }

    fn clear_answers() -> AnswerSet {
        let mut set = AnswerSet::new();
        set.push(Answer {
            question_id: "E1".to_string(),
            question: "What brings you here?".to_string(),
            text: "I want to surrender to Krishna with humility and learn on this journey"
                .to_string(),
        });
        set
    }

    #[tokio::test]
    async fn clear_results_never_escalate() {
        let scoring = RwLock::new(ScoringContext::new(100, 1000));
        let refiner = StubRefiner::returning(2);
        let result = score_verification(
            &clear_answers(),
            &suspicion(),
            band(),
            &scoring,
            Some(&refiner as &dyn Refine),
        )
        .await;
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.stage, ScoreStage::Heuristic);
        assert!(!result.ai_consulted);
    }

    #[tokio::test]
    async fn borderline_results_use_the_refined_score() {
        let scoring = RwLock::new(ScoringContext::new(100, 1000));
        let refiner = StubRefiner::returning(9);
        let result = score_verification(
            &borderline_answers(),
            &suspicion(),
            band(),
            &scoring,
            Some(&refiner as &dyn Refine),
        )
        .await;
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.score, 9);
        assert_eq!(result.stage, ScoreStage::AiRefined);
        assert!(result.ai_consulted);
        assert_eq!(scoring.read().await.limiter.calls_today(), 1);
        assert_eq!(scoring.read().await.cache.len(), 1);
    }

    #[tokio::test]
    async fn identical_input_is_served_from_cache() {
        let scoring = RwLock::new(ScoringContext::new(100, 1000));
        let refiner = StubRefiner::returning(6);
        let answers = borderline_answers();

        let first =
            score_verification(&answers, &suspicion(), band(), &scoring, Some(&refiner as &dyn Refine)).await;
        let second =
            score_verification(&answers, &suspicion(), band(), &scoring, Some(&refiner as &dyn Refine)).await;

        assert_eq!(refiner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.score, second.score);
        assert!(second.ai_consulted);
        assert_eq!(scoring.read().await.limiter.calls_today(), 1);
    }

    #[tokio::test]
    async fn exhausted_ceiling_keeps_the_heuristic_score() {
        let scoring = RwLock::new(ScoringContext::new(100, 0));
        let refiner = StubRefiner::returning(9);
        let result = score_verification(
            &borderline_answers(),
            &suspicion(),
            band(),
            &scoring,
            Some(&refiner as &dyn Refine),
        )
        .await;
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.stage, ScoreStage::Heuristic);
    }

    #[tokio::test]
    async fn refiner_failure_degrades_to_heuristic() {
        let scoring = RwLock::new(ScoringContext::new(100, 1000));
        let refiner = StubRefiner::failing();
        let result = score_verification(
            &borderline_answers(),
            &suspicion(),
            band(),
            &scoring,
            Some(&refiner as &dyn Refine),
        )
        .await;
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.stage, ScoreStage::Heuristic);
        assert!(!result.ai_consulted);
        // A failed call neither counts against the ceiling nor caches.
        assert_eq!(scoring.read().await.limiter.calls_today(), 0);
        assert_eq!(scoring.read().await.cache.len(), 0);
    }

    #[tokio::test]
    async fn no_refiner_means_heuristic_only() {
        let scoring = RwLock::new(ScoringContext::new(100, 1000));
        let result =
            score_verification(&borderline_answers(), &suspicion(), band(), &scoring, None).await;
        assert_eq!(result.stage, ScoreStage::Heuristic);
    }

    #[test]
    fn role_thresholds() {
        assert_eq!(RoleDecision::from_score(9), RoleDecision::Devotee);
        assert_eq!(RoleDecision::from_score(8), RoleDecision::Devotee);
        assert_eq!(RoleDecision::from_score(7), RoleDecision::Seeker);
        assert_eq!(RoleDecision::from_score(6), RoleDecision::Seeker);
        assert_eq!(RoleDecision::from_score(5), RoleDecision::Seeker);
        assert_eq!(RoleDecision::from_score(4), RoleDecision::None);
        assert_eq!(RoleDecision::from_score(3), RoleDecision::None);
        assert_eq!(RoleDecision::from_score(0), RoleDecision::None);
    }
}
