//! Rule-based scoring of verification answers.
//!
//! Every weight lives in the tables below so moderators can retune the
//! heuristic without touching the scoring pass itself.  The scorer is a
//! pure function over an [`AnswerSet`]; the AI refiner in `scoring` only
//! runs when the result lands in the borderline band.

use crate::profile::SuspicionResult;

/// One answered question, in the order it was asked.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question_id: String,
    pub question: String,
    pub text: String,
}

/// Ordered answers for one verification session.  Discarded after scoring.
#[derive(Debug, Clone, Default)]
pub struct AnswerSet {
    answers: Vec<Answer>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, answer: Answer) {
        self.answers.push(answer);
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Stable normalized representation, used for cache-key derivation.
    /// Two sets differing only in formatting produce the same string.
    pub fn normalized_concat(&self) -> String {
        let mut joined = String::new();
        for answer in &self.answers {
            joined.push_str(&answer.question_id);
            joined.push('\x1f');
            joined.push_str(&normalize_text(&answer.text));
            joined.push('\x1e');
        }
        joined
    }
}

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Phrase table with a bounded per-category delta.  A category fires at
/// most once per answer set regardless of how many phrases match.
struct Category {
    reason: &'static str,
    weight: i32,
    phrases: &'static [&'static str],
}

const CATEGORIES: &[Category] = &[
    Category {
        reason: "devotional language present",
        weight: 2,
        phrases: &[
            "krishna", "devotion", "devotee", "service", "chanting", "prayer", "temple",
            "bhakti", "surrender", "prabhupada",
        ],
    },
    Category {
        reason: "humility markers present",
        weight: 2,
        phrases: &[
            "learn", "don't know", "dont know", "want to understand", "feel peace", "inspired",
            "humble", "humility", "mercy", "guidance", "unqualified",
        ],
    },
    Category {
        reason: "genuine seeking language",
        weight: 1,
        phrases: &["spiritual", "seek", "connection", "divine", "peace", "grow", "journey"],
    },
    Category {
        reason: "argumentative or testing tone",
        weight: -1,
        phrases: &[
            "prove it", "why would anyone believe", "is krishna real though",
            "don't you think this is", "here to argue", "debate me",
        ],
    },
    Category {
        reason: "spiritual pride",
        weight: -1,
        phrases: &[
            "i am already spiritual", "i don't need", "i am enlightened",
            "transcended religion", "i teach others",
        ],
    },
    Category {
        reason: "impersonalist views",
        weight: -2,
        phrases: &[
            "all gods same", "we are all god", "i am god", "all paths equal",
            "we are all krishna", "one consciousness",
        ],
    },
    Category {
        reason: "mockery or offense",
        weight: -3,
        phrases: &["cult", "fake", "nonsense", "stupid", "bullshit", "cringe", "mythology"],
    },
];

/// Markers of vulnerability; only rewarded when paired with intent to grow.
const VULNERABLE_PHRASES: &[&str] = &["lost", "confused", "hurt", "struggling", "difficult"];
const HOPEFUL_PHRASES: &[&str] = &["want", "hope", "help", "learn"];

/// Stock phrases that signal a template answer rather than a personal one.
const GENERIC_PHRASES: &[&str] = &[
    "i want to learn more",
    "i am interested",
    "tell me more",
    "i would like to know",
    "please explain",
];

const BASE_SCORE: i32 = 5;
const VERY_SHORT_LEN: usize = 5;
const GENERIC_MAX_LEN: usize = 30;
const COPY_PASTE_PENALTY: i32 = -5;
const LOW_EFFORT_PENALTY: i32 = -1;
const VULNERABLE_BONUS: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Clear,
    Borderline,
}

/// Scores inside the open interval `(low, high)` are borderline.  The
/// lower bound shrinks with suspicion: the less we trust the profile,
/// the fewer low scores we accept without a second opinion.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdBand {
    pub low: u8,
    pub high: u8,
}

impl ThresholdBand {
    pub fn classify(&self, score: u8, suspicion: u8) -> Confidence {
        let low = self.low.saturating_sub(suspicion);
        if score <= low || score >= self.high {
            Confidence::Clear
        } else {
            Confidence::Borderline
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicScore {
    pub score: u8,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
}

pub fn score_answers(
    answers: &AnswerSet,
    suspicion: &SuspicionResult,
    band: ThresholdBand,
) -> HeuristicScore {
    let normalized: Vec<String> = answers
        .answers()
        .iter()
        .map(|a| normalize_text(&a.text))
        .collect();

    let mut points = BASE_SCORE;
    let mut reasons = Vec::new();

    for category in CATEGORIES {
        let fired = normalized
            .iter()
            .any(|text| contains_any(text, category.phrases));
        if fired {
            points += category.weight;
            reasons.push(category.reason.to_string());
        }
    }

    // Vulnerability is never penalized; it counts for the set when the
    // same answer also shows intent to grow.
    let vulnerable_and_seeking = normalized.iter().any(|text| {
        contains_any(text, VULNERABLE_PHRASES) && contains_any(text, HOPEFUL_PHRASES)
    });
    if vulnerable_and_seeking {
        points += VULNERABLE_BONUS;
        reasons.push("vulnerable but seeking".to_string());
    }

    // Low-effort detection: very short answers, or template phrases with
    // nothing personal around them.
    let low_effort = normalized.iter().any(|text| {
        text.len() < VERY_SHORT_LEN
            || !text.contains(' ')
            || (contains_any(text, GENERIC_PHRASES) && text.len() < GENERIC_MAX_LEN)
    });
    if low_effort {
        points += LOW_EFFORT_PENALTY;
        reasons.push("low-effort answers".to_string());
    }

    // Copy-paste detection: an answer that restates its own question is
    // not an answer.
    let copied = answers.answers().iter().zip(&normalized).any(|(a, text)| {
        let question = normalize_text(&a.question);
        text.len() > 10 && (*text == question || question.contains(text.as_str()))
    });
    if copied {
        points += COPY_PASTE_PENALTY;
        reasons.push("answer copied from its question".to_string());
    }

    let score = points.clamp(0, 10) as u8;
    HeuristicScore {
        score,
        confidence: band.classify(score, suspicion.score),
        reasons,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band() -> ThresholdBand {
        ThresholdBand { low: 3, high: 8 }
    }

    fn suspicion(score: u8) -> SuspicionResult {
        SuspicionResult {
            score,
            reasons: Vec::new(),
        }
    }

    fn answer_set(texts: &[&str]) -> AnswerSet {
        let mut set = AnswerSet::new();
        for (i, text) in texts.iter().enumerate() {
            set.push(Answer {
                question_id: format!("Q{}", i + 1),
                question: format!("Question number {}?", i + 1),
                text: text.to_string(),
            });
        }
        set
    }

    #[test]
    fn single_word_answers_stay_near_the_middle() {
        let set = answer_set(&["ok", "ok", "ok", "ok"]);
        let result = score_answers(&set, &suspicion(2), band());
        assert_eq!(result.score, 4);
        assert_eq!(result.confidence, Confidence::Borderline);
        assert!(result.reasons.iter().any(|r| r.contains("low-effort")));
    }

    #[test]
    fn devotional_answers_are_clear_without_ai() {
        let set = answer_set(&[
            "I seek to surrender to Krishna with humility and learn from devotees",
            "Chanting brings me peace and I want to grow on this journey",
            "I feel inspired by the temple and want to understand bhakti",
            "I would try to stay humble and ask for guidance",
        ]);
        let result = score_answers(&set, &suspicion(0), band());
        assert!(result.score >= 8, "scored {}", result.score);
        assert_eq!(result.confidence, Confidence::Clear);
    }

    #[test]
    fn mockery_sinks_the_score() {
        let set = answer_set(&[
            "this is a cult and all of it is nonsense",
            "mythology for the gullible",
            "whatever",
            "no",
        ]);
        let result = score_answers(&set, &suspicion(0), band());
        assert!(result.score <= 3, "scored {}", result.score);
        assert_eq!(result.confidence, Confidence::Clear);
    }

    #[test]
    fn copied_question_is_heavily_penalized() {
        let mut set = AnswerSet::new();
        set.push(Answer {
            question_id: "E1".to_string(),
            question: "What brings you to this community?".to_string(),
            text: "What brings you to this community?".to_string(),
        });
        let result = score_answers(&set, &suspicion(0), band());
        assert!(result.score <= 1, "scored {}", result.score);
        assert!(result.reasons.iter().any(|r| r.contains("copied")));
    }

    #[test]
    fn score_is_always_in_range() {
        let samples: &[&[&str]] = &[
            &[],
            &["ok"],
            &["cult nonsense stupid fake", "prove it", "i am god", "cringe"],
            &[
                "krishna devotion service chanting prayer temple bhakti",
                "humble mercy guidance inspired",
                "spiritual divine journey",
                "lost but i want to learn",
            ],
        ];
        for texts in samples {
            for s in 0..=4u8 {
                let result = score_answers(&answer_set(texts), &suspicion(s), band());
                assert!(result.score <= 10);
            }
        }
    }

    #[test]
    fn scorer_is_idempotent() {
        let set = answer_set(&["I want to learn about Krishna", "ok"]);
        let first = score_answers(&set, &suspicion(1), band());
        let second = score_answers(&set, &suspicion(1), band());
        assert_eq!(first.score, second.score);
        assert_eq!(first.reasons, second.reasons);
    }

    #[test]
    fn suspicion_shrinks_the_clear_low_zone() {
        let threshold = band();
        // Score 2 is clear for a trusted profile but borderline once the
        // profile itself is suspect.
        assert_eq!(threshold.classify(2, 0), Confidence::Clear);
        assert_eq!(threshold.classify(2, 2), Confidence::Borderline);
        assert_eq!(threshold.classify(9, 4), Confidence::Clear);
    }

    #[test]
    fn band_is_tunable() {
        let wide = ThresholdBand { low: 1, high: 10 };
        let set = answer_set(&["ok", "ok"]);
        let result = score_answers(&set, &suspicion(0), wide);
        assert_eq!(result.confidence, Confidence::Borderline);
    }

    #[test]
    fn normalization_collapses_formatting() {
        assert_eq!(normalize_text("  Hare   KRISHNA\n\t"), "hare krishna");
        let a = answer_set(&["Hare   Krishna", "I  want to LEARN"]);
        let b = answer_set(&["hare krishna", "i want to learn"]);
        assert_eq!(a.normalized_concat(), b.normalized_concat());
        assert!(AnswerSet::new().is_empty());
    }
}
