//! Per-user verification session state machine.
//!
//! Transitions are driven by DM answers arriving and by the timeout
//! sweeper.  The session owns the question set it was issued (a clone
//! out of the pool snapshot active at selection time), so question-bank
//! reloads never change a set already in flight.

use crate::heuristic::{Answer, AnswerSet};
use crate::profile::SuspicionResult;
use crate::questions::QuestionTemplate;
use crate::scoring::RoleDecision;
use serenity::all::UserId;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Started,
    AwaitingEntryAnswer,
    AwaitingReflective1,
    AwaitingReflective2,
    AwaitingPsychological,
    Scoring,
    Completed(RoleDecision),
    Abandoned,
}

impl SessionState {
    fn awaiting_index(&self) -> Option<usize> {
        match self {
            SessionState::AwaitingEntryAnswer => Some(0),
            SessionState::AwaitingReflective1 => Some(1),
            SessionState::AwaitingReflective2 => Some(2),
            SessionState::AwaitingPsychological => Some(3),
            _ => None,
        }
    }

    fn awaiting_for(index: usize) -> Option<SessionState> {
        match index {
            0 => Some(SessionState::AwaitingEntryAnswer),
            1 => Some(SessionState::AwaitingReflective1),
            2 => Some(SessionState::AwaitingReflective2),
            3 => Some(SessionState::AwaitingPsychological),
            _ => None,
        }
    }
}

/// What happened when an answer was recorded.
pub enum SessionAdvance {
    NextQuestion {
        number: usize,
        question: QuestionTemplate,
    },
    ReadyToScore,
}

pub struct VerificationSession {
    pub user_id: UserId,
    pub username: String,
    pub suspicion: SuspicionResult,
    questions: Vec<QuestionTemplate>,
    answers: AnswerSet,
    state: SessionState,
    deadline: Instant,
}

impl VerificationSession {
    pub fn new(
        user_id: UserId,
        username: String,
        suspicion: SuspicionResult,
        questions: Vec<QuestionTemplate>,
    ) -> Self {
        Self {
            user_id,
            username,
            suspicion,
            questions,
            answers: AnswerSet::new(),
            state: SessionState::Started,
            deadline: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move from `Started` to waiting on the first question and return it.
    pub fn begin(&mut self, now: Instant, timeout: Duration) -> Option<&QuestionTemplate> {
        if self.state != SessionState::Started {
            return None;
        }
        self.state = SessionState::AwaitingEntryAnswer;
        self.deadline = now + timeout;
        self.questions.first()
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.state.awaiting_index().is_some()
    }

    /// 1-based number of the question currently awaiting an answer.
    pub fn question_number(&self) -> Option<usize> {
        self.state.awaiting_index().map(|i| i + 1)
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Record an answer to the question currently awaited.  Returns
    /// `None` when the session is not waiting on one.
    pub fn record_answer(
        &mut self,
        text: &str,
        now: Instant,
        timeout: Duration,
    ) -> Option<SessionAdvance> {
        let index = self.state.awaiting_index()?;
        let question = &self.questions[index];
        self.answers.push(Answer {
            question_id: question.id.clone(),
            question: question.question.clone(),
            text: collapse_whitespace(text),
        });

        let next = index + 1;
        if next < self.questions.len() {
            // The state list caps at four questions, matching selection.
            self.state = SessionState::awaiting_for(next).unwrap_or(SessionState::Scoring);
            self.deadline = now + timeout;
            Some(SessionAdvance::NextQuestion {
                number: next + 1,
                question: self.questions[next].clone(),
            })
        } else {
            self.state = SessionState::Scoring;
            Some(SessionAdvance::ReadyToScore)
        }
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn complete(&mut self, role: RoleDecision) {
        self.state = SessionState::Completed(role);
    }

    pub fn abandon(&mut self) {
        self.state = SessionState::Abandoned;
    }

    /// Abandon the session if its answer deadline has passed.  Only
    /// sessions waiting on an answer can expire; one already scoring
    /// runs to completion.
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        if self.is_awaiting_answer() && now >= self.deadline {
            self.state = SessionState::Abandoned;
            true
        } else {
            false
        }
    }

    /// Reset a finished session so the member can try again.
    pub fn restartable(&self) -> bool {
        matches!(
            self.state,
            SessionState::Abandoned | SessionState::Completed(RoleDecision::None)
        )
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
