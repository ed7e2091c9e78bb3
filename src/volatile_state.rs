use crate::questions::QuestionBank;
use crate::session::{SessionState, VerificationSession};
use serenity::all::UserId;
use std::collections::HashMap;
use tokio::time::Instant;

/// State which is lost across restarts
pub struct VolatileState {
    pub sessions: Sessions,
    pub questions: QuestionBank,
}

impl VolatileState {
    pub fn new(questions: QuestionBank) -> Self {
        Self {
            sessions: Sessions::default(),
            questions,
        }
    }
}

/// Registry of verification sessions, one per user, plus terminal-state
/// tallies for the status endpoint.
#[derive(Default)]
pub struct Sessions {
    map: HashMap<UserId, VerificationSession>,
    completed: u64,
    abandoned: u64,
}

impl Sessions {
    pub fn insert(&mut self, session: VerificationSession) {
        self.map.insert(session.user_id, session);
    }

    pub fn get(&self, user_id: UserId) -> Option<&VerificationSession> {
        self.map.get(&user_id)
    }

    pub fn get_mut(&mut self, user_id: UserId) -> Option<&mut VerificationSession> {
        self.map.get_mut(&user_id)
    }

    pub fn active_count(&self) -> usize {
        self.map
            .values()
            .filter(|s| {
                !matches!(
                    s.state(),
                    SessionState::Completed(_) | SessionState::Abandoned
                )
            })
            .count()
    }

    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    pub fn abandoned_count(&self) -> u64 {
        self.abandoned
    }

    pub fn note_completed(&mut self) {
        self.completed += 1;
    }

    /// Mark a session abandoned outside the timeout path, e.g. when the
    /// member's DMs turn out to be closed.
    pub fn abandon(&mut self, user_id: UserId) {
        if let Some(session) = self.map.get_mut(&user_id) {
            session.abandon();
            self.abandoned += 1;
        }
    }

    /// Drop a finished session so the member can start over.
    pub fn remove(&mut self, user_id: UserId) -> Option<VerificationSession> {
        self.map.remove(&user_id)
    }

    /// Abandon every session whose answer deadline has passed and return
    /// who was affected so callers can send notifications.
    pub fn expire_due(&mut self, now: Instant) -> Vec<(UserId, String)> {
        let mut expired = Vec::new();
        for session in self.map.values_mut() {
            if session.expire_if_due(now) {
                self.abandoned += 1;
                expired.push((session.user_id, session.username.clone()));
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SuspicionResult;
    use crate::questions::QuestionTemplate;
    use crate::scoring::RoleDecision;
    use std::time::Duration;

    fn session(user: u64) -> VerificationSession {
        VerificationSession::new(
            UserId::new(user),
            format!("user-{user}"),
            SuspicionResult {
                score: 0,
                reasons: Vec::new(),
            },
            vec![QuestionTemplate {
                id: "E1".to_string(),
                question: "Why?".to_string(),
            }],
        )
    }

    #[test]
    fn active_count_ignores_terminal_sessions() {
        let mut sessions = Sessions::default();
        sessions.insert(session(1));
        let mut done = session(2);
        done.complete(RoleDecision::Seeker);
        sessions.insert(done);

        assert_eq!(sessions.active_count(), 1);
    }

    #[test]
    fn expiry_marks_and_tallies() {
        let mut sessions = Sessions::default();
        let start = Instant::now();
        let timeout = Duration::from_secs(60);

        let mut due = session(1);
        let _ = due.begin(start, timeout);
        sessions.insert(due);
        sessions.insert(session(2)); // never begun, cannot expire

        let expired = sessions.expire_due(start + timeout);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, UserId::new(1));
        assert_eq!(sessions.abandoned_count(), 1);
        assert_eq!(
            sessions.get(UserId::new(1)).unwrap().state(),
            SessionState::Abandoned
        );
    }
}
