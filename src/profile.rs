//! Profile suspicion scoring.
//!
//! A pure point-accumulation pass over the metadata a member arrives with.
//! Nothing here talks to Discord; the snapshot is taken once when the
//! member joins and the scorer can be replayed on it at will.

use chrono::{DateTime, Utc};
use serenity::all::Member;

/// Username substrings that almost always indicate a throwaway account.
const HIGH_RISK_KEYWORDS: &[&str] = &["discord", "nitro", "gift", "free", "hack", "bot", "raid"];

/// Username substrings that are merely suspicious.
const MEDIUM_RISK_KEYWORDS: &[&str] = &["test", "fake", "temp", "alt"];

/// Everything the suspicion scorer looks at, frozen at join time.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    pub created_at: DateTime<Utc>,
    pub has_custom_avatar: bool,
    pub username: String,
    pub is_booster: bool,
}

impl ProfileSnapshot {
    pub fn from_member(member: &Member) -> Self {
        let created_at = DateTime::from_timestamp(member.user.id.created_at().unix_timestamp(), 0)
            .unwrap_or_default();

        Self {
            created_at,
            has_custom_avatar: member.user.avatar.is_some(),
            username: member.user.name.clone(),
            is_booster: member.premium_since.is_some(),
        }
    }
}

/// Suspicion score in `[0, 4]` plus the rules that fired, in rule order.
///
/// The reasons reflect raw contributions; clamping the score does not
/// remove them.
#[derive(Debug, Clone)]
pub struct SuspicionResult {
    pub score: u8,
    pub reasons: Vec<String>,
}

pub fn score_profile(profile: &ProfileSnapshot, now: DateTime<Utc>) -> SuspicionResult {
    let mut points: i32 = 0;
    let mut reasons = Vec::new();

    // Account age
    let age_days = (now - profile.created_at).num_days();
    if age_days < 1 {
        points += 3;
        reasons.push("brand new account (under a day old)".to_string());
    } else if age_days < 7 {
        points += 2;
        reasons.push(format!("very new account ({} days)", age_days));
    } else if age_days < 30 {
        points += 1;
        reasons.push(format!("recent account ({} days)", age_days));
    } else if age_days > 365 {
        points -= 1;
        reasons.push(format!("established account ({} days)", age_days));
    }

    // Avatar
    if profile.has_custom_avatar {
        points -= 1;
        reasons.push("has a custom avatar".to_string());
    } else {
        points += 1;
        reasons.push("no custom avatar".to_string());
    }

    // Username pattern
    let username = profile.username.to_lowercase();
    let digit_run = longest_digit_run(&username);
    if digit_run >= 6 || contains_any(&username, HIGH_RISK_KEYWORDS) {
        points += 2;
        reasons.push("username has a long digit run or high-risk keyword".to_string());
    } else if digit_run >= 4 || contains_any(&username, MEDIUM_RISK_KEYWORDS) {
        points += 1;
        reasons.push("username has several digits or a suspicious keyword".to_string());
    } else if username.chars().count() >= 8 && digit_run == 0 {
        points -= 1;
        reasons.push("plain username".to_string());
    }

    // Subscriber tier
    if profile.is_booster {
        points -= 1;
        reasons.push("server booster".to_string());
    }

    SuspicionResult {
        score: points.clamp(0, 4) as u8,
        reasons,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn longest_digit_run(s: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(age: Duration, avatar: bool, username: &str, booster: bool) -> ProfileSnapshot {
        ProfileSnapshot {
            created_at: Utc::now() - age,
            has_custom_avatar: avatar,
            username: username.to_string(),
            is_booster: booster,
        }
    }

    #[test]
    fn fresh_spam_profile_clamps_to_four() {
        // 12h old, default avatar, six-digit run: +3 +1 +2 = 6, clamped
        let profile = snapshot(Duration::hours(12), false, "user123456", false);
        let result = score_profile(&profile, Utc::now());
        assert_eq!(result.score, 4);
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn established_profile_clamps_to_zero() {
        // 2y old, custom avatar, long digit-free name: -1 -1 -1 = -3, clamped
        let profile = snapshot(Duration::days(730), true, "John_Devotee", false);
        let result = score_profile(&profile, Utc::now());
        assert_eq!(result.score, 0);
        assert_eq!(result.reasons.len(), 3);
    }

    #[test]
    fn score_is_always_in_range() {
        let ages = [0i64, 1, 6, 7, 29, 30, 365, 366, 3650];
        let names = ["x", "bot", "nitro-drop", "abc1234", "a1", "longplainname"];
        for age in ages {
            for name in names {
                for avatar in [false, true] {
                    for booster in [false, true] {
                        let profile = snapshot(Duration::days(age), avatar, name, booster);
                        let result = score_profile(&profile, Utc::now());
                        assert!(result.score <= 4, "{name} at {age}d scored out of range");
                    }
                }
            }
        }
    }

    #[test]
    fn older_accounts_never_score_higher() {
        let now = Utc::now();
        let mut previous = u8::MAX;
        for age in [0i64, 1, 6, 7, 29, 30, 200, 365, 366, 1000] {
            let profile = snapshot(Duration::days(age), false, "somebody", false);
            let score = score_profile(&profile, now).score;
            assert!(score <= previous, "score rose between ages");
            previous = score;
        }
    }

    #[test]
    fn scorer_is_deterministic() {
        let profile = snapshot(Duration::days(3), false, "temp_handle42", false);
        let now = Utc::now();
        let first = score_profile(&profile, now);
        let second = score_profile(&profile, now);
        assert_eq!(first.score, second.score);
        assert_eq!(first.reasons, second.reasons);
    }

    #[test]
    fn medium_risk_keyword_adds_one() {
        let profile = snapshot(Duration::days(100), true, "alt_account", false);
        let result = score_profile(&profile, Utc::now());
        // -1 avatar +1 keyword = 0
        assert_eq!(result.score, 0);
        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("suspicious keyword")));
    }

    #[test]
    fn digit_runs_are_measured_consecutively() {
        assert_eq!(longest_digit_run("a1b2c3"), 1);
        assert_eq!(longest_digit_run("abc12345"), 5);
        assert_eq!(longest_digit_run("123456xyz"), 6);
        assert_eq!(longest_digit_run("plain"), 0);
    }
}
