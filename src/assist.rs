//! AI assist cache and daily usage accounting.
//!
//! Both live inside the scoring context injected into the orchestrator;
//! there are no process-wide globals, so tests construct fresh instances.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

use crate::heuristic::AnswerSet;

/// The fragment of a score result worth remembering between identical
/// escalations.
#[derive(Debug, Clone)]
pub struct CachedVerdict {
    pub score: u8,
    pub reasoning: String,
}

/// Content digest over the normalized scoring input.  Two logically
/// identical answer sets always derive the same key.
pub fn cache_key(answers: &AnswerSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(answers.normalized_concat().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Bounded key-value cache with insertion-order (FIFO) eviction.
///
/// Eviction deliberately ignores access order: a hit does not refresh an
/// entry's position, so the oldest *inserted* entry is always the one
/// displaced at capacity.
pub struct AssistCache {
    entries: HashMap<String, CachedVerdict>,
    insertion_order: VecDeque<String>,
    capacity: usize,
    hits: u64,
}

impl AssistCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            capacity,
            hits: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<CachedVerdict> {
        let found = self.entries.get(key).cloned();
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub fn put(&mut self, key: String, verdict: CachedVerdict) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, verdict);
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.insertion_order.push_back(key.clone());
        self.entries.insert(key, verdict);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

/// Calendar-day counter for external AI calls.  The reset is lazy: the
/// first check after a date change zeroes the counter, there is no
/// background timer.
pub struct UsageLimiter {
    calls_today: u32,
    last_reset: NaiveDate,
    daily_limit: u32,
}

impl UsageLimiter {
    pub fn new(daily_limit: u32, today: NaiveDate) -> Self {
        Self {
            calls_today: 0,
            last_reset: today,
            daily_limit,
        }
    }

    fn roll_over(&mut self, today: NaiveDate) {
        if today != self.last_reset {
            self.calls_today = 0;
            self.last_reset = today;
        }
    }

    /// Whether one more call fits under today's ceiling.  Applies the
    /// lazy reset first.
    pub fn would_allow(&mut self, today: NaiveDate) -> bool {
        self.roll_over(today);
        self.calls_today < self.daily_limit
    }

    /// Count a successful call.  Re-applies the reset in case the date
    /// flipped while the call was in flight.
    pub fn record_call(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.calls_today += 1;
    }

    /// Apply a new ceiling without touching today's count.
    pub fn set_daily_limit(&mut self, daily_limit: u32) {
        self.daily_limit = daily_limit;
    }

    pub fn calls_today(&self) -> u32 {
        self.calls_today
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn last_reset(&self) -> NaiveDate {
        self.last_reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::{Answer, AnswerSet};

    fn verdict(score: u8) -> CachedVerdict {
        CachedVerdict {
            score,
            reasoning: String::new(),
        }
    }

    #[test]
    fn round_trip() {
        let mut cache = AssistCache::new(100);
        assert!(cache.is_empty());
        cache.put("k".to_string(), verdict(7));
        let got = cache.get("k").unwrap();
        assert_eq!(got.score, 7);
        assert_eq!(cache.hits(), 1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn eviction_is_fifo_at_capacity() {
        let mut cache = AssistCache::new(100);
        for i in 0..101 {
            cache.put(format!("key-{i}"), verdict(5));
        }
        assert_eq!(cache.len(), 100);
        assert!(cache.get("key-0").is_none());
        assert!(cache.get("key-1").is_some());
        assert!(cache.get("key-100").is_some());
    }

    #[test]
    fn hits_do_not_refresh_insertion_order() {
        let mut cache = AssistCache::new(2);
        cache.put("a".to_string(), verdict(1));
        cache.put("b".to_string(), verdict(2));
        // Read the oldest entry, then insert a third.  FIFO still evicts
        // "a"; LRU would have evicted "b".
        assert!(cache.get("a").is_some());
        cache.put("c".to_string(), verdict(3));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn reinserting_a_key_updates_in_place() {
        let mut cache = AssistCache::new(2);
        cache.put("a".to_string(), verdict(1));
        cache.put("a".to_string(), verdict(9));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().score, 9);
    }

    #[test]
    fn identical_inputs_share_a_key() {
        let mut a = AnswerSet::new();
        a.push(Answer {
            question_id: "E1".to_string(),
            question: "Why are you here?".to_string(),
            text: "To  Learn   about Krishna".to_string(),
        });
        let mut b = AnswerSet::new();
        b.push(Answer {
            question_id: "E1".to_string(),
            question: "Why are you here?".to_string(),
            text: "to learn about krishna".to_string(),
        });
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn different_inputs_get_different_keys() {
        let mut a = AnswerSet::new();
        a.push(Answer {
            question_id: "E1".to_string(),
            question: "Why are you here?".to_string(),
            text: "to learn".to_string(),
        });
        let mut b = AnswerSet::new();
        b.push(Answer {
            question_id: "E1".to_string(),
            question: "Why are you here?".to_string(),
            text: "to argue".to_string(),
        });
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn limiter_resets_on_date_change() {
        let yesterday = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let mut limiter = UsageLimiter::new(1000, yesterday);
        for _ in 0..999 {
            limiter.record_call(yesterday);
        }
        assert_eq!(limiter.calls_today(), 999);

        // The next attempt on a new day resets before checking the ceiling.
        assert!(limiter.would_allow(today));
        assert_eq!(limiter.calls_today(), 0);
        assert_eq!(limiter.last_reset(), today);
    }

    #[test]
    fn limiter_blocks_at_the_ceiling() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut limiter = UsageLimiter::new(2, today);
        assert!(limiter.would_allow(today));
        limiter.record_call(today);
        assert!(limiter.would_allow(today));
        limiter.record_call(today);
        assert!(!limiter.would_allow(today));
    }
}
