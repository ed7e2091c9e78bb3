//! The question bank: categorized pools loaded from a JSON file.
//!
//! Pools are immutable snapshots behind an `Arc`.  A reload parses and
//! validates the file first and only then swaps the snapshot in, so a
//! bad file never disturbs the pool in service, and sessions that
//! already picked their questions keep the snapshot they picked from.

use crate::error::{VerifyError, VerifyResult};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuestionTemplate {
    pub id: String,
    pub question: String,
}

#[derive(serde::Deserialize)]
struct QuestionFile {
    entry: Vec<QuestionTemplate>,
    reflective: Vec<QuestionTemplate>,
    psychological: PsychologicalFile,
}

#[derive(serde::Deserialize)]
struct PsychologicalFile {
    trusted: Vec<QuestionTemplate>,
    medium: Vec<QuestionTemplate>,
    high: Vec<QuestionTemplate>,
}

/// Difficulty bucket for the psychological question, from the profile
/// suspicion score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Trusted,
    Medium,
    High,
}

impl Tier {
    pub fn from_suspicion(score: u8) -> Self {
        match score {
            0..=1 => Tier::Trusted,
            2..=3 => Tier::Medium,
            _ => Tier::High,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Tier::Trusted => write!(f, "trusted"),
            Tier::Medium => write!(f, "medium"),
            Tier::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolCounts {
    pub entry: usize,
    pub reflective: usize,
    pub trusted: usize,
    pub medium: usize,
    pub high: usize,
}

/// One validated, immutable generation of the question pools.
#[derive(Debug)]
pub struct QuestionPools {
    entry: Vec<QuestionTemplate>,
    reflective: Vec<QuestionTemplate>,
    trusted: Vec<QuestionTemplate>,
    medium: Vec<QuestionTemplate>,
    high: Vec<QuestionTemplate>,
}

impl QuestionPools {
    fn parse(data: &str) -> VerifyResult<Self> {
        let file: QuestionFile = serde_json::from_str(data)
            .map_err(|e| VerifyError::Configuration(format!("malformed question file: {e}")))?;

        let pools = Self {
            entry: file.entry,
            reflective: file.reflective,
            trusted: file.psychological.trusted,
            medium: file.psychological.medium,
            high: file.psychological.high,
        };
        pools.validate()?;
        Ok(pools)
    }

    fn validate(&self) -> VerifyResult<()> {
        let required: &[(&str, usize, usize)] = &[
            ("entry", self.entry.len(), 1),
            ("reflective", self.reflective.len(), 2),
            ("psychological.trusted", self.trusted.len(), 1),
            ("psychological.medium", self.medium.len(), 1),
            ("psychological.high", self.high.len(), 1),
        ];
        for (name, len, min) in required {
            if len < min {
                return Err(VerifyError::Configuration(format!(
                    "question pool `{name}` needs at least {min} question(s), found {len}"
                )));
            }
        }
        Ok(())
    }

    /// One entry question, two distinct reflective questions, and one
    /// psychological question from the pool matching the tier.
    pub fn select<R: rand::Rng + ?Sized>(
        &self,
        tier: Tier,
        rng: &mut R,
    ) -> VerifyResult<Vec<QuestionTemplate>> {
        let psychological = match tier {
            Tier::Trusted => &self.trusted,
            Tier::Medium => &self.medium,
            Tier::High => &self.high,
        };

        let entry = self
            .entry
            .choose(rng)
            .ok_or_else(|| VerifyError::Configuration("entry pool is empty".to_string()))?;
        let reflective: Vec<_> = self.reflective.choose_multiple(rng, 2).collect();
        if reflective.len() < 2 {
            return Err(VerifyError::Configuration(
                "reflective pool has fewer than two questions".to_string(),
            ));
        }
        let psychological = psychological.choose(rng).ok_or_else(|| {
            VerifyError::Configuration(format!("psychological `{tier}` pool is empty"))
        })?;

        Ok(vec![
            entry.clone(),
            reflective[0].clone(),
            reflective[1].clone(),
            psychological.clone(),
        ])
    }

    pub fn counts(&self) -> PoolCounts {
        PoolCounts {
            entry: self.entry.len(),
            reflective: self.reflective.len(),
            trusted: self.trusted.len(),
            medium: self.medium.len(),
            high: self.high.len(),
        }
    }
}

/// Handle owning the current pool snapshot and the file it came from.
pub struct QuestionBank {
    path: PathBuf,
    pools: Arc<QuestionPools>,
}

impl QuestionBank {
    pub async fn load(path: &Path) -> VerifyResult<Self> {
        let pools = Self::read_pools(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            pools: Arc::new(pools),
        })
    }

    async fn read_pools(path: &Path) -> VerifyResult<QuestionPools> {
        let data = tokio::fs::read_to_string(path).await.map_err(|e| {
            VerifyError::Configuration(format!(
                "could not read question file `{}`: {e}",
                path.to_string_lossy()
            ))
        })?;
        QuestionPools::parse(&data)
    }

    /// Re-read and validate the file.  The in-service snapshot is only
    /// replaced when the new one is valid.
    pub async fn reload(&mut self) -> VerifyResult<PoolCounts> {
        let pools = Self::read_pools(&self.path).await?;
        let counts = pools.counts();
        self.pools = Arc::new(pools);
        Ok(counts)
    }

    pub fn snapshot(&self) -> Arc<QuestionPools> {
        Arc::clone(&self.pools)
    }

    pub fn counts(&self) -> PoolCounts {
        self.pools.counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const VALID: &str = r#"{
        "entry": [
            {"id": "E1", "question": "What brings you to this community?"},
            {"id": "E2", "question": "Do you value respectful dialogue?"}
        ],
        "reflective": [
            {"id": "R1", "question": "What do you feel seeing a spiritual life?"},
            {"id": "R2", "question": "What would you ask Krishna?"},
            {"id": "R3", "question": "What inspires you about devotion?"}
        ],
        "psychological": {
            "trusted": [{"id": "P1", "question": "What does humility mean to you?"}],
            "medium": [{"id": "P3", "question": "How would you handle mockery of your beliefs?"}],
            "high": [{"id": "P5", "question": "What if a devotee corrected you?"}]
        }
    }"#;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mandirbot-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_a_valid_file() {
        let pools = QuestionPools::parse(VALID).unwrap();
        let counts = pools.counts();
        assert_eq!(counts.entry, 2);
        assert_eq!(counts.reflective, 3);
        assert_eq!(counts.high, 1);
    }

    #[test]
    fn missing_top_level_key_is_a_configuration_error() {
        let err = QuestionPools::parse(r#"{"entry": [], "reflective": []}"#).unwrap_err();
        assert!(matches!(err, VerifyError::Configuration(_)));
    }

    #[test]
    fn empty_required_pool_is_a_configuration_error() {
        let data = VALID.replace(
            r#""high": [{"id": "P5", "question": "What if a devotee corrected you?"}]"#,
            r#""high": []"#,
        );
        let err = QuestionPools::parse(&data).unwrap_err();
        assert!(matches!(err, VerifyError::Configuration(_)));
    }

    #[test]
    fn selection_has_the_fixed_shape() {
        let pools = QuestionPools::parse(VALID).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for tier in [Tier::Trusted, Tier::Medium, Tier::High] {
            let picked = pools.select(tier, &mut rng).unwrap();
            assert_eq!(picked.len(), 4);
            // The two reflective slots never repeat a question.
            assert_ne!(picked[1].id, picked[2].id);
        }
    }

    #[test]
    fn tier_follows_the_suspicion_score() {
        assert_eq!(Tier::from_suspicion(0), Tier::Trusted);
        assert_eq!(Tier::from_suspicion(1), Tier::Trusted);
        assert_eq!(Tier::from_suspicion(2), Tier::Medium);
        assert_eq!(Tier::from_suspicion(3), Tier::Medium);
        assert_eq!(Tier::from_suspicion(4), Tier::High);
    }

    #[tokio::test]
    async fn failed_reload_keeps_the_previous_pool() {
        let path = temp_file("reload", VALID);
        let mut bank = QuestionBank::load(&path).await.unwrap();
        let before = bank.snapshot();

        // Rewrite the file with an empty high pool and try to reload.
        let broken = VALID.replace(
            r#""high": [{"id": "P5", "question": "What if a devotee corrected you?"}]"#,
            r#""high": []"#,
        );
        std::fs::write(&path, broken).unwrap();
        assert!(bank.reload().await.is_err());

        // The snapshot in service is untouched.
        assert!(Arc::ptr_eq(&before, &bank.snapshot()));
        assert_eq!(bank.counts().high, 1);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn successful_reload_swaps_the_snapshot() {
        let path = temp_file("reload-ok", VALID);
        let mut bank = QuestionBank::load(&path).await.unwrap();
        let before = bank.snapshot();

        let extended = VALID.replace(
            r#"{"id": "E2", "question": "Do you value respectful dialogue?"}"#,
            r#"{"id": "E2", "question": "Do you value respectful dialogue?"},
               {"id": "E3", "question": "What are your views on Srila Prabhupada?"}"#,
        );
        std::fs::write(&path, extended).unwrap();
        let counts = bank.reload().await.unwrap();
        assert_eq!(counts.entry, 3);
        assert!(!Arc::ptr_eq(&before, &bank.snapshot()));
        std::fs::remove_file(&path).ok();
    }
}
