use crate::error::{VerifyError, VerifyResult};
use crate::log_warn;
use serenity::all::{ChannelId, RoleId};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// State which persists across sessions
#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct PersistentState {
    #[serde(default)]
    pub guild: GuildConfig,
    #[serde(default)]
    pub question_usage: QuestionUsage,
}

/// The per-community configuration written by the setup command.
#[derive(Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct GuildConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devotee_role_id: Option<RoleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeker_role_id: Option<RoleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm_questions_channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_channel_id: Option<ChannelId>,
}

impl GuildConfig {
    /// Verification only runs once both roles and both mandatory
    /// channels have been set up.
    pub fn is_configured(&self) -> bool {
        self.devotee_role_id.is_some()
            && self.seeker_role_id.is_some()
            && self.verification_channel_id.is_some()
            && self.admin_channel_id.is_some()
    }
}

/// How often each question id has been issued, for the stats command.
#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct QuestionUsage(pub HashMap<String, u64>);

impl QuestionUsage {
    pub fn record(&mut self, question_id: &str) {
        *self.0.entry(question_id.to_string()).or_insert(0) += 1;
    }

    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<_> = self.0.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}

impl PersistentState {
    pub async fn load(path: &Path) -> VerifyResult<Self> {
        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            VerifyError::Persistence(format!(
                "could not open state at `{}`: {e}",
                path.to_string_lossy()
            ))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            VerifyError::Persistence(format!(
                "could not read state at `{}`: {e}",
                path.to_string_lossy()
            ))
        })?;

        let pstate: PersistentState = toml::from_str(&contents).map_err(|e| {
            VerifyError::Persistence(format!(
                "could not parse state at `{}`: {e}",
                path.to_string_lossy()
            ))
        })?;

        Ok(pstate)
    }

    /// An unreachable or corrupt store degrades to defaults with a
    /// warning; it never blocks startup or the session flow.
    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(pstate) => pstate,
            Err(e) => {
                log_warn!("Falling back to default state: {}", e);
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> VerifyResult<()> {
        let pstate_str = toml::to_string_pretty(&self)
            .map_err(|e| VerifyError::Persistence(format!("could not serialize state: {e}")))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                VerifyError::Persistence(format!(
                    "could not create directory `{}`: {e}",
                    parent.to_string_lossy()
                ))
            })?;
        }

        // Create a temporary file in the same directory.
        let tmp_path = path.with_extension("toml.new");

        tokio::fs::write(&tmp_path, pstate_str).await.map_err(|e| {
            VerifyError::Persistence(format!(
                "could not write state to temporary file `{}`: {e}",
                tmp_path.to_string_lossy()
            ))
        })?;

        // Atomically rename the temporary file over the target file.
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            VerifyError::Persistence(format!(
                "could not rename temporary file `{}` to `{}`: {e}",
                tmp_path.to_string_lossy(),
                path.to_string_lossy()
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mandirbot-state-{}-{}", std::process::id(), name))
    }

    #[test]
    fn defaults_are_unconfigured() {
        let guild = GuildConfig::default();
        assert!(!guild.is_configured());
    }

    #[test]
    fn configured_once_required_fields_are_set() {
        let guild = GuildConfig {
            devotee_role_id: Some(RoleId::new(1)),
            seeker_role_id: Some(RoleId::new(2)),
            verification_channel_id: Some(ChannelId::new(3)),
            admin_channel_id: Some(ChannelId::new(4)),
            ..GuildConfig::default()
        };
        assert!(guild.is_configured());
    }

    #[test]
    fn usage_counts_sort_descending() {
        let mut usage = QuestionUsage::default();
        for _ in 0..3 {
            usage.record("R1");
        }
        usage.record("E1");
        let top = usage.top(10);
        assert_eq!(top[0], ("R1".to_string(), 3));
        assert_eq!(top[1], ("E1".to_string(), 1));
    }

    #[tokio::test]
    async fn save_and_reload_round_trip() {
        let path = temp_path("roundtrip");
        let mut state = PersistentState::default();
        state.guild.devotee_role_id = Some(RoleId::new(11));
        state.guild.admin_channel_id = Some(ChannelId::new(22));
        state.question_usage.record("E1");

        state.save(&path).await.unwrap();
        let loaded = PersistentState::load(&path).await.unwrap();
        assert_eq!(loaded.guild.devotee_role_id, Some(RoleId::new(11)));
        assert_eq!(loaded.question_usage.0.get("E1"), Some(&1));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn missing_store_degrades_to_defaults() {
        let path = temp_path("missing");
        let state = PersistentState::load_or_default(&path).await;
        assert!(!state.guild.is_configured());
    }
}
