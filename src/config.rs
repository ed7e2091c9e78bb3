use crate::heuristic::ThresholdBand;
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/mandirbot/config.toml";
const STATE_PATH_REL_HOME: &str = ".config/mandirbot/state.toml";
const QUESTIONS_PATH_REL_HOME: &str = ".config/mandirbot/questions.json";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub ai: Ai,
    #[serde(default)]
    pub verification: Verification,
    #[serde(default)]
    pub web: Web,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    /// Snowflake of the one community this bot serves.  Events from any
    /// other guild are ignored.
    pub server_id: u64,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default)]
    pub startup_delay_seconds: u64,
    /// Override for the persisted guild-configuration file.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Ai {
    #[serde(default = "default_completion_url")]
    pub completion_url: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    pub api_key: Option<String>,
    pub backup_api_key: Option<String>,
    #[serde(default = "default_daily_call_limit")]
    pub daily_call_limit: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Verification {
    /// Seconds a member may take to answer each DM question before the
    /// session is abandoned.
    #[serde(default = "default_question_timeout")]
    pub question_timeout_seconds: u64,
    /// Heuristic scores inside (borderline_low, borderline_high) are not
    /// trusted alone and escalate to the AI refiner.
    #[serde(default = "default_borderline_low")]
    pub borderline_low: u8,
    #[serde(default = "default_borderline_high")]
    pub borderline_high: u8,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default)]
    pub questions_path: Option<PathBuf>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Web {
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_command_prefix() -> String {
    ";".to_string()
}

fn default_completion_url() -> String {
    "http://localhost:11434/api/generate".to_string()
}

fn default_model_name() -> String {
    "llama3.1".to_string()
}

fn default_daily_call_limit() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_question_timeout() -> u64 {
    600
}

fn default_borderline_low() -> u8 {
    3
}

fn default_borderline_high() -> u8 {
    8
}

fn default_cache_capacity() -> usize {
    100
}

fn default_web_port() -> u16 {
    5000
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            completion_url: default_completion_url(),
            model_name: default_model_name(),
            api_key: None,
            backup_api_key: None,
            daily_call_limit: default_daily_call_limit(),
            temperature: default_temperature(),
        }
    }
}

impl Default for Verification {
    fn default() -> Self {
        Self {
            question_timeout_seconds: default_question_timeout(),
            borderline_low: default_borderline_low(),
            borderline_high: default_borderline_high(),
            cache_capacity: default_cache_capacity(),
            questions_path: None,
        }
    }
}

impl Default for Web {
    fn default() -> Self {
        Self {
            port: default_web_port(),
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.general.discord_token.is_empty() {
            return Err(anyhow!("`general.discord_token` must not be empty"));
        }
        if self.general.server_id == 0 {
            return Err(anyhow!("`general.server_id` must be set"));
        }
        if self.verification.borderline_low >= self.verification.borderline_high {
            return Err(anyhow!(
                "`verification.borderline_low` must be below `verification.borderline_high`"
            ));
        }
        Ok(())
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.general.state_path {
            return Ok(path.clone());
        }
        dirs::home_dir()
            .map(|p| p.join(STATE_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub fn questions_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.verification.questions_path {
            return Ok(path.clone());
        }
        dirs::home_dir()
            .map(|p| p.join(QUESTIONS_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub fn threshold_band(&self) -> ThresholdBand {
        ThresholdBand {
            low: self.verification.borderline_low,
            high: self.verification.borderline_high,
        }
    }
}
