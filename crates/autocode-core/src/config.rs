//! Configuration management for autocode
//!
//! Workspace-level settings live in `.autocode/config.toml`. Every field has a
//! default, so a missing file or a partial file both work.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{AutocodeError, Result};

/// Workspace-level autocode configuration
///
/// Loaded from `.autocode/config.toml` in the workspace root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutocodeConfig {
    /// Generative service connection
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Retry policy wrapped around every service call
    #[serde(default)]
    pub retry: RetryConfig,

    /// Session persistence
    #[serde(default)]
    pub session: SessionConfig,

    /// Where run outputs are written
    #[serde(default)]
    pub outputs: OutputConfig,

    /// Cost estimator lookup tables
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

/// Generative service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Chat completions endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Default model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable containing the bearer credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Dollar cost per 1000 tokens, used for the usage ledger
    #[serde(default = "default_cost_per_1k_tokens")]
    pub cost_per_1k_tokens: f64,

    /// Instruction sent ahead of every prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Backoff retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

/// Session persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding one JSON snapshot per session
    #[serde(default = "default_session_root")]
    pub root: PathBuf,

    /// Session identifier used when none is given
    #[serde(default = "default_session_id")]
    pub default_session: String,
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Published artifacts and timestamped snapshots
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Append-only archive of flattened context records
    #[serde(default = "default_archive_file")]
    pub archive_file: PathBuf,
}

/// Fixed lookup tables for the cost estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseDuration>,

    #[serde(default = "default_roles")]
    pub roles: Vec<RoleRate>,
}

/// Duration of one project phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDuration {
    pub name: String,
    pub weeks: u32,
}

/// Headcount and monthly salary for one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRate {
    pub role: String,
    pub headcount: u32,
    pub monthly_salary_usd: u64,
}

// Default value providers
fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.3
}

fn default_cost_per_1k_tokens() -> f64 {
    0.002
}

fn default_system_prompt() -> String {
    "You are an expert AI assistant for code planning, debugging, and development.".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_session_root() -> PathBuf {
    PathBuf::from("memory")
}

fn default_session_id() -> String {
    "latest".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_archive_file() -> PathBuf {
    PathBuf::from("outputs/context_archive.jsonl")
}

fn default_phases() -> Vec<PhaseDuration> {
    [4, 8, 8, 8, 8, 16]
        .iter()
        .enumerate()
        .map(|(idx, weeks)| PhaseDuration {
            name: format!("Phase {}", idx + 1),
            weeks: *weeks,
        })
        .collect()
}

fn default_roles() -> Vec<RoleRate> {
    [
        ("Frontend developers", 2, 5000),
        ("Backend developers", 2, 5500),
        ("Data scientists", 2, 6000),
        ("Designers", 1, 4000),
        ("QA engineers", 1, 4500),
    ]
    .iter()
    .map(|(role, headcount, salary)| RoleRate {
        role: role.to_string(),
        headcount: *headcount,
        monthly_salary_usd: *salary,
    })
    .collect()
}

impl AutocodeConfig {
    /// Load configuration from `.autocode/config.toml` or use defaults
    pub fn load_or_default(workspace_root: &Path) -> Result<Self> {
        let config_path = Self::path_in(workspace_root);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| {
                AutocodeError::Configuration(format!("Failed to parse config file: {}", e))
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.autocode/config.toml`
    pub fn write_default(workspace_root: &Path) -> Result<PathBuf> {
        let config_path = Self::path_in(workspace_root);
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(&Self::default()).map_err(|e| {
            AutocodeError::Configuration(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Location of the config file under a workspace root
    pub fn path_in(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".autocode").join("config.toml")
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            cost_per_1k_tokens: default_cost_per_1k_tokens(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root: default_session_root(),
            default_session: default_session_id(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            archive_file: default_archive_file(),
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            phases: default_phases(),
            roles: default_roles(),
        }
    }
}
