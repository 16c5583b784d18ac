//! Configuration file management for proofpilot.
//!
//! Provides a TOML-based config file at `~/.config/proofpilot/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use proofpilot_core::config::AgentConfig;
use proofpilot_core::model::openai::OpenAiCompatSettings;
use proofpilot_core::model::{ModelRegistry, ModelRole, ModelRoles, OpenAiCompatModel};

pub const DEFAULT_PROJECT_URL: &str = "http://localhost:8000/rest/document";
pub const DEFAULT_TOOLS_URL: &str = "http://localhost:3001/mcp";
pub const DEFAULT_PROFILE: &str = "default";

pub const PROJECT_URL_ENV: &str = "PROOFPILOT_PROJECT_URL";
pub const TOOLS_URL_ENV: &str = "PROOFPILOT_TOOLS_URL";

// -----------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown role {0:?} in [roles]")]
    UnknownRole(String),

    #[error("role {role} refers to undefined model profile {profile:?}")]
    UnknownProfile { role: String, profile: String },

    #[error("model profile {profile:?} needs an API key in ${var}, which is not set")]
    MissingApiKey { profile: String, var: String },
}

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub services: ServicesSection,
    /// Model profiles by name.
    pub models: BTreeMap<String, ModelProfile>,
    pub roles: RolesSection,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesSection {
    pub project_url: Option<String>,
    pub tools_url: Option<String>,
    /// Per-request timeout for both services. Unset waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

/// An OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub base_url: String,
    pub model: String,
    /// Name of the env var holding the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: Some(0.0),
            max_tokens: None,
            timeout_secs: None,
        }
    }
}

/// Which profile each role uses. `default` covers every role not listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesSection {
    #[serde(default = "default_profile_name")]
    pub default: String,
    #[serde(flatten)]
    pub assignments: BTreeMap<String, String>,
}

impl Default for RolesSection {
    fn default() -> Self {
        Self {
            default: default_profile_name(),
            assignments: BTreeMap::new(),
        }
    }
}

fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}

impl ConfigFile {
    /// The file written by `proofpilot init`.
    pub fn starter() -> Self {
        Self {
            services: ServicesSection {
                project_url: Some(DEFAULT_PROJECT_URL.to_string()),
                tools_url: Some(DEFAULT_TOOLS_URL.to_string()),
                request_timeout_secs: None,
            },
            models: BTreeMap::from([(DEFAULT_PROFILE.to_string(), ModelProfile::default())]),
            roles: RolesSection::default(),
            agent: AgentConfig::default(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the proofpilot config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/proofpilot` or
/// `~/.config/proofpilot`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("proofpilot");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("proofpilot")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. `Ok(None)` if there is none.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ProofPilotConfig {
    pub project_url: String,
    pub tools_url: String,
    pub request_timeout: Option<Duration>,
    pub models: BTreeMap<String, ModelProfile>,
    pub default_profile: String,
    pub role_assignments: HashMap<ModelRole, String>,
    pub agent: AgentConfig,
}

impl ProofPilotConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// - project URL: `cli_project_url` > `PROOFPILOT_PROJECT_URL` > `services.project_url` > [`DEFAULT_PROJECT_URL`]
    /// - tools URL: `cli_tools_url` > `PROOFPILOT_TOOLS_URL` > `services.tools_url` > [`DEFAULT_TOOLS_URL`]
    /// - models: `[models]` from the file, or a single `default` profile
    pub fn resolve(cli_project_url: Option<&str>, cli_tools_url: Option<&str>) -> Result<Self> {
        let file = load_config()?.unwrap_or_default();
        Self::from_file(file, cli_project_url, cli_tools_url)
    }

    pub fn from_file(
        file: ConfigFile,
        cli_project_url: Option<&str>,
        cli_tools_url: Option<&str>,
    ) -> Result<Self> {
        let project_url = pick(
            cli_project_url,
            PROJECT_URL_ENV,
            file.services.project_url.as_deref(),
            DEFAULT_PROJECT_URL,
        );
        let tools_url = pick(
            cli_tools_url,
            TOOLS_URL_ENV,
            file.services.tools_url.as_deref(),
            DEFAULT_TOOLS_URL,
        );

        let mut models = file.models;
        if models.is_empty() {
            models.insert(DEFAULT_PROFILE.to_string(), ModelProfile::default());
        }

        let mut role_assignments = HashMap::new();
        for (role, profile) in file.roles.assignments {
            let parsed: ModelRole = role
                .parse()
                .map_err(|_| ConfigError::UnknownRole(role.clone()))?;
            if !models.contains_key(&profile) {
                return Err(ConfigError::UnknownProfile { role, profile }.into());
            }
            role_assignments.insert(parsed, profile);
        }
        if !models.contains_key(&file.roles.default) {
            return Err(ConfigError::UnknownProfile {
                role: "default".to_string(),
                profile: file.roles.default,
            }
            .into());
        }

        Ok(Self {
            project_url,
            tools_url,
            request_timeout: file.services.request_timeout_secs.map(Duration::from_secs),
            models,
            default_profile: file.roles.default,
            role_assignments,
            agent: file.agent,
        })
    }

    /// Profiles some role actually uses.
    fn used_profiles(&self) -> BTreeSet<&str> {
        self.role_assignments
            .values()
            .map(String::as_str)
            .chain(std::iter::once(self.default_profile.as_str()))
            .collect()
    }

    /// Instantiate every used model profile.
    pub fn build_registry(&self) -> Result<ModelRegistry> {
        let mut registry = ModelRegistry::new();
        for name in self.used_profiles() {
            let Some(profile) = self.models.get(name) else {
                continue;
            };
            let api_key = match &profile.api_key_env {
                Some(var) => Some(std::env::var(var).map_err(|_| ConfigError::MissingApiKey {
                    profile: name.to_string(),
                    var: var.clone(),
                })?),
                None => None,
            };
            let model = OpenAiCompatModel::new(OpenAiCompatSettings {
                name: name.to_string(),
                base_url: profile.base_url.clone(),
                model: profile.model.clone(),
                api_key,
                temperature: profile.temperature,
                max_tokens: profile.max_tokens,
                timeout: profile.timeout_secs.map(Duration::from_secs),
            })
            .with_context(|| format!("failed to build model profile {name}"))?;
            registry.register(model);
        }
        Ok(registry)
    }

    pub fn build_roles(&self) -> Result<ModelRoles> {
        let registry = self.build_registry()?;
        tracing::debug!(models = ?registry.list(), "model profiles loaded");
        let roles = ModelRoles::resolve(&registry, &self.role_assignments, &self.default_profile)?;
        Ok(roles)
    }
}

fn pick(cli: Option<&str>, env_var: &str, file: Option<&str>, default: &str) -> String {
    if let Some(v) = cli {
        v.to_string()
    } else if let Ok(v) = std::env::var(env_var) {
        v
    } else if let Some(v) = file {
        v.to_string()
    } else {
        default.to_string()
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
