//! Configuration management for Tandem
//!
//! Supports environment variables, config files, and runtime overrides.
//! The config is an explicit value handed to the orchestrator and agent
//! runners; nothing in the crate reads ambient global state.
//!
//! Config file location: ~/.config/tandem/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{LoopError, Result};

/// Main configuration for the completeness loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// LLM backend configuration
    pub model: ModelConfig,
    /// Loop bounds and timeouts
    #[serde(default, rename = "loop")]
    pub limits: LoopLimits,
    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,
}

/// LLM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend preset: "mistral", "ollama", "lm-studio", or "command"
    pub backend: String,
    /// Model name passed to the backend
    pub name: String,
    /// Base URL override for OpenAI-compatible backends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Command line for the subprocess backend (backend = "command")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum output tokens per generation
    pub max_output_tokens: u32,
}

/// Bounds and timeouts for the loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopLimits {
    /// Maximum cycles before the loop stops without completion
    pub max_cycles: u32,
    /// Maximum tool-calling iterations per implementer run
    pub implementer_max_iterations: u32,
    /// Maximum tool-calling iterations per reviewer run
    pub reviewer_max_iterations: u32,
    /// Hard timeout per tool call in seconds
    pub tool_timeout_secs: u64,
    /// Timeout per test-runner attempt in seconds
    pub test_timeout_secs: u64,
}

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Name of the original specification file inside the workspace
    pub spec_file_name: String,
    /// Maximum file tree depth
    pub max_tree_depth: usize,
    /// Number of commits shown in the reviewer's git log
    pub git_log_count: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            limits: LoopLimits::default(),
            context: ContextConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: env::var("TANDEM_BACKEND").unwrap_or_else(|_| "mistral".to_string()),
            name: env::var("TANDEM_MODEL").unwrap_or_else(|_| "devstral-small-latest".to_string()),
            base_url: None,
            api_key_env: None,
            command: None,
            timeout_secs: 120,
            max_output_tokens: 4096,
        }
    }
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_cycles: 50,
            implementer_max_iterations: 20,
            reviewer_max_iterations: 10,
            tool_timeout_secs: 30,
            test_timeout_secs: 60,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            spec_file_name: "idea.md".to_string(),
            max_tree_depth: 10,
            git_log_count: 10,
        }
    }
}

impl LoopConfig {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tandem")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(LoopError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| LoopError::config(format!("Failed to read config: {}", e)))?;

        let config: LoopConfig = toml::from_str(&content)
            .map_err(|e| LoopError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to the given path (or the default location)
    pub fn save(&self, path: Option<&std::path::Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let dir = Self::config_dir();
                if !dir.exists() {
                    fs::create_dir_all(&dir).map_err(|e| {
                        LoopError::config(format!("Failed to create config dir: {}", e))
                    })?;
                }
                Self::config_file()
            }
        };

        let content = toml::to_string_pretty(self)
            .map_err(|e| LoopError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| LoopError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&LoopConfig::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

impl ModelConfig {
    /// Resolve the base URL for the configured backend preset
    pub fn resolved_base_url(&self) -> String {
        if let Some(ref url) = self.base_url {
            return url.clone();
        }
        match self.backend.as_str() {
            "ollama" => "http://localhost:11434/v1".to_string(),
            "lm-studio" => "http://localhost:1234/v1".to_string(),
            _ => "https://api.mistral.ai/v1".to_string(),
        }
    }

    /// Resolve the API key for the configured backend preset
    ///
    /// Local servers don't check the key but often require a non-empty
    /// bearer header, so a placeholder is returned for them.
    pub fn resolved_api_key(&self) -> String {
        if let Some(ref var) = self.api_key_env {
            if let Ok(key) = env::var(var) {
                return key;
            }
        }
        match self.backend.as_str() {
            "ollama" => "ollama".to_string(),
            "lm-studio" => "lm-studio".to_string(),
            _ => env::var("MISTRAL_API_KEY").unwrap_or_else(|_| "dummy".to_string()),
        }
    }
}
