// Language table and grading defaults for the CodeGrade worker
use anyhow::{bail, Context, Result};
use codegrade_common::config::env_u64;
use codegrade_common::types::{ExecutionLimits, Language};
use codegrade_harness::HarnessDefaults;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/languages.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub version: String,
    /// Numeric language id understood by the execution engine
    pub engine_language_id: u32,
    #[serde(default = "default_cpu_time_limit")]
    pub cpu_time_limit: f64,
    #[serde(default = "default_memory_limit_kb")]
    pub memory_limit_kb: u64,
}

fn default_cpu_time_limit() -> f64 {
    ExecutionLimits::default().cpu_time_limit
}

fn default_memory_limit_kb() -> u64 {
    ExecutionLimits::default().memory_limit_kb
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path).context("Failed to read languages.json")?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;

        let configs = languages_json
            .languages
            .into_iter()
            .map(|lang| (lang.name.to_lowercase(), lang))
            .collect();
        Ok(Self { configs })
    }

    /// Load with default path (config/languages.json)
    pub fn load_default() -> Result<Self> {
        Self::load(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// The two languages the engine is known to run, with default limits
    pub fn builtin() -> Self {
        let limits = ExecutionLimits::default();
        let configs = [("python", "3.8.1", 71), ("java", "OpenJDK 13.0.1", 62)]
            .into_iter()
            .map(|(name, version, id)| {
                (
                    name.to_string(),
                    LanguageConfig {
                        name: name.to_string(),
                        version: version.to_string(),
                        engine_language_id: id,
                        cpu_time_limit: limits.cpu_time_limit,
                        memory_limit_kb: limits.memory_limit_kb,
                    },
                )
            })
            .collect();
        Self { configs }
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &Language) -> Option<&LanguageConfig> {
        self.configs.get(language.as_str())
    }

    pub fn engine_language_id(&self, language: &Language) -> Option<u32> {
        self.get_config(language).map(|c| c.engine_language_id)
    }

    /// Limits for a language, falling back to the global defaults
    pub fn limits(&self, language: &Language) -> ExecutionLimits {
        match self.get_config(language) {
            Some(config) => ExecutionLimits {
                cpu_time_limit: config.cpu_time_limit,
                memory_limit_kb: config.memory_limit_kb,
            },
            None => ExecutionLimits::default(),
        }
    }

    /// List all supported languages
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Defaults the grading orchestrator applies when a task leaves them open
#[derive(Debug, Clone, PartialEq)]
pub struct GradingDefaults {
    pub harness: HarnessDefaults,
    /// Test cases in flight at once against the engine
    pub max_parallel_tests: usize,
    /// Score reported when the selected test cases carry no weight
    pub zero_weight_score: f64,
}

impl Default for GradingDefaults {
    fn default() -> Self {
        Self {
            harness: HarnessDefaults::default(),
            max_parallel_tests: 1,
            zero_weight_score: 0.0,
        }
    }
}

impl GradingDefaults {
    pub fn from_env() -> Self {
        let mut defaults = Self::default();
        if let Some(n) = env_u64("GRADING_MAX_PARALLEL_TESTS") {
            defaults.max_parallel_tests = (n as usize).max(1);
        }
        if let Ok(name) = std::env::var("GRADING_DEFAULT_FUNCTION") {
            if !name.trim().is_empty() {
                defaults.harness.function_name = name.trim().to_string();
            }
        }
        defaults
    }
}
