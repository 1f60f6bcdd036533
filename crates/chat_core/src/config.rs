use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::paths;

/// Per-request settings handed to the generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Prepended to the history when the conversation does not start with a system message.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub generation_timeout_secs: Option<u64>,
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
}

const CONFIG_FILE_PATH: &str = "branchchat.toml";

fn default_auto_save() -> bool {
    true
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            storage_dir: None,
            generation_timeout_secs: None,
            auto_save: default_auto_save(),
        }
    }
}

impl Config {
    /// Load from `~/.branchchat/config.json`, falling back to `./branchchat.toml`,
    /// then apply `BRANCHCHAT_*` environment overrides.
    pub fn new() -> Self {
        let mut config = Self::load_from(&paths::config_json_path(), Path::new(CONFIG_FILE_PATH));
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Load from the given files without touching the environment.
    ///
    /// The JSON file wins when both exist. Unreadable or malformed files are skipped.
    pub fn load_from(json_path: &Path, toml_path: &Path) -> Self {
        if json_path.exists() {
            match std::fs::read_to_string(json_path)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<Config>(&content).map_err(|e| e.to_string())
                }) {
                Ok(config) => return config,
                Err(error) => tracing::warn!(
                    path = %json_path.display(),
                    error = %error,
                    "Config: ignoring unreadable config file"
                ),
            }
        }

        if toml_path.exists() {
            match std::fs::read_to_string(toml_path)
                .map_err(|e| e.to_string())
                .and_then(|content| toml::from_str::<Config>(&content).map_err(|e| e.to_string()))
            {
                Ok(config) => return config,
                Err(error) => tracing::warn!(
                    path = %toml_path.display(),
                    error = %error,
                    "Config: ignoring unreadable config file"
                ),
            }
        }

        Self::default()
    }

    /// Apply overrides read through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("BRANCHCHAT_MODEL") {
            self.generation.model = Some(model);
        }
        if let Some(temperature) = lookup("BRANCHCHAT_TEMPERATURE") {
            match temperature.trim().parse::<f32>() {
                Ok(value) => self.generation.temperature = Some(value),
                Err(_) => tracing::warn!(value = %temperature, "Config: invalid BRANCHCHAT_TEMPERATURE"),
            }
        }
        if let Some(max_tokens) = lookup("BRANCHCHAT_MAX_OUTPUT_TOKENS") {
            match max_tokens.trim().parse::<u32>() {
                Ok(value) => self.generation.max_output_tokens = Some(value),
                Err(_) => tracing::warn!(value = %max_tokens, "Config: invalid BRANCHCHAT_MAX_OUTPUT_TOKENS"),
            }
        }
        if let Some(prompt) = lookup("BRANCHCHAT_SYSTEM_PROMPT") {
            self.generation.system_prompt = Some(prompt);
        }
        if let Some(dir) = lookup("BRANCHCHAT_STORAGE_DIR") {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(timeout) = lookup("BRANCHCHAT_GENERATION_TIMEOUT_SECS") {
            match timeout.trim().parse::<u64>() {
                Ok(0) => self.generation_timeout_secs = None,
                Ok(value) => self.generation_timeout_secs = Some(value),
                Err(_) => tracing::warn!(value = %timeout, "Config: invalid BRANCHCHAT_GENERATION_TIMEOUT_SECS"),
            }
        }
        if let Some(auto_save) = lookup("BRANCHCHAT_AUTO_SAVE") {
            self.auto_save = parse_bool_env(&auto_save);
        }
    }

    /// Directory conversations are persisted to.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(paths::conversations_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_bool_env_true_values() {
        for value in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert!(parse_bool_env(value), "value {value:?} should be true");
        }
    }

    #[test]
    fn parse_bool_env_false_values() {
        for value in ["0", "false", "no", "off", "", "  "] {
            assert!(!parse_bool_env(value), "value {value:?} should be false");
        }
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("none.json"), &dir.path().join("none.toml"));
        assert_eq!(config, Config::default());
        assert!(config.auto_save);
    }

    #[test]
    fn toml_file_is_used_when_json_absent() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("branchchat.toml");
        std::fs::write(
            &toml_path,
            "generation_timeout_secs = 30\nauto_save = false\n\n[generation]\nmodel = \"local\"\n",
        )
        .unwrap();

        let config = Config::load_from(&dir.path().join("none.json"), &toml_path);
        assert_eq!(config.generation.model.as_deref(), Some("local"));
        assert_eq!(config.generation_timeout_secs, Some(30));
        assert!(!config.auto_save);
    }

    #[test]
    fn json_file_wins_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("config.json");
        let toml_path = dir.path().join("branchchat.toml");
        std::fs::write(&json_path, r#"{"generation": {"model": "from-json"}}"#).unwrap();
        std::fs::write(&toml_path, "[generation]\nmodel = \"from-toml\"\n").unwrap();

        let config = Config::load_from(&json_path, &toml_path);
        assert_eq!(config.generation.model.as_deref(), Some("from-json"));
    }

    #[test]
    fn malformed_json_falls_through_to_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("config.json");
        let toml_path = dir.path().join("branchchat.toml");
        std::fs::write(&json_path, "{ not json").unwrap();
        std::fs::write(&toml_path, "[generation]\nmodel = \"from-toml\"\n").unwrap();

        let config = Config::load_from(&json_path, &toml_path);
        assert_eq!(config.generation.model.as_deref(), Some("from-toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BRANCHCHAT_MODEL", "override"),
            ("BRANCHCHAT_TEMPERATURE", "0.5"),
            ("BRANCHCHAT_MAX_OUTPUT_TOKENS", "not-a-number"),
            ("BRANCHCHAT_GENERATION_TIMEOUT_SECS", "0"),
            ("BRANCHCHAT_AUTO_SAVE", "off"),
            ("BRANCHCHAT_STORAGE_DIR", "/tmp/chats"),
        ]);
        let mut config = Config {
            generation_timeout_secs: Some(10),
            ..Config::default()
        };

        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.generation.model.as_deref(), Some("override"));
        assert_eq!(config.generation.temperature, Some(0.5));
        assert_eq!(config.generation.max_output_tokens, None);
        assert_eq!(config.generation_timeout_secs, None);
        assert!(!config.auto_save);
        assert_eq!(config.storage_dir(), PathBuf::from("/tmp/chats"));
    }
}
