//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::CrawlConfig;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<CrawlConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<CrawlConfig, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let mut config: CrawlConfig = toml::from_str(&expanded)?;
        Self::expand_paths(&mut config);
        Ok(config)
    }

    /// Default config location: `<config dir>/visicrawl/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("visicrawl").join("config.toml"))
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.visicrawl`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }

    fn expand_path_buf(path: &Path) -> PathBuf {
        match path.to_str() {
            Some(s) => PathBuf::from(Self::expand_path(s)),
            None => path.to_path_buf(),
        }
    }

    fn expand_paths(config: &mut CrawlConfig) {
        config.artifacts.dir = Self::expand_path_buf(&config.artifacts.dir);
        if let Some(dir) = config.logging.dir.as_mut() {
            *dir = Self::expand_path_buf(dir);
        }
        if let Some(font) = config.grounding.font_path.as_mut() {
            *font = Self::expand_path_buf(font);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert!(config.budget.max_steps.is_none());
        assert_eq!(config.decision.max_retries, 2);
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [target]
            app_id = "com.example.shop"
            goal = "Find the login screen and sign in"
            allowed_apps = ["com.google.android.gms"]

            [budget]
            max_steps = 25
            max_duration_secs = 600
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.target.app_id, "com.example.shop");
        assert_eq!(config.target.allowed_apps.len(), 1);
        assert_eq!(config.budget.max_steps, Some(25));
        assert_eq!(config.budget.max_duration_secs, Some(600));
    }

    #[test]
    fn test_load_decision_extra() {
        let content = r#"
            [decision]
            provider = "vision"
            model = "large"
            base_url = "https://api.example.com"

            [decision.extra]
            temperature = 0.2
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.decision.provider, "vision");
        assert_eq!(config.decision.extra["temperature"], serde_json::json!(0.2));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[executor]").unwrap();
        writeln!(file, "settle_delay_ms = 250").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.executor.settle_delay_ms, 250);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/crawl.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only variable with a unique name
        unsafe {
            std::env::set_var("VISICRAWL_TEST_API_KEY", "secret-value");
        }
        let content = r#"
            [decision]
            api_key = "${VISICRAWL_TEST_API_KEY}"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.decision.api_key.as_deref(), Some("secret-value"));
        unsafe {
            std::env::remove_var("VISICRAWL_TEST_API_KEY");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${NONEXISTENT_VISICRAWL_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = ConfigLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
    }

    #[test]
    fn test_paths_are_expanded_on_load() {
        let content = r#"
            [artifacts]
            dir = "~/crawls"

            [logging]
            dir = "~/logs"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert!(!config.artifacts.dir.starts_with("~"));
        assert!(config.artifacts.dir.ends_with("crawls"));
        assert!(!config.logging.dir.unwrap().starts_with("~"));
    }

    #[test]
    fn test_default_path_file_name() {
        if let Some(path) = ConfigLoader::default_path() {
            assert!(path.ends_with("visicrawl/config.toml"));
        }
    }
}
