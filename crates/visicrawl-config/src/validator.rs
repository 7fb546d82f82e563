//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::CrawlConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &CrawlConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_target(config, &mut result);
        Self::validate_budget(config, &mut result);
        Self::validate_decision(config, &mut result);
        Self::validate_grounding(config, &mut result);
        Self::validate_executor(config, &mut result);
        Self::validate_recovery(config, &mut result);
        Self::validate_artifacts(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_target(config: &CrawlConfig, result: &mut ValidationResult) {
        if config.target.app_id.trim().is_empty() {
            result.add_error(ValidationError::new(
                "target.app_id",
                "Target application id cannot be empty",
            ));
        }

        if config.target.goal.trim().is_empty() {
            result.add_warning(ValidationWarning::new(
                "target.goal",
                "Goal is empty, the decision provider gets no direction",
            ));
        }

        if config.target.allowed_apps.contains(&config.target.app_id) {
            result.add_warning(ValidationWarning::new(
                "target.allowed_apps",
                "allowed_apps lists the target itself",
            ));
        }
    }

    fn validate_budget(config: &CrawlConfig, result: &mut ValidationResult) {
        let budget = &config.budget;

        if budget.max_steps.is_none() && budget.max_duration_secs.is_none() {
            result.add_error(ValidationError::new(
                "budget",
                "At least one of max_steps or max_duration_secs must be set",
            ));
        }

        match budget.max_steps {
            Some(0) => result.add_error(ValidationError::new(
                "budget.max_steps",
                "max_steps must be greater than 0",
            )),
            Some(steps) if steps > 10_000 => result.add_warning(ValidationWarning::new(
                "budget.max_steps",
                "max_steps is very high (>10000), this may lead to very long crawls",
            )),
            _ => {}
        }

        match budget.max_duration_secs {
            Some(0) => result.add_error(ValidationError::new(
                "budget.max_duration_secs",
                "max_duration_secs must be greater than 0",
            )),
            Some(secs) if secs > 24 * 3600 => result.add_warning(ValidationWarning::new(
                "budget.max_duration_secs",
                "max_duration_secs exceeds 24 hours",
            )),
            _ => {}
        }
    }

    fn validate_decision(config: &CrawlConfig, result: &mut ValidationResult) {
        let decision = &config.decision;

        if decision.request_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "decision.request_timeout_secs",
                "request_timeout_secs must be greater than 0",
            ));
        }

        if decision.max_retries > 2 {
            result.add_warning(ValidationWarning::new(
                "decision.max_retries",
                "More than 2 retries per decision slows down failing steps",
            ));
        }

        if decision.retry_backoff_multiplier < 1.0 {
            result.add_error(ValidationError::new(
                "decision.retry_backoff_multiplier",
                "retry_backoff_multiplier must be at least 1.0",
            ));
        }

        if decision.model.is_empty() {
            result.add_warning(ValidationWarning::new(
                "decision.model",
                "Model is not set, the adapter default will be used",
            ));
        }

        if let Some(ref url) = decision.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "decision.base_url",
                    "base_url must start with http:// or https://",
                ));
            }
        }
    }

    fn validate_grounding(config: &CrawlConfig, result: &mut ValidationResult) {
        let grounding = &config.grounding;

        if !(0.0..=1.0).contains(&grounding.min_confidence) {
            result.add_error(ValidationError::new(
                "grounding.min_confidence",
                "min_confidence must be within [0, 1]",
            ));
        }

        if grounding.row_tolerance_px > 200 {
            result.add_warning(ValidationWarning::new(
                "grounding.row_tolerance_px",
                "row_tolerance_px is very large, labels may be ordered left-to-right only",
            ));
        }

        if grounding.label_font_size <= 0.0 {
            result.add_error(ValidationError::new(
                "grounding.label_font_size",
                "label_font_size must be positive",
            ));
        }

        if let Some(ref font) = grounding.font_path {
            if !font.exists() {
                result.add_warning(ValidationWarning::new(
                    "grounding.font_path",
                    format!("Font does not exist: {:?}, the bundled label font is used instead", font),
                ));
            }
        }
    }

    fn validate_executor(config: &CrawlConfig, result: &mut ValidationResult) {
        if config.executor.settle_delay_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "executor.settle_delay_ms",
                "settle_delay_ms is 0, screenshots may capture transitions",
            ));
        }

        if config.executor.long_press_ms == 0 {
            result.add_error(ValidationError::new(
                "executor.long_press_ms",
                "long_press_ms must be greater than 0",
            ));
        }
    }

    fn validate_recovery(config: &CrawlConfig, result: &mut ValidationResult) {
        if config.recovery.max_consecutive_empty_steps == 0 {
            result.add_error(ValidationError::new(
                "recovery.max_consecutive_empty_steps",
                "max_consecutive_empty_steps must be greater than 0",
            ));
        }

        if config.hooks.timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "hooks.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_artifacts(config: &CrawlConfig, result: &mut ValidationResult) {
        let artifacts = &config.artifacts;
        if (artifacts.save_screenshots || artifacts.save_overlays)
            && artifacts.dir.as_os_str().is_empty()
        {
            result.add_error(ValidationError::new(
                "artifacts.dir",
                "Artifact directory cannot be empty when saving artifacts",
            ));
        }
    }

    fn validate_logging(config: &CrawlConfig, result: &mut ValidationResult) {
        let level = config.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, LOG_LEVELS
                ),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
