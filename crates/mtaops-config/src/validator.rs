//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, OperationsStrategy};

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

    /// Turn the first error, if any, into a [`ConfigError`].
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
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_database(config, &mut result);
        Self::validate_engine(config, &mut result);
        Self::validate_cleanup(config, &mut result);
        Self::validate_actions(config, &mut result);

        Ok(result)
    }

    fn validate_database(config: &Config, result: &mut ValidationResult) {
        if config.database.path.trim().is_empty() {
            result.add_error(ValidationError::new(
                "database.path",
                "Database path cannot be empty",
            ));
        } else if config.database.is_in_memory() {
            result.add_warning(ValidationWarning::new(
                "database.path",
                "In-memory database: operations are lost on restart",
            ));
        }
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let url = &config.engine.base_url;
        if url.is_empty() {
            result.add_error(ValidationError::new(
                "engine.base_url",
                "Engine base_url cannot be empty",
            ));
        } else if !url.starts_with("http://") && !url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "engine.base_url",
                "base_url must start with http:// or https://",
            ));
        }

        if config.engine.deletion_overall_wait_secs == 0 {
            result.add_error(ValidationError::new(
                "engine.deletion_overall_wait_secs",
                "deletion_overall_wait_secs must be greater than 0",
            ));
        }

        if config.engine.wait_points.iter().all(|w| w.trim().is_empty()) {
            result.add_error(ValidationError::new(
                "engine.wait_points",
                "At least one wait point activity id is required",
            ));
        }

        if config.engine.username.is_some() != config.engine.password.is_some() {
            result.add_warning(ValidationWarning::new(
                "engine",
                "Only one of username/password is set, requests will be sent without credentials",
            ));
        }
    }

    fn validate_cleanup(config: &Config, result: &mut ValidationResult) {
        let cleanup = &config.cleanup;

        if !cleanup.enabled {
            result.add_warning(ValidationWarning::new(
                "cleanup.enabled",
                "Scheduled cleanup is disabled, stale operations will accumulate",
            ));
        }

        let fields = cleanup.schedule.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            result.add_error(ValidationError::new(
                "cleanup.schedule",
                format!(
                    "Cron schedule must have 6 or 7 fields (seconds first), got {}",
                    fields
                ),
            ));
        }

        if cleanup.retention_days == 0 {
            result.add_error(ValidationError::new(
                "cleanup.retention_days",
                "retention_days must be greater than 0",
            ));
        } else if cleanup.retention_days < 2 {
            result.add_warning(ValidationWarning::new(
                "cleanup.retention_days",
                "Very short retention, running operations may be aborted by cleanup",
            ));
        }

        if cleanup.page_size == 0 {
            result.add_error(ValidationError::new(
                "cleanup.page_size",
                "page_size must be greater than 0",
            ));
        } else if cleanup.operations_strategy == OperationsStrategy::Active && cleanup.page_size != 100 {
            result.add_warning(ValidationWarning::new(
                "cleanup.page_size",
                "page_size only applies to historic engine data with the active strategy",
            ));
        }
    }

    fn validate_actions(config: &Config, result: &mut ValidationResult) {
        if config.actions.max_workers == 0 {
            result.add_error(ValidationError::new(
                "actions.max_workers",
                "max_workers must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
