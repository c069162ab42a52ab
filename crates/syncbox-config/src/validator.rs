//! Configuration validation.

use url::Url;

use crate::schema::Config;

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

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

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
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
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_queue(config, &mut result);
        Self::validate_delivery(config, &mut result);
        Self::validate_connectivity(config, &mut result);
        Self::validate_notify(config, &mut result);

        result
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        if config.queue.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "queue.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        if config.queue.max_attempts > 100 {
            result.add_warning(ValidationWarning::new(
                "queue.max_attempts",
                "max_attempts is very high (>100), failing entries will linger",
            ));
        }

        if config.queue.db_path.as_os_str().is_empty() {
            result.add_error(ValidationError::new("queue.db_path", "db_path cannot be empty"));
        }
    }

    fn validate_delivery(config: &Config, result: &mut ValidationResult) {
        Self::check_http_url("delivery.base_url", &config.delivery.base_url, result);

        if config.delivery.timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "delivery.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_connectivity(config: &Config, result: &mut ValidationResult) {
        match config.connectivity.probe_url {
            Some(ref url) => Self::check_http_url("connectivity.probe_url", url, result),
            None => result.add_warning(ValidationWarning::new(
                "connectivity.probe_url",
                "probe_url is not set, the device is assumed to be online",
            )),
        }

        if config.connectivity.probe_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "connectivity.probe_interval_secs",
                "probe_interval_secs must be greater than 0",
            ));
        }

        if config.connectivity.probe_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "connectivity.probe_timeout_secs",
                "probe_timeout_secs must be greater than 0",
            ));
        }

        if config.connectivity.probe_timeout_secs >= config.connectivity.probe_interval_secs {
            result.add_warning(ValidationWarning::new(
                "connectivity.probe_timeout_secs",
                "probe timeout is not shorter than the probe interval",
            ));
        }
    }

    fn validate_notify(config: &Config, result: &mut ValidationResult) {
        if let Some(url) = config.notify.webhook() {
            Self::check_http_url("notify.webhook_url", url, result);
        }

        if config.notify.timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "notify.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }
    }

    fn check_http_url(path: &str, value: &str, result: &mut ValidationResult) {
        match Url::parse(value) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(_) => result.add_error(ValidationError::new(
                path,
                "URL must start with http:// or https://",
            )),
            Err(e) => result.add_error(ValidationError::new(path, format!("invalid URL: {}", e))),
        }
    }
}
