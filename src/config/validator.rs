// Config validation
// A judge must refuse to start with limits that cannot be enforced.

use crate::config::types::{JudgeError, Result, SecurityConfig};

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a configuration. Errors are fatal, warnings are logged.
pub fn validate_config(config: &SecurityConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_limits(config, &mut result);
    validate_capabilities(config, &mut result);
    validate_paths(config, &mut result);

    for warning in &result.warnings {
        log::warn!("Config warning: {}", warning);
    }

    if !result.is_valid() {
        return Err(JudgeError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_limits(config: &SecurityConfig, result: &mut ValidationResult) {
    if !config.max_execution_time.is_finite() || config.max_execution_time <= 0.0 {
        result.add_error(format!(
            "max_execution_time must be a positive number of seconds, got {}",
            config.max_execution_time
        ));
    } else if config.max_execution_time > 300.0 {
        result.add_warning(format!(
            "max_execution_time {}s is unusually long for a judge",
            config.max_execution_time
        ));
    }

    if !config.timeout_grace.is_finite() || config.timeout_grace < 0.0 {
        result.add_error(format!(
            "timeout_grace must be zero or positive, got {}",
            config.timeout_grace
        ));
    }

    if config.max_memory_mb == 0 {
        result.add_error("max_memory_mb cannot be zero".to_string());
    } else if config.max_memory_mb < 32 {
        result.add_warning(format!(
            "max_memory_mb {} is very low; the interpreter may fail to start",
            config.max_memory_mb
        ));
    }

    if config.max_output_size == 0 {
        result.add_error("max_output_size cannot be zero".to_string());
    }

    if config.max_recursion_depth < 50 {
        result.add_error(format!(
            "max_recursion_depth must be at least 50, got {}",
            config.max_recursion_depth
        ));
    }

    if config.max_code_size == 0 {
        result.add_error("max_code_size cannot be zero".to_string());
    }

    if config.entry_points.is_empty() {
        result.add_error("entry_points must name at least one function".to_string());
    }
    for name in &config.entry_points {
        let valid = !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c == '_' || c.is_ascii_alphanumeric());
        if !valid {
            result.add_error(format!("entry point {:?} is not a valid identifier", name));
        }
    }
}

fn validate_capabilities(config: &SecurityConfig, result: &mut ValidationResult) {
    if config.allow_subprocess {
        result.add_warning(
            "allow_subprocess admits os/subprocess; only process-group termination contains children"
                .to_string(),
        );
    }
    if config.allow_network {
        result.add_warning(
            "allow_network admits socket modules; no network namespace is applied".to_string(),
        );
    }
}

fn validate_paths(config: &SecurityConfig, result: &mut ValidationResult) {
    if !config.workspace_root.is_absolute() {
        result.add_error(format!(
            "workspace_root must be an absolute path: {:?}",
            config.workspace_root
        ));
    }

    if config.python_executable.as_os_str().is_empty() {
        result.add_error("python_executable cannot be empty".to_string());
    }
}
