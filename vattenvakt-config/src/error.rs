//! Error types for configuration loading and validation

use std::path::PathBuf;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] Box<figment::Error>),

    /// Fields that are valid on their own but contradict each other.
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    use std::fmt::Write;

    let mut output = String::new();
    for (field, errors) in errors.field_errors() {
        let _ = writeln!(output, "Field '{}':", field);
        for error in errors {
            let message = match &error.message {
                Some(msg) => msg.to_string(),
                None => error.code.to_string(),
            };
            let _ = writeln!(output, "  - {}", message);
        }
    }
    for (section, nested) in errors.errors() {
        match nested {
            validator::ValidationErrorsKind::Struct(inner) => {
                let _ = write!(output, "In '{}':\n{}", section, format_validation_errors(inner));
            }
            validator::ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    let _ = write!(
                        output,
                        "In '{}[{}]':\n{}",
                        section,
                        index,
                        format_validation_errors(inner)
                    );
                }
            }
            validator::ValidationErrorsKind::Field(_) => {}
        }
    }
    output
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::Parsing(Box::new(error))
    }
}
