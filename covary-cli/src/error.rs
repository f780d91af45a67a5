//! Error handling for covary CLI

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for covary CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Dataset '{dataset}' is not ready: missing {missing}")]
    NotReady { dataset: String, missing: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        Self::InvalidFormat { message: message.into() }
    }

    pub fn not_ready<S: Into<String>>(dataset: S, missing: S) -> Self {
        Self::NotReady {
            dataset: dataset.into(),
            missing: missing.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Manifest entries are resolved against --data-dir or the manifest's directory",
                path.display()
            ));
        }

        CliError::InvalidFormat { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Run 'covary inspect FILE' to check the header\n\
                 • Ensure the file is not truncated",
            );
        }

        CliError::NotReady { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Depth, variant counts and one metric file must all decode\n\
                 • Re-run with -v to see per-file decode warnings",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your covary.toml configuration file\n\
                 • Use 'covary config' to print a sample configuration",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}
