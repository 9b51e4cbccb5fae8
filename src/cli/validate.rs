//! Validation command for rules files.

use crate::cli::common::{
    print_json, rule_store, CliError, CliResult, DaemonLocation, ValidationLocation,
    ValidationMessage, ValidationResponse,
};
use crate::compiler::ConfigurationCompiler;
use crate::store::RuleSetSource;
use clap::Args;
use std::path::PathBuf;

/// Validate a rules file for errors and warnings
#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Rules file (default: ~/.config/macmap/rules.toml, then /etc/macmap/rules.toml)
    #[arg(short, long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Treat warnings as errors (exit non-zero)
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub location: DaemonLocation,
}

impl ValidateArgs {
    /// Execute the validate command
    pub fn execute(&self) -> CliResult<()> {
        let config = self.location.load_config()?;
        let store = rule_store(&config, self.rules.as_deref())?;

        let response = match store.load() {
            // File unreadable or structurally invalid
            Err(e) => ValidationResponse {
                valid: false,
                rules: 0,
                errors: vec![ValidationMessage {
                    severity: "error".to_string(),
                    message: format!("{e:#}"),
                    location: None,
                }],
            },
            Ok(rules) => {
                let compiler =
                    ConfigurationCompiler::shared().map_err(|e| CliError::io(e.to_string()))?;
                let report = compiler.validate(&rules);

                let mut messages: Vec<ValidationMessage> = report
                    .errors
                    .iter()
                    .map(|error| ValidationMessage {
                        severity: "error".to_string(),
                        message: format!("{}: {}", error.kind, error.message),
                        location: Some(ValidationLocation {
                            layer: error.layer.clone(),
                            rule: error.index,
                            trigger: error.trigger.clone(),
                        }),
                    })
                    .collect();
                messages.extend(report.warnings.iter().map(|warning| ValidationMessage {
                    severity: "warning".to_string(),
                    message: warning.message.clone(),
                    location: None,
                }));

                ValidationResponse {
                    valid: report.is_valid(),
                    rules: rules.rule_count(),
                    errors: messages,
                }
            }
        };

        if self.json {
            print_json(&response)?;
        } else {
            print_human(&response, &store.path().display().to_string());
        }

        if !response.valid {
            return Err(CliError::validation("Validation failed"));
        }

        if self.strict && response.errors.iter().any(|m| m.severity == "warning") {
            return Err(CliError::validation("Warnings found in strict mode"));
        }

        Ok(())
    }
}

fn print_human(response: &ValidationResponse, source: &str) {
    if response.valid {
        println!("✓ Validation passed ({} rules in {source})", response.rules);
    } else {
        println!("✗ Validation failed ({source})");
    }

    if response.errors.is_empty() {
        return;
    }

    println!("\nIssues:");
    for msg in &response.errors {
        let prefix = if msg.severity == "error" { "  ✗" } else { "  ⚠" };
        match &msg.location {
            Some(loc) => println!(
                "{} [{} #{}] '{}': {}",
                prefix, loc.layer, loc.rule, loc.trigger, msg.message
            ),
            None => println!("{} {}", prefix, msg.message),
        }
    }
}
