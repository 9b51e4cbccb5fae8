//! Prints the detected platform.

use crate::cli::common::{print_json, detector, CliError, CliResult, SessionArg};
use crate::platform::PlatformFacts;
use clap::Args;
use serde::Serialize;

/// Detect the display server, desktop, compositor and architecture
#[derive(Debug, Clone, Args)]
pub struct DetectArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Assume this display server instead of detecting it
    #[arg(long, value_enum)]
    pub session: Option<SessionArg>,
}

#[derive(Debug, Serialize)]
struct DetectOutput<'a> {
    #[serde(flatten)]
    facts: &'a PlatformFacts,
    display_ready: bool,
}

impl DetectArgs {
    /// Execute the detect command
    pub fn execute(&self) -> CliResult<()> {
        let detector = detector(self.session);
        let facts = detector
            .detect()
            .map_err(|e| CliError::validation(e.to_string()))?;
        let display_ready = detector.display_ready(&facts);

        if self.json {
            return print_json(&DetectOutput {
                facts: &facts,
                display_ready,
            });
        }

        let capabilities: Vec<&str> = facts.capabilities.iter().map(String::as_str).collect();
        println!("Display server: {}", facts.display_server.as_str());
        println!("Desktop:        {}", facts.desktop_environment);
        println!("Compositor:     {}", facts.compositor);
        println!("Architecture:   {}", facts.architecture);
        println!(
            "Capabilities:   {}",
            if capabilities.is_empty() {
                "none".to_string()
            } else {
                capabilities.join(", ")
            }
        );
        println!(
            "Compatibility:  {}",
            if facts.compatibility_mode { "on" } else { "off" }
        );
        println!(
            "Display ready:  {}",
            if display_ready { "yes" } else { "no" }
        );
        Ok(())
    }
}
