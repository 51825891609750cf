//! # MANA CLI Module
//!
//! Facilitator commands over the same workspace the server uses.
//!
//! ## Available Commands
//!
//! - `init` - Create an assessment and its workshop catalog
//! - `server` - Start the HTTP server
//! - `assessments` - List assessments (the default)
//! - `register` - Register one participant
//! - `import` - Import a roster file (CSV or JSON)
//! - `advance` - Advance a whole cohort to a workshop
//! - `reconcile` - Snap current positions to the cohort ceiling
//! - `complete` / `unlock` / `reset` - Per-participant overrides
//! - `progress` - One participant's progress
//! - `summary` - Cohort progress for an assessment
//! - `logs` - A participant's access log

mod commands;

use crate::config::{Backend, ManaConfig};
use clap::{Parser, Subcommand};
use mana_core::ManaError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// MANA - cohort-paced workshop access server
///
/// Facilitators open workshops for a whole cohort; participants work
/// through them in order and cannot run ahead.
#[derive(Parser, Debug)]
#[command(name = "mana")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "MANA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides the configuration file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "file" (snapshot file)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Number of workshop stages, 1 to 6
    #[arg(long, global = true)]
    pub stages: Option<usize>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create an assessment and its workshop catalog
    Init {
        /// Assessment title
        #[arg(short, long, default_value = "MANA Assessment")]
        title: String,
    },

    /// List assessments
    Assessments,

    /// Register one participant
    Register {
        /// Assessment id
        #[arg(short, long)]
        assessment: u64,

        /// Email address (login name)
        #[arg(short, long)]
        email: String,

        /// Full name
        #[arg(short, long, default_value = "Participant")]
        name: String,

        /// Stakeholder type token (e.g. farmer, women_leader)
        #[arg(short, long, default_value = "other")]
        stakeholder: String,

        /// Organization or business name
        #[arg(short, long, default_value = "")]
        organization: String,

        /// Province
        #[arg(long)]
        province: Option<String>,
    },

    /// Import a roster file
    Import {
        /// Assessment id
        #[arg(short, long)]
        assessment: u64,

        /// Roster file path
        #[arg(short, long)]
        input: PathBuf,

        /// Roster format (csv, json); inferred from the extension when omitted
        #[arg(short = 't', long)]
        format: Option<String>,
    },

    /// Advance every participant of an assessment to a workshop
    Advance {
        /// Assessment id
        #[arg(short, long)]
        assessment: u64,

        /// Workshop token (workshop_1 .. workshop_6)
        #[arg(short, long)]
        workshop: String,

        /// Facilitator name recorded in the access log
        #[arg(long, default_value = "facilitator")]
        actor: String,
    },

    /// Move every current position up to the cohort ceiling
    Reconcile {
        /// Assessment id
        #[arg(short, long)]
        assessment: u64,
    },

    /// Mark a workshop complete for one participant
    Complete {
        /// Participant id
        #[arg(short, long)]
        participant: u64,

        /// Workshop token
        #[arg(short, long)]
        workshop: String,
    },

    /// Unlock a workshop for one participant, ignoring the cohort ceiling
    Unlock {
        /// Participant id
        #[arg(short, long)]
        participant: u64,

        /// Workshop token
        #[arg(short, long)]
        workshop: String,

        /// Facilitator name recorded in the access log
        #[arg(long, default_value = "facilitator")]
        actor: String,
    },

    /// Clear a participant's completions and return them to the first stage
    Reset {
        /// Participant id
        #[arg(short, long)]
        participant: u64,

        /// Facilitator name recorded in the access log
        #[arg(long, default_value = "facilitator")]
        actor: String,
    },

    /// Show one participant's progress
    Progress {
        /// Participant id
        #[arg(short, long)]
        participant: u64,
    },

    /// Show cohort progress for an assessment
    Summary {
        /// Assessment id
        #[arg(short, long)]
        assessment: u64,
    },

    /// Show a participant's access log
    Logs {
        /// Participant id
        #[arg(short, long)]
        participant: u64,
    },
}

// =============================================================================
// CONFIGURATION RESOLUTION
// =============================================================================

/// Configuration file and environment, then command-line overrides.
pub fn resolve_config(cli: &Cli) -> Result<ManaConfig, ManaError> {
    let mut config = ManaConfig::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.storage.path.clone_from(database);
    }
    if let Some(backend) = &cli.backend {
        config.storage.backend = Backend::parse(backend)?;
    }
    if let Some(stages) = cli.stages {
        config.workshops.stages = stages;
    }
    config.validate()?;
    Ok(config)
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), ManaError> {
    let mut config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::debug!(
            storage = ?config.storage,
            workshops = config.workshops.stages,
            "resolved configuration"
        );
    }

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Init { title }) => cmd_init(&config, json_mode, &title),
        Some(Commands::Assessments) | None => cmd_assessments(&config, json_mode),
        Some(Commands::Register {
            assessment,
            email,
            name,
            stakeholder,
            organization,
            province,
        }) => cmd_register(
            &config,
            json_mode,
            assessment,
            mana_core::Registration {
                username: email,
                full_name: name,
                stakeholder_type: mana_core::StakeholderType::parse_or_other(&stakeholder),
                organization,
                province,
            },
        ),
        Some(Commands::Import {
            assessment,
            input,
            format,
        }) => cmd_import(&config, json_mode, assessment, &input, format.as_deref()),
        Some(Commands::Advance {
            assessment,
            workshop,
            actor,
        }) => cmd_advance(&config, json_mode, assessment, &workshop, &actor),
        Some(Commands::Reconcile { assessment }) => cmd_reconcile(&config, json_mode, assessment),
        Some(Commands::Complete {
            participant,
            workshop,
        }) => cmd_complete(&config, json_mode, participant, &workshop),
        Some(Commands::Unlock {
            participant,
            workshop,
            actor,
        }) => cmd_unlock(&config, json_mode, participant, &workshop, &actor),
        Some(Commands::Reset { participant, actor }) => {
            cmd_reset(&config, json_mode, participant, &actor)
        }
        Some(Commands::Progress { participant }) => cmd_progress(&config, json_mode, participant),
        Some(Commands::Summary { assessment }) => cmd_summary(&config, json_mode, assessment),
        Some(Commands::Logs { participant }) => cmd_logs(&config, json_mode, participant),
    }
}
