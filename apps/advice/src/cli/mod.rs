//! # Advice CLI Module
//!
//! This module implements the CLI interface for the Advice Taker.
//!
//! ## Available Commands
//!
//! - `status` - Show the loaded world
//! - `actions` - List immediate conclusions for the agent
//! - `plan` - Search for a plan that brings the agent to the goal
//! - `query` - Evaluate a relational pattern such as `at(?x, home)`
//! - `dump` - Write the world state as JSON or binary snapshot
//! - `init` - Write the built-in world as an editable TOML file

mod commands;

use advice_core::AdviceError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Advice Taker - common-sense planning over relational facts
///
/// Loads a world of entities and located facts, derives what the agent can
/// do, and searches for a sequence of actions that reaches the goal.
#[derive(Parser, Debug)]
#[command(name = "advice")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML world file (defaults to the built-in scenario)
    #[arg(short, long, global = true)]
    pub world: Option<PathBuf>,

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
    /// Show the loaded world
    Status,

    /// List the actions the agent can take right now
    Actions {
        /// Agent name (defaults to the world's agent)
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Search for a plan
    Plan {
        /// Agent name (defaults to the world's agent)
        #[arg(short, long)]
        agent: Option<String>,

        /// Goal location name (defaults to the world's goal)
        #[arg(short, long)]
        goal: Option<String>,

        /// Maximum plan length
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// Maximum number of node expansions
        #[arg(long)]
        max_expansions: Option<usize>,

        /// Apply the plan and print the resulting locations
        #[arg(long)]
        commit: bool,
    },

    /// Evaluate a pattern like `at(?thing, United States)`
    Query {
        /// Pattern text: relation(subject, object), `?name` for variables
        pattern: String,
    },

    /// Dump the world state
    Dump {
        /// Output file path (stdout if omitted, JSON only)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dump format (json, binary)
        #[arg(short = 't', long, default_value = "json")]
        format: String,
    },

    /// Write the built-in world as a TOML file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "world.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), AdviceError> {
    let world_path = cli.world.as_deref();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Status) | None => cmd_status(world_path, json_mode),
        Some(Commands::Actions { agent }) => cmd_actions(world_path, json_mode, agent.as_deref()),
        Some(Commands::Plan {
            agent,
            goal,
            max_depth,
            max_expansions,
            commit,
        }) => cmd_plan(
            world_path,
            json_mode,
            &PlanOptions {
                agent,
                goal,
                max_depth,
                max_expansions,
                commit,
                verbose: cli.verbose,
            },
        ),
        Some(Commands::Query { pattern }) => cmd_query(world_path, json_mode, &pattern),
        Some(Commands::Dump { output, format }) => {
            cmd_dump(world_path, output.as_deref(), &format)
        }
        Some(Commands::Init { output, force }) => cmd_init(&output, force),
    }
}
