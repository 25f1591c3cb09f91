//! Command-line interface definition for StudySync
//!
//! This module defines the CLI structure using clap's derive API. Every
//! command names the acting user and the session explicitly.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// StudySync - study session scheduler
///
/// Create study sessions, collect candidate time slots from participants,
/// confirm the most popular slot and notify everyone.
#[derive(Parser, Debug, Clone)]
#[command(name = "studysync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the session database path
    #[arg(long, global = true, env = "STUDYSYNC_DB")]
    pub storage_path: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for StudySync
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Create and inspect study sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Propose candidate slots for a session (1 to 5)
    Propose {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Proposing user's email
        #[arg(short, long)]
        user: String,

        /// Candidate slot, e.g. 2025-05-01T18:00 (repeatable)
        #[arg(long = "slot", required = true)]
        slots: Vec<String>,
    },

    /// Count proposed slots and show the auto-candidate, if any
    Tally {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Confirm the final slot and notify participants
    Finalize {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Host email
        #[arg(long)]
        host: String,

        /// Accept the majority slot
        #[arg(long, conflicts_with = "slot", required_unless_present = "slot")]
        auto: bool,

        /// Pick this slot manually
        #[arg(long)]
        slot: Option<String>,
    },

    /// Share files and links
    Resource {
        #[command(subcommand)]
        command: ResourceCommand,
    },

    /// Rate sessions and view analytics
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommand,
    },
}

/// Email/password pair
#[derive(Args, Debug, Clone)]
pub struct Credentials {
    /// Account email
    #[arg(short, long)]
    pub email: String,

    /// Account password
    #[arg(short, long, env = "STUDYSYNC_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// User account subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Create an account
    Register(Credentials),
    /// Verify credentials
    Login(Credentials),
}

/// Session subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Create a session
    Create {
        /// Host email
        #[arg(long)]
        host: String,

        /// Session title
        #[arg(short, long)]
        title: String,

        /// Session details
        #[arg(short, long, default_value = "")]
        description: String,

        /// Comma-separated participant emails
        #[arg(short, long)]
        participants: String,

        /// Last day for proposals (YYYY-MM-DD)
        #[arg(long)]
        deadline: NaiveDate,
    },

    /// List sessions for a user
    List {
        /// User email
        #[arg(short, long)]
        user: String,

        /// Sessions hosted by the user instead of invitations
        #[arg(long)]
        hosted: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one session
    Show {
        /// Session id
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Resource subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ResourceCommand {
    /// Upload a file or share a link
    Share {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Sharing user's email
        #[arg(short, long)]
        user: String,

        /// File to upload
        #[arg(long, conflicts_with = "link", required_unless_present = "link")]
        file: Option<PathBuf>,

        /// Link to share
        #[arg(long)]
        link: Option<String>,
    },

    /// List resources, newest first
    List {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Feedback subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum FeedbackCommand {
    /// Rate a session
    Submit {
        /// Session id
        #[arg(short, long)]
        session: String,

        /// Rating user's email
        #[arg(short, long)]
        user: String,

        /// Rating from 1 to 5
        #[arg(short, long)]
        rating: u8,

        /// Comment
        #[arg(long, default_value = "")]
        comment: String,

        /// Session length in minutes (defaults to 60)
        #[arg(long)]
        duration: Option<u32>,
    },

    /// Show aggregated analytics
    Report {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
