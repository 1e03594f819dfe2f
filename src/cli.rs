use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "podsight", about = "Podcast and video analytics backend", version)]
pub struct Args {
    /// Data directory. Defaults to PODSIGHT_BASE_PATH or ~/.local/share/podsight
    #[arg(long, global = true)]
    pub base_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the analytics API server
    Daemon {},

    /// Fetch source metadata for a URL and print it as JSON
    Fetch { url: String },

    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create an account, prompting for the password
    Add {
        email: String,
        username: String,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },
}
