use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::api::models::BidStatus;
use crate::discovery::{ProjectFilter, SortKey};

#[derive(Debug, Parser)]
#[command(name = "tradeboard", version, about = "Bids, project discovery and job-site chat from the terminal")]
pub struct Cli {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Save the backend address and credentials
    Login(LoginArgs),
    /// Show the current settings and check the backend is reachable
    Status,
    /// Print the conversation list
    Conversations,
    /// Interactive chat session
    Chat {
        /// Conversation to open right away
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Manage your bids
    Bids {
        #[command(subcommand)]
        action: BidsCommand,
    },
    /// Browse open projects
    Projects(ProjectArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub api_url: String,
    /// Defaults to the API host with a ws(s) scheme
    #[arg(long)]
    pub socket_url: Option<String>,
    #[arg(long, conflicts_with = "email")]
    pub token: Option<String>,
    #[arg(long, requires = "password")]
    pub email: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub user_id: Option<String>,
    /// Do not keep a local copy of the conversation list
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Subcommand)]
pub enum BidsCommand {
    List {
        #[arg(long)]
        status: Option<BidStatus>,
    },
    Show {
        id: String,
    },
    /// Create a bid from a TOML draft and submit it
    Submit {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace the line items of a draft bid
    EditItems {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Submit a bid that was left as a draft
    Finalize {
        id: String,
    },
    Withdraw {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Text to look for in titles and descriptions
    #[arg(long, short)]
    pub query: Option<String>,
    /// Repeatable
    #[arg(long = "trade")]
    pub trades: Vec<String>,
    #[arg(long)]
    pub min_budget: Option<f64>,
    #[arg(long)]
    pub max_budget: Option<f64>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub nigp: Option<String>,
    /// deadline, newest, budget-high or budget-low
    #[arg(long, default_value = "deadline")]
    pub sort: SortKey,
    #[arg(long)]
    pub include_closed: bool,
}

impl ProjectArgs {
    pub fn filter(&self) -> ProjectFilter {
        ProjectFilter {
            query: self.query.clone(),
            trades: self.trades.clone(),
            min_budget: self.min_budget,
            max_budget: self.max_budget,
            location: self.location.clone(),
            nigp_prefix: self.nigp.clone(),
            include_closed: self.include_closed,
        }
    }
}
