use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::token::{TokenSize, DEFAULT_DASH_SPLIT_EACH};

/// privateurl: single-use action links
#[derive(Parser)]
#[command(name = "privateurl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides PRIVATEURL_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep urls in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Create a private url
    Create {
        #[arg(long)]
        action: String,
        #[arg(long)]
        owner: Option<Uuid>,
        #[arg(long)]
        expire_in_secs: Option<i64>,
        /// 0 = unlimited
        #[arg(long, default_value_t = 1)]
        usage_limit: u32,
        #[arg(long)]
        auto_delete: bool,
        /// Drop the owner's previous urls for this action
        #[arg(long)]
        replace: bool,
        /// JSON payload stored with the url
        #[arg(long)]
        payload: Option<String>,
        #[arg(long, help = "Token length: N or MIN,MAX", value_parser = parse_token_size)]
        token_size: Option<TokenSize>,
        #[arg(long, default_value_t = DEFAULT_DASH_SPLIT_EACH, allow_hyphen_values = true)]
        dash_split_each: i64,
    },

    /// Look up a private url without using it
    Show {
        #[arg(long)]
        action: String,
        #[arg(long)]
        token: String,
    },

    /// Delete a private url
    Revoke {
        #[arg(long)]
        id: Uuid,
    },

    /// Delete expired urls flagged for auto-delete
    PurgeExpired {
        /// Delete every expired url, not only auto-delete ones
        #[arg(long)]
        all: bool,
    },
}

/// `"50"` -> fixed, `"36,60"` -> bounds (validated later by the generator).
pub fn parse_token_size(raw: &str) -> Result<TokenSize, String> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid token size '{}': {}", raw, e))?;

    Ok(match parts.as_slice() {
        [n] => TokenSize::Fixed(*n),
        [min, max] => TokenSize::Range(*min, *max),
        _ => TokenSize::Bounds(parts),
    })
}
