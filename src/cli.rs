use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::{message::LocalId, role::Role};

#[derive(Debug, Parser)]
#[command(name = "support-chat", about = "Support chat client for the console and the storefront widget")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Customer,
    Employee,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Customer => Role::Customer,
            RoleArg::Employee => Role::Employee,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the conversation list once
    Conversations {
        #[arg(long, value_enum, default_value_t = RoleArg::Employee)]
        role: RoleArg,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the messages of one conversation once
    Messages {
        conversation_id: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Send one message as the support employee
    Send { conversation_id: i64, body: String },
    /// Run a live polling session; type `help` for commands, `q` to quit
    Watch {
        #[arg(long, value_enum, default_value_t = RoleArg::Employee)]
        role: RoleArg,
        /// Conversation to open right away (console only)
        #[arg(long)]
        conversation: Option<i64>,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Watch {
            role: RoleArg::Employee,
            conversation: None,
        })
    }
}

/// One line typed into a running `watch` session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    Quit,
    Help,
    Open,
    Close,
    Select(i64),
    Send(String),
    Resend(LocalId),
    Discard(LocalId),
    Edit(i64, String),
    Recall(i64),
    Delete(i64),
    Hide(i64),
    Dismiss(u64),
    Unknown(String),
}

pub const WATCH_HELP: &str = "commands: select <id> | send <text> | resend <local-n> | discard <local-n> \
| edit <id> <text> | recall <id> | delete <id> | hide <id> | dismiss <notice> | open | close | q";

impl WatchCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let unknown = || Self::Unknown(line.to_owned());

        let command = match verb {
            "q" | "quit" | "exit" => Self::Quit,
            "help" | "?" => Self::Help,
            "open" => Self::Open,
            "close" => Self::Close,
            "select" => rest.parse().map(Self::Select).unwrap_or_else(|_| unknown()),
            "send" if !rest.is_empty() => Self::Send(rest.to_owned()),
            "resend" => parse_local_id(rest).map(Self::Resend).unwrap_or_else(unknown),
            "discard" => parse_local_id(rest).map(Self::Discard).unwrap_or_else(unknown),
            "edit" => match rest.split_once(char::is_whitespace) {
                Some((id, body)) => id
                    .parse()
                    .map(|id| Self::Edit(id, body.trim().to_owned()))
                    .unwrap_or_else(|_| unknown()),
                None => unknown(),
            },
            "recall" => rest.parse().map(Self::Recall).unwrap_or_else(|_| unknown()),
            "delete" => rest.parse().map(Self::Delete).unwrap_or_else(|_| unknown()),
            "hide" => rest.parse().map(Self::Hide).unwrap_or_else(|_| unknown()),
            "dismiss" => rest
                .trim_start_matches('#')
                .parse()
                .map(Self::Dismiss)
                .unwrap_or_else(|_| unknown()),
            _ => unknown(),
        };

        Some(command)
    }
}

fn parse_local_id(raw: &str) -> Option<LocalId> {
    raw.strip_prefix("local-")
        .unwrap_or(raw)
        .parse()
        .ok()
        .map(LocalId)
}
