//! Line protocol parsing.
//!
//! The first whitespace-separated token is the command. For topic commands
//! the remaining tokens are joined with single spaces, so topic names may
//! contain spaces. File commands only take the second token.

use std::path::PathBuf;

use crate::utils::error::BrokerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    Sub(String),
    Unsub(String),
    List(String),
    Ask,
    /// Bare `trigger` broadcasts the topic summary to everyone; with a topic
    /// it notifies that topic's subscribers.
    Trigger(Option<String>),
    All,
    Clients,
    Disconnect,
    Save(PathBuf),
    Load(PathBuf),
    Exit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Sub(_) => "sub",
            Self::Unsub(_) => "unsub",
            Self::List(_) => "list",
            Self::Ask => "ask",
            Self::Trigger(_) => "trigger",
            Self::All => "all",
            Self::Clients => "clients",
            Self::Disconnect => "disconnect",
            Self::Save(_) => "save",
            Self::Load(_) => "load",
            Self::Exit => "exit",
        }
    }

    /// Commands only the operator console may run.
    pub fn is_console_only(&self) -> bool {
        matches!(self, Self::All | Self::Exit)
    }
}

/// Parses one line. Anything that is not a known command, including a blank
/// line, is `UnrecognizedCommand`.
pub fn parse(line: &str) -> Result<Command, BrokerError> {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return Err(BrokerError::UnrecognizedCommand(String::new()));
    };
    let rest: Vec<&str> = tokens.collect();

    let topic = |name: &'static str| -> Result<String, BrokerError> {
        if rest.is_empty() {
            Err(BrokerError::MissingArgument(name))
        } else {
            Ok(rest.join(" "))
        }
    };
    let file = |name: &'static str| -> Result<PathBuf, BrokerError> {
        rest.first()
            .map(|file| PathBuf::from(*file))
            .ok_or(BrokerError::MissingArgument(name))
    };

    let parsed = match command {
        "add" => Command::Add(topic("add")?),
        "remove" => Command::Remove(topic("remove")?),
        "sub" => Command::Sub(topic("sub")?),
        "unsub" => Command::Unsub(topic("unsub")?),
        "list" => Command::List(topic("list")?),
        "ask" => Command::Ask,
        "trigger" => Command::Trigger((!rest.is_empty()).then(|| rest.join(" "))),
        "all" => Command::All,
        "clients" => Command::Clients,
        "disconnect" => Command::Disconnect,
        "save" => Command::Save(file("save")?),
        "load" => Command::Load(file("load")?),
        "exit" => Command::Exit,
        _ => return Err(BrokerError::UnrecognizedCommand(line.trim().to_string())),
    };
    Ok(parsed)
}
