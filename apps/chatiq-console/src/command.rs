//! Console input parsing

use chatiq_sync::ApiTarget;

/// Where `/api` should point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiChoice {
    Target(ApiTarget),
    Url(String),
}

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Close,
    Clear,
    Delete,
    Api(ApiChoice),
    Token(Option<String>),
    List,
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

impl Command {
    /// Plain text is sent as typed; only commands are trimmed
    pub fn parse(line: &str) -> Self {
        let Some(rest) = line.trim().strip_prefix('/') else {
            return Command::Send(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match (name, arg) {
            ("open", "") => Command::Invalid("usage: /open <conversation-id>".to_string()),
            ("open", id) => Command::Open(id.to_string()),
            ("close", _) => Command::Close,
            ("clear", _) => Command::Clear,
            ("delete", _) => Command::Delete,
            ("api", "local") => Command::Api(ApiChoice::Target(ApiTarget::Local)),
            ("api", "hosted") => Command::Api(ApiChoice::Target(ApiTarget::Hosted)),
            ("api", "") => Command::Invalid("usage: /api local|hosted|<url>".to_string()),
            ("api", url) => Command::Api(ApiChoice::Url(url.to_string())),
            ("token", "") => Command::Token(None),
            ("token", token) => Command::Token(Some(token.to_string())),
            ("list", _) => Command::List,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            (other, _) => Command::Invalid(format!("unknown command /{}", other)),
        }
    }
}

pub const HELP: &str = "\
/open <id>           open a conversation
/close               close the open conversation
/clear               clear the open conversation's history
/delete              delete the open conversation
/api local|hosted|<url>  switch the API server
/token [token]       set or forget the access token
/list                list conversations
/quit                exit
anything else        send to the open conversation";
