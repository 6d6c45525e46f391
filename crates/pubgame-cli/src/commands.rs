//! Command line parsing for the `pubgame` binary.

use anyhow::{anyhow, bail, Context, Result};
use pubgame_core::realtime::DEFAULT_WS_PATH;
use pubgame_core::HttpMethod;
use serde_json::Value;

pub const USAGE: &str = "\
Usage: pubgame <command>

Commands:
  login [email]            Sign in and store the session token
  logout                   Forget the stored session
  status                   Show session and endpoint configuration
  get <path>               GET an API path and print the JSON payload
  delete <path>            DELETE an API path
  post <path> [json]       POST an optional JSON body
  put <path> [json]        PUT an optional JSON body
  listen [path]            Print realtime messages (default path /ws)
  help                     Show this message

Environment:
  PUBGAME_API_BASE, PUBGAME_WS_BASE, PUBGAME_TOKEN_BACKEND, PUBGAME_LOG_DIR, RUST_LOG";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: Option<String> },
    Logout,
    Status,
    Request {
        method: HttpMethod,
        path: String,
        body: Option<Value>,
    },
    Listen { path: String },
    Help,
}

impl Command {
    /// Parse the arguments after the program name
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let command = match args.next() {
            None | Some("help") | Some("--help") | Some("-h") => Command::Help,
            Some("login") => Command::Login {
                email: args.next().map(str::to_string),
            },
            Some("logout") => Command::Logout,
            Some("status") => Command::Status,
            Some("get") => Self::request(HttpMethod::Get, args.next(), None)?,
            Some("delete") => Self::request(HttpMethod::Delete, args.next(), None)?,
            Some("post") => Self::request(HttpMethod::Post, args.next(), args.next())?,
            Some("put") => Self::request(HttpMethod::Put, args.next(), args.next())?,
            Some("listen") => Command::Listen {
                path: args.next().unwrap_or(DEFAULT_WS_PATH).to_string(),
            },
            Some(other) => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };

        if let Some(extra) = args.next() {
            bail!("Unexpected argument: {}", extra);
        }
        Ok(command)
    }

    fn request(method: HttpMethod, path: Option<&str>, body: Option<&str>) -> Result<Self> {
        let path = path.ok_or_else(|| anyhow!("{} requires a path", method))?;
        let body = body
            .map(|raw| serde_json::from_str::<Value>(raw).context("Request body is not valid JSON"))
            .transpose()?;
        Ok(Command::Request {
            method,
            path: path.to_string(),
            body,
        })
    }
}
