use crate::config::PanelConfig;
use crate::error::PanelError;
use crate::slots::{Hand, FINGERS_PER_HAND};
use crate::types::FingerType;
use clap::{Parser, Subcommand};
use std::str::FromStr;

/// Fingerprint Panel - control panel for a remote fingerprint capture service
#[derive(Parser)]
#[command(name = "fingerprint-panel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the capture service REST API (overrides FINGERPRINT_API_BASE)
    #[arg(long)]
    pub api_base: Option<String>,

    /// WebSocket URL of the preview channel (overrides FINGERPRINT_PREVIEW_URL)
    #[arg(long)]
    pub preview_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Interactive console (default)
    Console,

    /// Print the device status and exit
    Status,
}

impl Cli {
    /// Apply command-line overrides on top of the environment
    pub fn apply(&self, config: &mut PanelConfig) {
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.trim_end_matches('/').to_string();
        }
        if let Some(preview_url) = &self.preview_url {
            config.preview_url = preview_url.clone();
        }
    }
}

pub const CONSOLE_HELP: &str = "\
Commands:
  open                 open the device and start the preview
  close                close the device
  single               capture one finger
  left [n] | right [n] capture n fingers (default 4) of one hand
  thumbs               capture both thumbs
  template             create templates from the current capture
  finger <type>        set finger type (dry, normal, wet)
  save                 save the last single capture as a bitmap
  compare [a b]        compare two templates (default: the two stored ones)
  liveness             run a liveness check
  beep [n]             beep n times (default 1)
  stop                 stop the device preview stream
  status               query the device status
  help                 show this help
  quit                 close the device and exit";

/// One line typed into the interactive console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Open,
    Close,
    Single,
    Hand { hand: Hand, expected_fingers: u8 },
    Thumbs,
    Template,
    FingerType(FingerType),
    Save,
    Compare(Option<(String, String)>),
    Liveness,
    Beep(u8),
    StopPreview,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = PanelError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(PanelError::InvalidRequest("empty command".to_string()));
        };
        let args: Vec<&str> = words.collect();

        let parsed = match (command.to_lowercase().as_str(), args.as_slice()) {
            ("open", []) => ConsoleCommand::Open,
            ("close", []) => ConsoleCommand::Close,
            ("single", []) => ConsoleCommand::Single,
            ("left", rest) => ConsoleCommand::Hand {
                hand: Hand::Left,
                expected_fingers: count_arg(rest, FINGERS_PER_HAND as u8)?,
            },
            ("right", rest) => ConsoleCommand::Hand {
                hand: Hand::Right,
                expected_fingers: count_arg(rest, FINGERS_PER_HAND as u8)?,
            },
            ("thumbs", []) => ConsoleCommand::Thumbs,
            ("template", []) => ConsoleCommand::Template,
            ("finger", [kind]) => ConsoleCommand::FingerType(kind.parse()?),
            ("save", []) => ConsoleCommand::Save,
            ("compare", []) => ConsoleCommand::Compare(None),
            ("compare", [first, second]) => {
                ConsoleCommand::Compare(Some((first.to_string(), second.to_string())))
            }
            ("liveness", []) => ConsoleCommand::Liveness,
            ("beep", rest) => ConsoleCommand::Beep(count_arg(rest, 1)?),
            ("stop", []) => ConsoleCommand::StopPreview,
            ("status", []) => ConsoleCommand::Status,
            ("help" | "?", []) => ConsoleCommand::Help,
            ("quit" | "exit", []) => ConsoleCommand::Quit,
            (other, _) => {
                return Err(PanelError::InvalidRequest(format!(
                    "unrecognized command '{}' (try 'help')",
                    other
                )))
            }
        };

        Ok(parsed)
    }
}

fn count_arg(args: &[&str], default: u8) -> Result<u8, PanelError> {
    match args {
        [] => Ok(default),
        [n] => n
            .parse()
            .map_err(|_| PanelError::InvalidRequest(format!("'{}' is not a count", n))),
        _ => Err(PanelError::InvalidRequest("too many arguments".to_string())),
    }
}
