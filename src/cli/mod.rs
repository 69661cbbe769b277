use crate::error::PlayerError;
use crate::models::PlayerStatus;
use clap::{Parser, Subcommand};

pub mod status;
pub use status::StatusDisplay;

/// In-game jukebox host
#[derive(Parser)]
#[command(name = "jukebox")]
#[command(about = "Plays local files, direct audio links and YouTube audio from a queue")]
#[command(version = "0.1.0")]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Play a URL now, replacing whatever is playing
    Play {
        /// Local path, file:// URL, direct audio link or YouTube link
        url: String,
    },
    /// Toggle between playing and paused
    Pause,
    /// Skip to the next queued track
    #[command(alias = "next")]
    Skip,
    /// Stop playback; the queue is kept
    Stop,
    /// Toggle repeating the current track
    Loop,
    /// Set playback volume (0-100, out of range values are clamped)
    Volume {
        #[arg(allow_negative_numbers = true)]
        level: f32,
    },
    /// Display current player status
    Status,
    /// Show recent playback events
    Events {
        /// Number of events to show
        #[arg(default_value_t = 10)]
        count: usize,
    },
    /// List audio output devices, or choose the one used from the next start
    Devices {
        #[command(subcommand)]
        action: Option<DeviceAction>,
    },
    /// Queue management commands
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

/// Queue management subcommands
#[derive(Debug, Subcommand)]
pub enum QueueAction {
    /// Append a URL to the queue
    Add {
        url: String,
    },
    /// List queued tracks
    List,
    /// Remove every queued track
    Clear,
}

/// Output device preference subcommands
#[derive(Debug, Subcommand)]
pub enum DeviceAction {
    /// Prefer the named output device
    Use {
        name: String,
    },
    /// Go back to the system default output
    Default,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<Commands, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        if args.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        match args[0] {
            "play" => match Self::rest(&args, 1) {
                Some(url) => Ok(Commands::Play { url }),
                None => Err(ParseError::MissingArgument {
                    command: "play".to_string(),
                    argument: "url".to_string(),
                }),
            },
            "pause" | "resume" => Ok(Commands::Pause),
            "skip" | "next" => Ok(Commands::Skip),
            "stop" => Ok(Commands::Stop),
            "loop" => Ok(Commands::Loop),
            "volume" => {
                if args.len() < 2 {
                    return Err(ParseError::MissingArgument {
                        command: "volume".to_string(),
                        argument: "level".to_string(),
                    });
                }
                match args[1].parse::<f32>() {
                    Ok(level) if level.is_finite() => Ok(Commands::Volume { level }),
                    _ => Err(ParseError::InvalidArgument {
                        argument: "volume level".to_string(),
                        value: args[1].to_string(),
                        expected: "number 0-100".to_string(),
                    }),
                }
            }
            "status" => Ok(Commands::Status),
            "events" => {
                let count = match args.get(1) {
                    Some(raw) => raw.parse::<usize>().map_err(|_| ParseError::InvalidArgument {
                        argument: "event count".to_string(),
                        value: raw.to_string(),
                        expected: "positive number".to_string(),
                    })?,
                    None => 10,
                };
                Ok(Commands::Events { count })
            }
            "devices" => match args.get(1) {
                None => Ok(Commands::Devices { action: None }),
                Some(&"use") => match Self::rest(&args, 2) {
                    Some(name) => Ok(Commands::Devices {
                        action: Some(DeviceAction::Use { name }),
                    }),
                    None => Err(ParseError::MissingArgument {
                        command: "devices use".to_string(),
                        argument: "name".to_string(),
                    }),
                },
                Some(&"default") => Ok(Commands::Devices {
                    action: Some(DeviceAction::Default),
                }),
                Some(other) => Err(ParseError::UnknownCommand {
                    command: format!("devices {}", other),
                }),
            },
            "queue" => {
                if args.len() < 2 {
                    return Err(ParseError::MissingArgument {
                        command: "queue".to_string(),
                        argument: "action".to_string(),
                    });
                }
                match args[1] {
                    "add" => match Self::rest(&args, 2) {
                        Some(url) => Ok(Commands::Queue {
                            action: QueueAction::Add { url },
                        }),
                        None => Err(ParseError::MissingArgument {
                            command: "queue add".to_string(),
                            argument: "url".to_string(),
                        }),
                    },
                    "list" => Ok(Commands::Queue {
                        action: QueueAction::List,
                    }),
                    "clear" => Ok(Commands::Queue {
                        action: QueueAction::Clear,
                    }),
                    _ => Err(ParseError::UnknownCommand {
                        command: format!("queue {}", args[1]),
                    }),
                }
            }
            "help" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: args[0].to_string(),
            }),
        }
    }

    /// Remaining words joined back together, so local paths may contain spaces
    fn rest(args: &[&str], from: usize) -> Option<String> {
        if args.len() > from {
            Some(args[from..].join(" "))
        } else {
            None
        }
    }

    /// Display player status in a formatted way
    pub fn display_status(status: &PlayerStatus) {
        StatusDisplay::display_full_status(status);
    }

    /// Display error message with formatting
    pub fn display_error(error: &PlayerError) {
        StatusDisplay::display_error(error);
    }

    /// Display help information
    pub fn display_help() {
        println!("In-game Jukebox - Available Commands:");
        println!();
        println!("Playback Control:");
        println!("  play <url>      - Play now (path, file://, http(s) or YouTube link)");
        println!("  pause           - Toggle pause / resume");
        println!("  skip            - Skip to the next queued track");
        println!("  stop            - Stop playback (queue is kept)");
        println!("  loop            - Toggle repeating the current track");
        println!("  volume <0-100>  - Set volume level");
        println!();
        println!("Queue Management:");
        println!("  queue add <url>     - Add a track to the queue");
        println!("  queue list          - List queue contents");
        println!("  queue clear         - Clear queue");
        println!();
        println!("Information:");
        println!("  status          - Show current player status");
        println!("  events [n]      - Show the last n playback events");
        println!("  devices         - List audio output devices");
        println!("  devices use <name>  - Prefer an output device (applies on restart)");
        println!("  devices default     - Use the system default output");
        println!();
        println!("General:");
        println!("  help            - Show this help message");
        println!("  exit, quit      - Exit the player");
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Help requested")]
    HelpRequested,
}
