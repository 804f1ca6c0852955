//! User commands: parsing and dispatch.

pub mod dispatch;

pub use dispatch::Dispatcher;

use std::str::FromStr;

use crate::common::errors::CommandError;

/// Every command a front-end can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Queue the first search hit. `now` puts it at the front.
    Play { query: String, now: bool },
    /// Queue a locator as is. `now` puts it at the front.
    PlayUrl { url: String, now: bool },
    Search { query: String },
    /// 1-based pick from the caller's last search.
    Select { index: usize },
    Pause,
    Resume,
    Skip,
    ShowQueue,
    EmptyQueue,
    Autoplay(bool),
    Help,
}

pub const HELP: &str = "\
play <song query>      Play a song. Add it to queue if a song is playing.
play-now <song query>  Put the queried song at the top of the queue.
play-url <url>         Play a song from a url or file path.
play-now-url <url>     Put a url or file path at the top of the queue.
search <song query>    List matches; pick one with `select <n>`.
select <n>             Queue a song from your last search.
pause                  Pause the current song.
resume                 Resume the current song.
skip                   Skip the current song.
show-queue             Show all songs in queue.
empty-queue            Empty the queue and stop the current song.
autoplay on|off        Keep playing related songs when the queue runs out.";

fn required(args: &str, usage: &'static str) -> Result<String, CommandError> {
    if args.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(args.to_string())
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, args) = line
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((line, ""));

        let command = match name.to_lowercase().as_str() {
            "play" => Self::Play {
                query: required(args, "play <song query>")?,
                now: false,
            },
            "play-now" => Self::Play {
                query: required(args, "play-now <song query>")?,
                now: true,
            },
            "play-url" => Self::PlayUrl {
                url: required(args, "play-url <url>")?,
                now: false,
            },
            "play-now-url" => Self::PlayUrl {
                url: required(args, "play-now-url <url>")?,
                now: true,
            },
            "search" => Self::Search {
                query: required(args, "search <song query>")?,
            },
            "select" => Self::Select {
                index: args
                    .parse()
                    .map_err(|_| CommandError::Usage("select <n>"))?,
            },
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "skip" => Self::Skip,
            "show-queue" | "queue" => Self::ShowQueue,
            "empty-queue" | "stop" => Self::EmptyQueue,
            "autoplay" => match args.to_lowercase().as_str() {
                "on" => Self::Autoplay(true),
                "off" => Self::Autoplay(false),
                _ => return Err(CommandError::Usage("autoplay on|off")),
            },
            "help" => Self::Help,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}
