//! What the player can type.

use std::str::FromStr;

use snafu::{OptionExt, ResultExt, Snafu};

use lnpoker_game::model::{Chips, TableId, SEATS};

pub const HELP: &str = "commands: lobby | open <table> | sit <1-10> | leave | bet <amount> | \
raise <amount> | call | check | fold | allin | dismiss | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lobby,
    Open(TableId),
    Sit(u8),
    Leave,
    /// Opening bet or raise; the backend treats both alike.
    Bet(Chips),
    /// Call, or check when nothing is open.
    Call,
    Fold,
    AllIn,
    Dismiss,
    Help,
    Quit,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseError {
    #[snafu(display("nothing to do"))]
    Empty,
    #[snafu(display("unknown command `{}`", word))]
    Unknown { word: String },
    #[snafu(display("`{}` needs {}", command, what))]
    Missing {
        command: &'static str,
        what: &'static str,
    },
    #[snafu(display("`{}` is not a valid amount", text))]
    Amount {
        text: String,
        source: std::num::ParseIntError,
    },
    #[snafu(display("seats are numbered 1 to {}", SEATS))]
    Position,
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let word = words.next().context(EmptySnafu)?.to_ascii_lowercase();
        let arg = words.next();
        let command = match word.as_str() {
            "lobby" => Command::Lobby,
            "open" => Command::Open(TableId::from(arg.context(MissingSnafu {
                command: "open",
                what: "a table id",
            })?)),
            "sit" => {
                let text = arg.context(MissingSnafu {
                    command: "sit",
                    what: "a seat number",
                })?;
                match text.parse::<u8>() {
                    Ok(position) if (1..=SEATS).contains(&position) => Command::Sit(position),
                    _ => return PositionSnafu.fail(),
                }
            }
            "leave" => Command::Leave,
            "bet" | "raise" => {
                let text = arg.context(MissingSnafu {
                    command: "bet",
                    what: "an amount",
                })?;
                Command::Bet(text.parse().context(AmountSnafu { text })?)
            }
            "call" | "check" => Command::Call,
            "fold" => Command::Fold,
            "allin" | "all-in" => Command::AllIn,
            "dismiss" | "ok" => Command::Dismiss,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return UnknownSnafu { word }.fail(),
        };
        Ok(command)
    }
}
