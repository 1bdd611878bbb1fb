use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chips and satoshis are both whole, indivisible units.
pub type Chips = u64;

/// The number of seats at every table. Positions run from 1 to `SEATS`.
pub const SEATS: u8 = 10;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.into())
            }
        }
    };
}

string_id!(
    /// Document id of a table.
    TableId
);
string_id!(
    /// Document id of a seat record, sent as `playerId` in actions.
    SeatId
);
string_id!(
    /// The locally generated account identifier.
    AccountId
);
string_id!(
    /// The backend's fingerprint of an account, published on seat records
    /// in place of the account identifier.
    AccountHash
);

/// The betting phase of the current hand.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Round {
    #[default]
    Waiting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Round {
    pub fn as_str(self) -> &'static str {
        match self {
            Round::Waiting => "waiting",
            Round::Preflop => "preflop",
            Round::Flop => "flop",
            Round::Turn => "turn",
            Round::River => "river",
            Round::Showdown => "showdown",
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a seated player, as last set by the backend.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    #[default]
    Sitting,
    Ready,
    Called,
    Betted,
    Raised,
    Checked,
    Folded,
}

impl SeatState {
    pub fn as_str(self) -> &'static str {
        match self {
            SeatState::Sitting => "sitting",
            SeatState::Ready => "ready",
            SeatState::Called => "called",
            SeatState::Betted => "betted",
            SeatState::Raised => "raised",
            SeatState::Checked => "checked",
            SeatState::Folded => "folded",
        }
    }
}

impl fmt::Display for SeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playing card as published by the backend.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Card {
    pub rank: String,
    pub suit: String,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// Hole cards of a seat.
///
/// Only the seat owner receives something readable; everybody else gets an
/// opaque string until the backend decides to reveal the cards.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HoleCards {
    Open(Vec<Card>),
    Sealed(String),
}

/// A share of the pot awarded at the end of a hand.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Winner {
    pub position: u8,
    #[serde(default)]
    pub amount: Chips,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub buy_in: Chips,
    pub pot: Chips,
    pub cards: Vec<Card>,
    pub round: Round,
    pub dealer: Option<u8>,
    pub winners: Vec<Winner>,
    /// Percentage of each pot kept by the house.
    pub rake: f64,
    /// Number of seated players.
    pub playing: u32,
}

impl Table {
    /// The pot share awarded to `position`, if the backend has resolved one.
    pub fn winnings(&self, position: u8) -> Option<Chips> {
        self.winners
            .iter()
            .find(|w| w.position == position)
            .map(|w| w.amount)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Seat {
    pub id: SeatId,
    pub table_id: TableId,
    pub position: u8,
    pub account_hash: Option<AccountHash>,
    pub chips: Chips,
    /// Bet placed in the current betting round.
    pub bet: Chips,
    /// Cumulative bet over the whole hand.
    pub chips_bet: Chips,
    pub state: SeatState,
    pub allin: bool,
    pub winner: bool,
    pub active: bool,
    pub fold_at: Option<DateTime<Utc>>,
    pub cards: Option<HoleCards>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub balance: Chips,
    pub hash: Option<AccountHash>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub ip: Option<String>,
}

/// Seat records of one table, keyed by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeatMap(BTreeMap<u8, Seat>);

impl SeatMap {
    pub fn get(&self, position: u8) -> Option<&Seat> {
        self.0.get(&position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Seat> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The seat owned by the account with fingerprint `hash`.
    pub fn owned_by(&self, hash: &AccountHash) -> Option<&Seat> {
        self.iter().find(|s| s.account_hash.as_ref() == Some(hash))
    }

    /// The highest bet in the current betting round, or 0.
    pub fn max_bet(&self) -> Chips {
        self.iter().map(|s| s.bet).max().unwrap_or(0)
    }

    pub fn total_bets(&self) -> Chips {
        self.iter().map(|s| s.bet).sum()
    }
}

impl FromIterator<Seat> for SeatMap {
    /// Later records replace earlier ones holding the same position.
    fn from_iter<I: IntoIterator<Item = Seat>>(iter: I) -> Self {
        SeatMap(iter.into_iter().map(|s| (s.position, s)).collect())
    }
}
