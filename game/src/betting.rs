//! Bet sizing suggestions and the viewer's action bar.

use crate::model::{Chips, Seat};

/// Pot fractions offered when nobody has bet yet in the round.
const POT_FRACTIONS: [f64; 9] = [
    1.0 / 4.0,
    1.0 / 3.0,
    1.0 / 2.0,
    2.0 / 3.0,
    1.0,
    1.5,
    2.0,
    2.5,
    3.0,
];

/// Big blind multiples offered when opening an empty pot.
const BLIND_MULTIPLES: std::ops::RangeInclusive<Chips> = 1..=8;

/// Multiples of the current bet offered as raises.
const RAISE_MULTIPLES: std::ops::RangeInclusive<Chips> = 2..=7;

/// Suggested bet or raise amounts, largest first.
///
/// When the betting is still closed (`opening`), amounts scale with the pot,
/// or with the big blind if the pot is empty. Otherwise they are multiples
/// of the highest bet on the table. Pot-scaled amounts that round to the
/// same value are listed once.
pub fn suggest_bets(pot: Chips, big_blind: Chips, max_bet: Chips, opening: bool) -> Vec<Chips> {
    if !opening {
        return RAISE_MULTIPLES.rev().map(|m| max_bet * m).collect();
    }
    if pot == 0 {
        return BLIND_MULTIPLES.rev().map(|m| big_blind * m).collect();
    }
    let mut amounts: Vec<Chips> = POT_FRACTIONS
        .iter()
        .map(|f| (pot as f64 * f).round() as Chips)
        .collect();
    amounts.sort_unstable_by(|a, b| b.cmp(a));
    amounts.dedup();
    amounts
}

/// What the seated viewer may press, and how the buttons read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBar {
    /// Only the seat whose turn it is may act.
    pub enabled: bool,
    /// Nothing has been bet this round: "Check" and "Bet" instead of "Call"
    /// and "Raise".
    pub opening: bool,
    /// The current bet exceeds the viewer's stack, so only all-in or fold
    /// make sense.
    pub short_stacked: bool,
    pub suggestions: Vec<Chips>,
}

impl ActionBar {
    pub fn new(me: &Seat, max_bet: Chips, pot: Chips, big_blind: Chips) -> Self {
        let opening = max_bet == 0;
        ActionBar {
            enabled: me.active,
            opening,
            short_stacked: max_bet > me.chips,
            suggestions: suggest_bets(pot, big_blind, max_bet, opening),
        }
    }

    pub fn can_bet(&self) -> bool {
        self.enabled && !self.short_stacked
    }

    pub fn can_call(&self) -> bool {
        self.enabled && !self.short_stacked
    }

    pub fn bet_caption(&self) -> &'static str {
        if self.opening {
            "Bet"
        } else {
            "Raise"
        }
    }

    pub fn call_caption(&self) -> &'static str {
        if self.opening {
            "Check"
        } else {
            "Call"
        }
    }
}
