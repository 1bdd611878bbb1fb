//! Derivation of what the viewer sees from raw table and seat records.
//!
//! Everything here is a pure function of its inputs, re-run whenever a new
//! snapshot of either the table or its seats arrives. The two snapshots come
//! from independent feeds and may disagree for a moment (a table already in
//! the next round with seats still showing the last one); the reducer makes
//! no attempt to reconcile them.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::betting::ActionBar;
use crate::cipher::CardCipher;
use crate::model::{
    AccountHash, AccountId, Card, Chips, HoleCards, Round, Seat, SeatId, SeatMap, SeatState, Table,
    SEATS,
};

/// Who is looking at the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    /// Key for the viewer's own sealed cards.
    pub account_id: AccountId,
    /// Fingerprint matched against seat records; unknown until the account
    /// document has loaded.
    pub account_hash: Option<AccountHash>,
}

/// The text under a seat's bet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Label {
    State(SeatState),
    /// Waiting for action; nothing to report.
    Blank,
    AllIn,
    Winner,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::State(s) => fmt::Display::fmt(s, f),
            Label::Blank => Ok(()),
            Label::AllIn => f.write_str("all-in"),
            Label::Winner => f.write_str("winner"),
        }
    }
}

/// Pick the label for an occupied seat.
///
/// "sitting" always shows as is. Otherwise a declared winner with a positive
/// net result shows "winner", an all-in seat "all-in", a ready seat nothing,
/// and any other seat its lifecycle state.
pub fn label(state: SeatState, allin: bool, winner: bool, net_profit: i64) -> Label {
    if state == SeatState::Sitting {
        Label::State(SeatState::Sitting)
    } else if winner && net_profit > 0 {
        Label::Winner
    } else if allin {
        Label::AllIn
    } else if state == SeatState::Ready {
        Label::Blank
    } else {
        Label::State(state)
    }
}

/// An occupied seat as shown to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatView {
    pub id: SeatId,
    pub position: u8,
    pub account_hash: Option<AccountHash>,
    /// The viewer owns this seat.
    pub mine: bool,
    /// It is this seat's turn.
    pub active: bool,
    pub dealer: bool,
    pub chips: Chips,
    pub bet: Chips,
    pub label: Label,
    /// Declared a winner this hand, whatever the net result.
    pub winner: bool,
    /// Pot share minus the seat's cumulative bet this hand.
    pub net_profit: i64,
    /// Shown in place of the label while running.
    pub fold_at: Option<DateTime<Utc>>,
    /// Empty when the cards are not visible to the viewer.
    pub cards: Vec<Card>,
}

/// One of the fixed seat slots.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Empty { position: u8 },
    Taken(Box<SeatView>),
}

impl Slot {
    pub fn position(&self) -> u8 {
        match self {
            Slot::Empty { position } => *position,
            Slot::Taken(seat) => seat.position,
        }
    }

    pub fn seat(&self) -> Option<&SeatView> {
        match self {
            Slot::Empty { .. } => None,
            Slot::Taken(seat) => Some(seat),
        }
    }
}

/// Everything the table screen needs, derived in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    /// Positions 1 through `SEATS`, in order.
    pub slots: Vec<Slot>,
    /// The viewer's position, if seated.
    pub me: Option<u8>,
    pub max_bet: Chips,
    pub total_bets: Chips,
    /// Present only while the viewer holds a seat.
    pub actions: Option<ActionBar>,
}

impl TableView {
    pub fn slot(&self, position: u8) -> Option<&Slot> {
        self.slots.iter().find(|s| s.position() == position)
    }

    pub fn my_seat(&self) -> Option<&SeatView> {
        self.me.and_then(|p| self.slot(p)).and_then(Slot::seat)
    }
}

/// Derive the table view. `table` is `None` until its first snapshot.
pub fn reduce(
    table: Option<&Table>,
    seats: &SeatMap,
    viewer: &Viewer,
    cipher: &dyn CardCipher,
) -> TableView {
    let me = viewer
        .account_hash
        .as_ref()
        .and_then(|h| seats.owned_by(h));
    let round = table.map(|t| t.round).unwrap_or_default();
    let dealer = table.and_then(|t| t.dealer);

    let slots = (1..=SEATS)
        .map(|position| match seats.get(position) {
            None => Slot::Empty { position },
            Some(seat) => {
                let mine = me.map(|m| m.position) == Some(position);
                let winnings = table.and_then(|t| t.winnings(position));
                Slot::Taken(Box::new(seat_view(
                    seat, mine, round, dealer, winnings, viewer, cipher,
                )))
            }
        })
        .collect();

    let max_bet = seats.max_bet();
    let actions = me.map(|m| {
        let (pot, big_blind) = table.map(|t| (t.pot, t.big_blind)).unwrap_or((0, 0));
        ActionBar::new(m, max_bet, pot, big_blind)
    });

    TableView {
        slots,
        me: me.map(|m| m.position),
        max_bet,
        total_bets: seats.total_bets(),
        actions,
    }
}

fn seat_view(
    seat: &Seat,
    mine: bool,
    round: Round,
    dealer: Option<u8>,
    winnings: Option<Chips>,
    viewer: &Viewer,
    cipher: &dyn CardCipher,
) -> SeatView {
    let winner = seat.winner;
    let net_profit = winnings.unwrap_or(0) as i64 - seat.chips_bet as i64;
    let fold_at = seat.fold_at.filter(|_| seat.state != SeatState::Sitting);
    SeatView {
        id: seat.id.clone(),
        position: seat.position,
        account_hash: seat.account_hash.clone(),
        mine,
        active: seat.active,
        dealer: dealer == Some(seat.position),
        chips: seat.chips,
        bet: seat.bet,
        label: label(seat.state, seat.allin, winner, net_profit),
        winner,
        net_profit,
        fold_at,
        cards: visible_cards(seat.cards.as_ref(), mine, round, viewer, cipher),
    }
}

/// The viewer sees their own cards when they can be opened, and everybody
/// else's only once the backend reveals them at showdown.
pub fn visible_cards(
    cards: Option<&HoleCards>,
    mine: bool,
    round: Round,
    viewer: &Viewer,
    cipher: &dyn CardCipher,
) -> Vec<Card> {
    match cards {
        None => vec![],
        Some(HoleCards::Open(cards)) if mine || round == Round::Showdown => cards.clone(),
        Some(HoleCards::Open(_)) => vec![],
        Some(HoleCards::Sealed(sealed)) if mine => cipher
            .open(sealed, &viewer.account_id)
            .unwrap_or_default(),
        Some(HoleCards::Sealed(_)) => vec![],
    }
}

/// Lobby rows, cheapest blinds first.
pub fn lobby(mut tables: Vec<Table>) -> Vec<Table> {
    tables.sort_by_key(|t| t.small_blind);
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::SaltedAes;
    use crate::model::Winner;

    fn card(rank: &str, suit: &str) -> Card {
        Card { rank: rank.into(), suit: suit.into() }
    }

    fn viewer() -> Viewer {
        Viewer {
            account_id: "acc-me".into(),
            account_hash: Some("hash-me".into()),
        }
    }

    fn seat(position: u8, hash: &str) -> Seat {
        Seat {
            id: SeatId(format!("p{}", position)),
            table_id: "t1".into(),
            position,
            account_hash: Some(hash.into()),
            chips: 500,
            state: SeatState::Called,
            ..Seat::default()
        }
    }

    #[test]
    fn allin_wins_over_lifecycle_state() {
        for state in [
            SeatState::Ready,
            SeatState::Called,
            SeatState::Betted,
            SeatState::Raised,
            SeatState::Checked,
            SeatState::Folded,
        ] {
            assert_eq!(label(state, true, false, 0), Label::AllIn);
        }
    }

    #[test]
    fn ready_shows_nothing() {
        let l = label(SeatState::Ready, false, false, 0);
        assert_eq!(l, Label::Blank);
        assert_eq!(l.to_string(), "");
    }

    #[test]
    fn sitting_is_verbatim() {
        assert_eq!(label(SeatState::Sitting, true, true, 50).to_string(), "sitting");
    }

    #[test]
    fn winner_needs_positive_net() {
        let table = Table {
            winners: vec![Winner { position: 2, amount: 100 }, Winner { position: 3, amount: 30 }],
            round: Round::Showdown,
            ..Table::default()
        };
        let seats: SeatMap = vec![
            Seat { chips_bet: 30, winner: true, ..seat(2, "a") },
            Seat { chips_bet: 30, winner: true, ..seat(3, "b") },
        ]
        .into_iter()
        .collect();
        let view = reduce(Some(&table), &seats, &viewer(), &SaltedAes);

        let two = view.slot(2).and_then(Slot::seat).unwrap();
        assert_eq!(two.net_profit, 70);
        assert_eq!(two.label, Label::Winner);

        let three = view.slot(3).and_then(Slot::seat).unwrap();
        assert_eq!(three.net_profit, 0);
        assert!(three.winner);
        assert_eq!(three.label, Label::State(SeatState::Called));
    }

    #[test]
    fn payout_alone_does_not_declare_a_winner() {
        let table = Table {
            winners: vec![Winner { position: 4, amount: 90 }],
            round: Round::Showdown,
            ..Table::default()
        };
        let seats: SeatMap = vec![Seat { chips_bet: 20, ..seat(4, "a") }].into_iter().collect();
        let view = reduce(Some(&table), &seats, &viewer(), &SaltedAes);
        let four = view.slot(4).and_then(Slot::seat).unwrap();
        assert_eq!(four.net_profit, 70);
        assert!(!four.winner);
        assert_ne!(four.label, Label::Winner);
    }

    #[test]
    fn unresolved_winners_mean_no_profit() {
        let seats: SeatMap = vec![Seat { chips_bet: 40, winner: true, ..seat(5, "a") }]
            .into_iter()
            .collect();
        let view = reduce(Some(&Table::default()), &seats, &viewer(), &SaltedAes);
        let five = view.slot(5).and_then(Slot::seat).unwrap();
        assert_eq!(five.net_profit, -40);
        assert_ne!(five.label, Label::Winner);
    }

    #[test]
    fn own_sealed_cards_are_opened() {
        let mine = vec![card("A", "s"), card("A", "h")];
        let sealed = SaltedAes.seal(&mine, &viewer().account_id);
        let seats: SeatMap = vec![
            Seat { cards: Some(HoleCards::Sealed(sealed)), ..seat(1, "hash-me") },
            Seat { cards: Some(HoleCards::Sealed("U2FsdGVkX1opaque".into())), ..seat(2, "other") },
        ]
        .into_iter()
        .collect();
        let table = Table { round: Round::Flop, ..Table::default() };
        let view = reduce(Some(&table), &seats, &viewer(), &SaltedAes);

        assert_eq!(view.me, Some(1));
        assert_eq!(view.my_seat().unwrap().cards, mine);
        assert!(view.slot(2).and_then(Slot::seat).unwrap().cards.is_empty());
    }

    #[test]
    fn others_cards_only_at_showdown_and_only_when_open() {
        let open = Some(HoleCards::Open(vec![card("K", "c"), card("2", "d")]));
        let sealed = Some(HoleCards::Sealed("U2FsdGVkX1opaque".into()));
        let v = viewer();
        assert!(visible_cards(open.as_ref(), false, Round::River, &v, &SaltedAes).is_empty());
        assert_eq!(visible_cards(open.as_ref(), false, Round::Showdown, &v, &SaltedAes).len(), 2);
        assert!(visible_cards(sealed.as_ref(), false, Round::Showdown, &v, &SaltedAes).is_empty());
        assert!(visible_cards(None, true, Round::Showdown, &v, &SaltedAes).is_empty());
    }

    #[test]
    fn slots_cover_every_position() {
        let seats: SeatMap = vec![seat(4, "a"), seat(10, "b")].into_iter().collect();
        let table = Table { dealer: Some(4), ..Table::default() };
        let view = reduce(Some(&table), &seats, &viewer(), &SaltedAes);

        assert_eq!(view.slots.len(), SEATS as usize);
        assert_eq!(view.slots[0], Slot::Empty { position: 1 });
        assert!(view.slot(4).and_then(Slot::seat).unwrap().dealer);
        assert!(!view.slot(10).and_then(Slot::seat).unwrap().dealer);
        assert_eq!(view.me, None);
        assert_eq!(view.actions, None);
    }

    #[test]
    fn action_bar_for_seated_viewer() {
        let seats: SeatMap = vec![
            Seat { bet: 20, active: true, ..seat(1, "hash-me") },
            Seat { bet: 50, ..seat(6, "x") },
        ]
        .into_iter()
        .collect();
        let table = Table { pot: 120, big_blind: 10, ..Table::default() };
        let view = reduce(Some(&table), &seats, &viewer(), &SaltedAes);

        assert_eq!(view.max_bet, 50);
        assert_eq!(view.total_bets, 70);
        let bar = view.actions.unwrap();
        assert!(bar.enabled);
        assert!(!bar.opening);
        assert_eq!(bar.suggestions, vec![350, 300, 250, 200, 150, 100]);
    }

    #[test]
    fn fold_deadline_hidden_while_sitting() {
        let at = Utc::now();
        let seats: SeatMap = vec![
            Seat { fold_at: Some(at), state: SeatState::Sitting, ..seat(1, "a") },
            Seat { fold_at: Some(at), ..seat(2, "b") },
        ]
        .into_iter()
        .collect();
        let view = reduce(None, &seats, &viewer(), &SaltedAes);
        assert_eq!(view.slot(1).and_then(Slot::seat).unwrap().fold_at, None);
        assert_eq!(view.slot(2).and_then(Slot::seat).unwrap().fold_at, Some(at));
    }

    #[test]
    fn reducing_twice_gives_identical_output() {
        let sealed = SaltedAes.seal(&[card("7", "s"), card("7", "c")], &viewer().account_id);
        let seats: SeatMap = vec![
            Seat { cards: Some(HoleCards::Sealed(sealed)), active: true, ..seat(3, "hash-me") },
            Seat { allin: true, bet: 80, ..seat(8, "y") },
        ]
        .into_iter()
        .collect();
        let table = Table {
            pot: 300,
            dealer: Some(8),
            winners: vec![Winner { position: 8, amount: 380 }],
            ..Table::default()
        };
        let first = reduce(Some(&table), &seats, &viewer(), &SaltedAes);
        let second = reduce(Some(&table), &seats, &viewer(), &SaltedAes);
        assert_eq!(first, second);
    }

    #[test]
    fn lobby_sorts_by_small_blind() {
        let tables = vec![
            Table { id: "b".into(), small_blind: 10, ..Table::default() },
            Table { id: "a".into(), small_blind: 5, ..Table::default() },
        ];
        let ids: Vec<_> = lobby(tables).into_iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
