//! Plain text rendering of the screens.

use std::collections::{BTreeMap, HashMap};

use lnpoker_client::live::Snapshot;
use lnpoker_client::notify::{Level, Notice};
use lnpoker_game::betting::ActionBar;
use lnpoker_game::countdown::bar_fill;
use lnpoker_game::display::{SeatView, Slot, TableView};
use lnpoker_game::model::{Account, AccountHash, Card, Table};

const BAR_WIDTH: usize = 20;

/// The permanent balance line.
pub fn balance(account: &Snapshot<Account>) -> String {
    match account {
        Snapshot::Ready(a) => format!("Balance: {} sats", a.balance),
        Snapshot::Loading | Snapshot::Missing => "Balance: ...".into(),
        Snapshot::Failed(_) => "Balance: unavailable".into(),
    }
}

pub fn notice(notice: &Notice) -> String {
    let tag = match notice.level {
        Level::Info => "info",
        Level::Error => "error",
    };
    format!("[{}] {}  (dismiss)", tag, notice.text)
}

pub fn lobby(rows: &Snapshot<Vec<Table>>) -> String {
    let tables = match rows {
        Snapshot::Ready(tables) => tables,
        Snapshot::Loading => return "Loading tables...".into(),
        Snapshot::Missing => return "No tables.".into(),
        Snapshot::Failed(e) => return format!("Tables unavailable: {}", e),
    };
    if tables.is_empty() {
        return "No tables.".into();
    }
    let mut lines = vec![format!(
        "{:<22} {:>12} {:>8} {:>7}",
        "Table", "Blinds", "Buy-in", "Playing"
    )];
    lines.extend(tables.iter().map(|t| {
        format!(
            "{:<22} {:>12} {:>8} {:>7}",
            t.id.as_str(),
            format!("{}/{}", t.small_blind, t.big_blind),
            t.buy_in,
            t.playing
        )
    }));
    lines.push("open <table> to sit down".into());
    lines.join("\n")
}

/// Everything drawn on the table screen.
pub struct TableFrame<'a> {
    pub table: &'a Snapshot<Table>,
    pub view: &'a TableView,
    /// Seats are offered only once the seat set is known.
    pub seats_loaded: bool,
    pub names: &'a HashMap<AccountHash, String>,
    /// Fold countdown progress by position.
    pub countdowns: &'a BTreeMap<u8, f64>,
}

pub fn table(frame: &TableFrame<'_>) -> String {
    let table = match frame.table {
        Snapshot::Ready(t) => t,
        Snapshot::Loading => return "Loading table...".into(),
        Snapshot::Missing => return "No such table. Type `lobby` to go back.".into(),
        Snapshot::Failed(e) => return format!("Table unavailable: {}", e),
    };
    let view = frame.view;
    let mut lines = vec![
        format!(
            "Table {} | {} | pot {} | bets {} | blinds {}/{} | buy-in {} | rake {}%",
            table.id, table.round, table.pot, view.total_bets, table.small_blind, table.big_blind,
            table.buy_in, table.rake
        ),
        format!("Board: {}", cards(&table.cards)),
    ];
    for slot in &view.slots {
        lines.push(match slot {
            Slot::Empty { position } if frame.seats_loaded && view.me.is_none() => {
                format!("{:>3}  (empty)  sit {}", position, position)
            }
            Slot::Empty { position } => format!("{:>3}  (empty)", position),
            Slot::Taken(seat) => seat_line(seat, frame),
        });
    }
    if let Some(bar) = &view.actions {
        lines.push(actions(bar));
        lines.push("leave".into());
    }
    lines.join("\n")
}

fn seat_line(seat: &SeatView, frame: &TableFrame<'_>) -> String {
    let mut parts = vec![format!(
        "{:>3}{}{}",
        seat.position,
        if seat.dealer { " D" } else { "  " },
        if seat.active { "*" } else { " " }
    )];
    if seat.mine {
        parts.push("(you)".into());
    }
    if let Some(name) = seat
        .account_hash
        .as_ref()
        .and_then(|h| frame.names.get(h))
        .filter(|n| !n.is_empty())
    {
        parts.push(format!("@{}", name));
    }
    parts.push(format!("chips {}", seat.chips));
    if seat.bet > 0 {
        parts.push(format!("bet {}", seat.bet));
    }
    if !seat.cards.is_empty() {
        parts.push(format!("[{}]", cards(&seat.cards)));
    }
    match frame.countdowns.get(&seat.position) {
        Some(progress) if seat.fold_at.is_some() => parts.push(countdown(*progress)),
        _ => {
            let label = seat.label.to_string();
            if !label.is_empty() {
                parts.push(label);
            }
        }
    }
    if seat.net_profit > 0 {
        parts.push(format!("+{}", seat.net_profit));
    }
    parts.join("  ")
}

fn cards(cards: &[Card]) -> String {
    if cards.is_empty() {
        return "-".into();
    }
    cards
        .iter()
        .map(Card::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A bar that empties as the fold deadline approaches.
pub fn countdown(progress: f64) -> String {
    let filled = (bar_fill(progress) * BAR_WIDTH as f64 / 100.0).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn actions(bar: &ActionBar) -> String {
    if !bar.enabled {
        return "Waiting for your turn.".into();
    }
    let mut moves = vec!["fold".to_string()];
    if bar.can_call() {
        moves.push(bar.call_caption().to_lowercase());
    }
    if bar.can_bet() {
        let sizes: Vec<String> = bar.suggestions.iter().map(|s| s.to_string()).collect();
        moves.push(format!(
            "{} <amount> (allin, {})",
            bar.bet_caption().to_lowercase(),
            sizes.join(", ")
        ));
    }
    moves.push("allin".into());
    format!("Your move: {}", moves.join(" | "))
}
