use std::convert::From;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{AccountId, Chips, SeatId, TableId};

/// Every kind of move a client may ask the backend to make.
///
/// Requests are posted as a flat JSON object, discriminated by `type`. The
/// client performs no legality checks of its own; whatever the backend
/// rejects comes back as [`ActionResponse::error`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionRequest {
    Add(AddPlayer),
    Remove(RemovePlayer),
    Bet(Bet),
    Call(Call),
    Fold(Fold),
    Allin(AllIn),
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Add(_) => ActionKind::Add,
            ActionRequest::Remove(_) => ActionKind::Remove,
            ActionRequest::Bet(_) => ActionKind::Bet,
            ActionRequest::Call(_) => ActionKind::Call,
            ActionRequest::Fold(_) => ActionKind::Fold,
            ActionRequest::Allin(_) => ActionKind::AllIn,
        }
    }

    pub fn table_id(&self) -> &TableId {
        match self {
            ActionRequest::Add(r) => &r.table_id,
            ActionRequest::Remove(r) => &r.table_id,
            ActionRequest::Bet(r) => &r.table_id,
            ActionRequest::Call(r) => &r.table_id,
            ActionRequest::Fold(r) => &r.table_id,
            ActionRequest::Allin(r) => &r.table_id,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ActionKind {
    Add,
    Remove,
    Bet,
    Call,
    Fold,
    AllIn,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Add => "add",
            ActionKind::Remove => "remove",
            ActionKind::Bet => "bet",
            ActionKind::Call => "call",
            ActionKind::Fold => "fold",
            ActionKind::AllIn => "allin",
        })
    }
}

// Auxillary macro for converting the individual request types into the
// request enum.

macro_rules! derive_from {
    ($to:ident, $ty:ident, $r:ident) => {
        impl From<$r> for $to {
            fn from(r: $r) -> Self {
                $to::$ty(r)
            }
        }
    };
}

/// Take the seat at `position`, paying the table's buy-in from the account.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddPlayer {
    pub table_id: TableId,
    pub account_id: AccountId,
    pub position: u8,
}

derive_from!(ActionRequest, Add, AddPlayer);

/// Leave the table, returning the remaining chips to the account.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemovePlayer {
    pub table_id: TableId,
    pub account_id: AccountId,
    pub player_id: SeatId,
}

derive_from!(ActionRequest, Remove, RemovePlayer);

/// Open or raise to `amount`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub table_id: TableId,
    pub player_id: SeatId,
    pub amount: Chips,
}

derive_from!(ActionRequest, Bet, Bet);

/// Match the current bet; a check when nothing is open.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub table_id: TableId,
    pub player_id: SeatId,
}

derive_from!(ActionRequest, Call, Call);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Fold {
    pub table_id: TableId,
    pub player_id: SeatId,
}

derive_from!(ActionRequest, Fold, Fold);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllIn {
    pub table_id: TableId,
    pub player_id: SeatId,
}

derive_from!(ActionRequest, Allin, AllIn);

/// The backend's reply to an action. Nothing but the optional error is
/// relied upon.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionResponse {
    #[serde(default)]
    pub error: Option<String>,
}
