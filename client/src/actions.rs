//! Posting player moves to the backend's action endpoint.

use log::{debug, warn};
use reqwest::StatusCode;
use snafu::{ResultExt, Snafu};

use lnpoker_game::model::{AccountId, Chips, SeatId, TableId};
use lnpoker_game::protocol::{
    ActionKind, ActionRequest, ActionResponse, AddPlayer, AllIn, Bet, Call, Fold, RemovePlayer,
};

#[derive(Debug, Snafu)]
pub enum Error {
    /// The backend refused the move; the message is meant for the user.
    #[snafu(display("{}", message))]
    Rejected { kind: ActionKind, message: String },
    #[snafu(display("could not reach the table: {}", source))]
    Transport { source: reqwest::Error },
    #[snafu(display("the table answered with {}", status))]
    Status { status: StatusCode },
    #[snafu(display("unreadable answer from the table: {}", source))]
    Decode { source: serde_json::Error },
}

/// Stateless dispatcher of [`ActionRequest`]s.
///
/// No legality checks happen here. Every move is posted as is and whatever
/// error the backend returns is handed back verbatim. Failed moves are not
/// retried.
#[derive(Debug, Clone)]
pub struct ActionClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ActionClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        ActionClient {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub async fn dispatch(&self, req: impl Into<ActionRequest>) -> Result<(), Error> {
        let req = req.into();
        let kind = req.kind();
        debug!("dispatching {} at table {}", kind, req.table_id());
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&req)
            .send()
            .await
            .context(TransportSnafu)?;
        let status = resp.status();
        let body = resp.bytes().await.context(TransportSnafu)?;
        let answer: ActionResponse = match serde_json::from_slice(&body) {
            Ok(answer) => answer,
            Err(_) if !status.is_success() => return StatusSnafu { status }.fail(),
            Err(source) => return Err(Error::Decode { source }),
        };
        match answer.error.filter(|message| !message.is_empty()) {
            Some(message) => {
                warn!("{} rejected: {}", kind, message);
                RejectedSnafu { kind, message }.fail()
            }
            None => Ok(()),
        }
    }

    pub async fn add_player(
        &self,
        table_id: &TableId,
        account_id: &AccountId,
        position: u8,
    ) -> Result<(), Error> {
        self.dispatch(AddPlayer {
            table_id: table_id.clone(),
            account_id: account_id.clone(),
            position,
        })
        .await
    }

    pub async fn remove_player(
        &self,
        table_id: &TableId,
        account_id: &AccountId,
        player_id: &SeatId,
    ) -> Result<(), Error> {
        self.dispatch(RemovePlayer {
            table_id: table_id.clone(),
            account_id: account_id.clone(),
            player_id: player_id.clone(),
        })
        .await
    }

    pub async fn bet(&self, table_id: &TableId, player_id: &SeatId, amount: Chips) -> Result<(), Error> {
        self.dispatch(Bet {
            table_id: table_id.clone(),
            player_id: player_id.clone(),
            amount,
        })
        .await
    }

    pub async fn call(&self, table_id: &TableId, player_id: &SeatId) -> Result<(), Error> {
        self.dispatch(Call {
            table_id: table_id.clone(),
            player_id: player_id.clone(),
        })
        .await
    }

    pub async fn fold(&self, table_id: &TableId, player_id: &SeatId) -> Result<(), Error> {
        self.dispatch(Fold {
            table_id: table_id.clone(),
            player_id: player_id.clone(),
        })
        .await
    }

    pub async fn all_in(&self, table_id: &TableId, player_id: &SeatId) -> Result<(), Error> {
        self.dispatch(AllIn {
            table_id: table_id.clone(),
            player_id: player_id.clone(),
        })
        .await
    }
}
