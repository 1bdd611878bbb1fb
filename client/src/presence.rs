//! Side calls to the chat bot that hands out poker accounts: deposits,
//! presence, and the names of players currently online.

use std::collections::HashMap;

use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use snafu::{OptionExt, ResultExt, Snafu};

use lnpoker_game::model::{AccountHash, Chips};

use crate::identity::Identity;

/// Header carrying base64 of `botId~accountId`.
pub const TOKEN_HEADER: &str = "X-Bot-Poker-Token";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("this account is not linked to a bot user"))]
    Unlinked,
    #[snafu(display("request to {} failed: {}", path, source))]
    Transport { path: String, source: reqwest::Error },
    #[snafu(display("{} answered with {}", path, status))]
    Status { path: String, status: StatusCode },
}

#[derive(Debug, Clone)]
pub struct PresenceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl PresenceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, identity: &Identity) -> Self {
        PresenceClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: identity.poker_token(),
        }
    }

    /// Ask the bot to pay `satoshis` into the poker account.
    ///
    /// The deposit settles asynchronously; the new balance shows up on the
    /// account document some time later.
    pub async fn deposit(&self, satoshis: Chips) -> Result<(), Error> {
        let token = self.token.as_deref().context(UnlinkedSnafu)?;
        info!("requesting deposit of {} sats", satoshis);
        let req = self
            .http
            .post(self.url("deposit"))
            .header(TOKEN_HEADER, token)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("satoshis={}", satoshis));
        self.send("deposit", req).await.map(drop)
    }

    /// Tell the bot this account is at a table, so its name can be shown to
    /// the other players.
    pub async fn mark_playing(&self) -> Result<(), Error> {
        let token = self.token.as_deref().context(UnlinkedSnafu)?;
        let req = self.http.post(self.url("playing")).header(TOKEN_HEADER, token);
        self.send("playing", req).await.map(drop)
    }

    /// Display names of the players online, by account fingerprint.
    pub async fn online_names(&self) -> Result<HashMap<AccountHash, String>, Error> {
        let resp = self.send("online", self.http.get(self.url("online"))).await?;
        let names = resp
            .json()
            .await
            .context(TransportSnafu { path: "online" })?;
        Ok(names)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(
        &self,
        path: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        let resp = req.send().await.context(TransportSnafu { path })?;
        let status = resp.status();
        debug!("{} answered {}", path, status);
        if status.is_success() {
            Ok(resp)
        } else {
            StatusSnafu { path, status }.fail()
        }
    }
}
