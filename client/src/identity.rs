//! The client's account identity.
//!
//! The identity is created once at start-up and handed by reference to
//! whatever needs it; nothing else reads the storage for it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;

use lnpoker_game::model::AccountId;

use crate::storage::{self, LocalStorage};

const ACCOUNT_KEY: &str = "accountId";
const BOT_KEY: &str = "botId";

/// Length of generated identifiers, matching the document database's
/// auto ids.
const ID_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    account_id: AccountId,
    bot_id: Option<String>,
}

impl Identity {
    pub fn new(account_id: AccountId, bot_id: Option<String>) -> Self {
        Identity { account_id, bot_id }
    }

    /// Read the identity from `storage`, generating and storing a new
    /// account identifier on first use.
    ///
    /// `account_id` and `bot_id` override (and replace) the stored values.
    pub fn load_or_create(
        storage: &mut LocalStorage,
        account_id: Option<&str>,
        bot_id: Option<&str>,
    ) -> Result<Self, storage::Error> {
        if let Some(bot) = bot_id {
            storage.set(BOT_KEY, bot)?;
        }
        let stored = storage.get(ACCOUNT_KEY).map(str::to_owned);
        let account_id = match (account_id, stored) {
            (Some(given), _) => {
                storage.set(ACCOUNT_KEY, given)?;
                given.to_owned()
            }
            (None, Some(stored)) => stored,
            (None, None) => {
                let fresh = generate_id(&mut rand::thread_rng());
                info!("generated new account id {}", fresh);
                storage.set(ACCOUNT_KEY, &fresh)?;
                fresh
            }
        };
        Ok(Identity {
            account_id: AccountId(account_id),
            bot_id: storage.get(BOT_KEY).map(str::to_owned),
        })
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn bot_id(&self) -> Option<&str> {
        self.bot_id.as_deref()
    }

    /// The token the deposit and presence endpoints authenticate with, if
    /// this account belongs to a bot user.
    pub fn poker_token(&self) -> Option<String> {
        self.bot_id
            .as_ref()
            .map(|bot| STANDARD.encode(format!("{}~{}", bot, self.account_id)))
    }
}

/// A random alphanumeric document id.
pub fn generate_id<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}
