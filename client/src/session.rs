//! The lobby, table and account sessions the front-end drives.
//!
//! [`Services`] is built once at start-up and cloned into every session.
//! Sessions own their subscriptions, so leaving a screen (dropping its
//! session) releases the feeds it was watching.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use snafu::{ResultExt, Snafu};
use tokio::sync::watch;

use lnpoker_game::cipher::{CardCipher, SaltedAes};
use lnpoker_game::display::{self, TableView, Viewer};
use lnpoker_game::model::{Account, AccountHash, Chips, Seat, SeatId, SeatMap, Table, TableId};

use crate::actions::{self, ActionClient};
use crate::identity::Identity;
use crate::live::firestore::FirestoreSource;
use crate::live::{DocumentSource, LiveStore, Snapshot, Subscription};
use crate::notify::Notifier;
use crate::presence::PresenceClient;
use crate::settings::{self, Settings, TableSettings};
use crate::ticker::{Clock, Countdown, SystemClock};

/// Shown instead of sitting down when the account cannot cover the buy-in.
pub const REFILL_NOTICE: &str = "Please wait while your balance is refilled then try again.";

/// An account is created without its address rather than wait longer.
const IP_ECHO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not set up the HTTP client: {}", source))]
    Http { source: reqwest::Error },
    #[snafu(display("your account is still loading"))]
    AccountLoading,
    #[snafu(display("you are not seated at this table"))]
    NotSeated,
    #[snafu(display("you are already seated at this table"))]
    AlreadySeated,
    #[snafu(display("seat {} is taken", position))]
    SeatTaken { position: u8 },
    #[snafu(display("{}", REFILL_NOTICE))]
    InsufficientBalance { balance: Chips, buy_in: Chips },
    #[snafu(display("{}", source))]
    Action { source: actions::Error },
}

/// Shared handles to the backend, one set per process.
#[derive(Clone)]
pub struct Services {
    identity: Arc<Identity>,
    live: Arc<LiveStore>,
    actions: ActionClient,
    presence: PresenceClient,
    notifier: Notifier,
    cipher: Arc<dyn CardCipher>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    table: TableSettings,
    account: settings::Account,
    bootstrapped: Arc<AtomicBool>,
}

impl Services {
    /// Services reading live data from the configured document database.
    pub fn connect(settings: &Settings, identity: Identity, notifier: Notifier) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(settings.account.user_agent.as_str())
            .build()
            .context(HttpSnafu)?;
        let source = Arc::new(FirestoreSource::new(
            http.clone(),
            &settings.backend.database_url,
            &settings.backend.project_id,
            settings.backend.api_key.clone(),
        ));
        Ok(Self::with_source(settings, identity, source, http, notifier))
    }

    pub fn with_source(
        settings: &Settings,
        identity: Identity,
        source: Arc<dyn DocumentSource>,
        http: reqwest::Client,
        notifier: Notifier,
    ) -> Self {
        let live = LiveStore::new(
            source,
            settings.backend.poll_interval(),
            settings.table.lobby_limit,
        );
        Services {
            actions: ActionClient::new(http.clone(), settings.backend.action_url.as_str()),
            presence: PresenceClient::new(http.clone(), settings.backend.app_url.as_str(), &identity),
            identity: Arc::new(identity),
            live: Arc::new(live),
            notifier,
            cipher: Arc::new(SaltedAes),
            clock: Arc::new(SystemClock),
            http,
            table: settings.table.clone(),
            account: settings.account.clone(),
            bootstrapped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn live(&self) -> &LiveStore {
        &self.live
    }

    /// Who the viewer is, as far as is known from `account`.
    pub fn viewer(&self, account: Option<&Account>) -> Viewer {
        Viewer {
            account_id: self.identity.account_id().clone(),
            account_hash: account.and_then(|a| a.hash.clone()),
        }
    }

    pub fn account(&self) -> AccountWatch {
        AccountWatch {
            sub: self.live.account(self.identity.account_id()),
            services: self.clone(),
        }
    }

    pub fn lobby(&self) -> LobbySession {
        LobbySession {
            tables: self.live.tables(),
        }
    }

    pub fn table(&self, id: TableId) -> TableSession {
        let (names, names_seen) = watch::channel(HashMap::new());
        TableSession {
            table: self.live.table(&id),
            seats: self.live.seats(&id),
            id,
            names: Arc::new(names),
            names_seen,
            services: self.clone(),
        }
    }

    /// Create the account document in the background. Starts at most once
    /// per process, however many watchers see the account missing, and
    /// finishes even if the watcher that started it is dropped.
    fn bootstrap_account(&self) {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            return;
        }
        let services = self.clone();
        tokio::spawn(async move {
            let id = services.identity.account_id();
            info!("creating account {}", id);
            let fields = json!({
                "userAgent": services.account.user_agent,
                "referrer": services.account.referrer,
                "ip": services.public_ip().await,
            });
            if let Err(e) = services.live.source().create("accounts", id.as_str(), fields).await {
                warn!("could not create account {}: {}", id, e);
            }
        });
    }

    async fn public_ip(&self) -> String {
        #[derive(Deserialize)]
        struct Echo {
            origin: String,
        }

        let url = match &self.account.ip_echo_url {
            Some(url) => url,
            None => return "-".into(),
        };
        let echo = match self.http.get(url).timeout(IP_ECHO_TIMEOUT).send().await {
            Ok(resp) => resp.json::<Echo>().await,
            Err(e) => Err(e),
        };
        match echo {
            Ok(echo) => echo.origin,
            Err(e) => {
                debug!("ip echo failed: {}", e);
                "-".into()
            }
        }
    }

    /// Surface `e` to the user and hand it back.
    fn report(&self, e: Error) -> Error {
        match &e {
            Error::InsufficientBalance { .. } => self.notifier.info(e.to_string()),
            _ => self.notifier.error(e.to_string()),
        }
        e
    }
}

/// The viewer's own account document.
pub struct AccountWatch {
    services: Services,
    sub: Subscription<Account>,
}

impl AccountWatch {
    pub fn snapshot(&self) -> Snapshot<Account> {
        self.sub.snapshot()
    }

    /// Wait for the next snapshot. If it says the account does not exist,
    /// its creation is started; the document shows up in a later snapshot.
    pub async fn changed(&mut self) {
        self.sub.changed().await;
        if let Snapshot::Missing = self.sub.snapshot() {
            self.services.bootstrap_account();
        }
    }
}

/// The table list, sorted for display.
pub struct LobbySession {
    tables: Subscription<Vec<Table>>,
}

impl LobbySession {
    pub fn rows(&self) -> Snapshot<Vec<Table>> {
        self.tables.snapshot().map(display::lobby)
    }

    pub async fn changed(&mut self) {
        self.tables.changed().await
    }
}

enum Sit {
    Refill { balance: Chips, buy_in: Chips },
    Join,
}

/// One table and its seats.
pub struct TableSession {
    services: Services,
    id: TableId,
    table: Subscription<Table>,
    seats: Subscription<Vec<Seat>>,
    names: Arc<watch::Sender<HashMap<AccountHash, String>>>,
    names_seen: watch::Receiver<HashMap<AccountHash, String>>,
}

impl TableSession {
    pub fn id(&self) -> &TableId {
        &self.id
    }

    pub fn table(&self) -> Snapshot<Table> {
        self.table.snapshot()
    }

    pub fn seats(&self) -> Snapshot<SeatMap> {
        self.seats.snapshot().map(SeatMap::from_iter)
    }

    /// The table as `viewer` sees it. Seats still loading or failed show
    /// as empty.
    pub fn view(&self, viewer: &Viewer) -> TableView {
        let table = self.table.snapshot();
        let seats = match self.seats() {
            Snapshot::Ready(seats) => seats,
            _ => SeatMap::default(),
        };
        display::reduce(table.ready(), &seats, viewer, &*self.services.cipher)
    }

    pub fn names(&self) -> HashMap<AccountHash, String> {
        self.names.borrow().clone()
    }

    /// Display name of the player with fingerprint `hash`, if online.
    pub fn name(&self, hash: &AccountHash) -> Option<String> {
        self.names.borrow().get(hash).cloned()
    }

    /// Wait for either snapshot or the player names to change. Names are
    /// looked up again in the background whenever the seats change, so a
    /// lookup outlives a wait that is cut short.
    pub async fn changed(&mut self) {
        tokio::select! {
            _ = self.table.changed() => {}
            _ = self.seats.changed() => {
                tokio::spawn(self.lookup_names());
            }
            _ = self.names_seen.changed() => {}
        }
    }

    pub async fn refresh_names(&self) {
        self.lookup_names().await
    }

    fn lookup_names(&self) -> impl Future<Output = ()> + Send + 'static {
        let presence = self.services.presence.clone();
        let names = self.names.clone();
        async move {
            match presence.online_names().await {
                Ok(online) => {
                    names.send_replace(online);
                }
                Err(e) => debug!("online names unavailable: {}", e),
            }
        }
    }

    /// A countdown towards a seat's fold deadline.
    pub fn countdown(&self, deadline: DateTime<Utc>) -> Countdown {
        Countdown::start(
            deadline,
            self.services.table.fold_delay(),
            self.services.table.tick(),
            self.services.clock.clone(),
        )
    }

    /// Sit at `position`, topping up the account first if it cannot cover
    /// the buy-in.
    ///
    /// The checks run against the current snapshots; the returned future
    /// owns everything it needs and may be spawned.
    pub fn sit(
        &self,
        position: u8,
        account: Option<&Account>,
    ) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        let plan = self.plan_sit(position, account);
        let services = self.services.clone();
        let table = self.id.clone();
        async move {
            let result = match plan {
                Err(e) => Err(e),
                Ok(Sit::Refill { balance, buy_in }) => {
                    let missing = buy_in - balance;
                    if let Err(e) = services.presence.deposit(missing).await {
                        warn!("deposit of {} sats failed: {}", missing, e);
                    }
                    InsufficientBalanceSnafu { balance, buy_in }.fail()
                }
                Ok(Sit::Join) => {
                    if let Err(e) = services.presence.mark_playing().await {
                        warn!("could not mark account as playing: {}", e);
                    }
                    services
                        .actions
                        .add_player(&table, services.identity.account_id(), position)
                        .await
                        .context(ActionSnafu)
                }
            };
            result.map_err(|e| services.report(e))
        }
    }

    fn plan_sit(&self, position: u8, account: Option<&Account>) -> Result<Sit, Error> {
        let account = account.ok_or(Error::AccountLoading)?;
        if let Snapshot::Ready(seats) = self.seats() {
            if let Some(hash) = &account.hash {
                if seats.owned_by(hash).is_some() {
                    return AlreadySeatedSnafu.fail();
                }
            }
            if seats.get(position).is_some() {
                return SeatTakenSnafu { position }.fail();
            }
        }
        let buy_in = self.table.snapshot().ready().map_or(0, |t| t.buy_in);
        if account.balance < buy_in {
            Ok(Sit::Refill {
                balance: account.balance,
                buy_in,
            })
        } else {
            Ok(Sit::Join)
        }
    }

    pub fn leave(&self, viewer: &Viewer) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        let account = self.services.identity.account_id().clone();
        self.act(viewer, move |actions, table, seat| async move {
            actions.remove_player(&table, &account, &seat).await
        })
    }

    pub fn bet(
        &self,
        viewer: &Viewer,
        amount: Chips,
    ) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        self.act(viewer, move |actions, table, seat| async move {
            actions.bet(&table, &seat, amount).await
        })
    }

    /// Call the current bet, or check when nothing is open.
    pub fn call(&self, viewer: &Viewer) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        self.act(viewer, |actions, table, seat| async move {
            actions.call(&table, &seat).await
        })
    }

    pub fn fold(&self, viewer: &Viewer) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        self.act(viewer, |actions, table, seat| async move {
            actions.fold(&table, &seat).await
        })
    }

    pub fn all_in(&self, viewer: &Viewer) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        self.act(viewer, |actions, table, seat| async move {
            actions.all_in(&table, &seat).await
        })
    }

    // Run a move as the viewer's seat, reporting any failure.
    fn act<F, Fut>(
        &self,
        viewer: &Viewer,
        act: F,
    ) -> impl Future<Output = Result<(), Error>> + Send + 'static
    where
        F: FnOnce(ActionClient, TableId, SeatId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), actions::Error>> + Send + 'static,
    {
        let seat = self.my_seat_id(viewer);
        let services = self.services.clone();
        let table = self.id.clone();
        async move {
            let result = match seat {
                Some(seat) => act(services.actions.clone(), table, seat)
                    .await
                    .context(ActionSnafu),
                None => NotSeatedSnafu.fail(),
            };
            result.map_err(|e| services.report(e))
        }
    }

    fn my_seat_id(&self, viewer: &Viewer) -> Option<SeatId> {
        let hash = viewer.account_hash.as_ref()?;
        let seats = self.seats();
        seats.ready()?.owned_by(hash).map(|s| s.id.clone())
    }
}
