//! Live views of backend documents.
//!
//! A [`LiveStore`] hands out [`Subscription`]s. Each subscription is backed
//! by a feed that refetches its query on a fixed interval and publishes a
//! new [`Snapshot`] whenever the result changes. Subscribers to the same
//! query share one feed; the feed stops when its last subscription is
//! dropped.

pub mod firestore;
pub mod memory;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use snafu::Snafu;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use lnpoker_game::model::{Account, AccountId, Seat, Table, TableId};

/// `tokio::time::interval` refuses a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("request for {} failed: {}", what, source))]
    Transport { what: String, source: reqwest::Error },
    #[snafu(display("{} answered with {}", what, status))]
    Status {
        what: String,
        status: reqwest::StatusCode,
    },
    #[snafu(display("malformed response for {}: {}", what, detail))]
    Malformed { what: String, detail: String },
    #[snafu(display("{} already exists", what))]
    Exists { what: String },
}

/// What a subscription asks for.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Query {
    /// A single document.
    Document { collection: String, id: String },
    /// The documents of a collection, optionally restricted to those whose
    /// string `field` equals `value`, and to at most `limit` documents.
    Collection {
        collection: String,
        filter: Option<(String, String)>,
        limit: Option<usize>,
    },
}

impl Query {
    pub fn document(collection: &str, id: &str) -> Self {
        Query::Document {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(collection: &str) -> Self {
        Query::Collection {
            collection: collection.into(),
            filter: None,
            limit: None,
        }
    }

    pub fn filter_eq(self, field: &str, value: &str) -> Self {
        match self {
            Query::Collection {
                collection, limit, ..
            } => Query::Collection {
                collection,
                filter: Some((field.into(), value.into())),
                limit,
            },
            doc => doc,
        }
    }

    pub fn limit(self, n: usize) -> Self {
        match self {
            Query::Collection {
                collection, filter, ..
            } => Query::Collection {
                collection,
                filter,
                limit: Some(n),
            },
            doc => doc,
        }
    }
}

/// The latest known state of a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
    /// Nothing fetched yet.
    Loading,
    /// The document does not exist (yet).
    Missing,
    Ready(T),
    Failed(String),
}

impl<T> Snapshot<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Snapshot::Ready(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Snapshot::Loading)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        match self {
            Snapshot::Loading => Snapshot::Loading,
            Snapshot::Missing => Snapshot::Missing,
            Snapshot::Ready(t) => Snapshot::Ready(f(t)),
            Snapshot::Failed(e) => Snapshot::Failed(e),
        }
    }
}

/// Where documents come from.
///
/// Documents are plain JSON objects carrying their document id under `id`.
#[async_trait]
pub trait DocumentSource: Send + Sync + 'static {
    /// Run `query`. A document query yields the document or `None` if it
    /// does not exist; a collection query yields an array.
    async fn fetch(&self, query: &Query) -> Result<Option<Value>, Error>;

    /// Create the document `collection/id` with `fields`.
    async fn create(&self, collection: &str, id: &str, fields: Value) -> Result<(), Error>;
}

// One polling task per distinct query. Dropping the feed stops the task.
struct Feed {
    query: Query,
    rx: watch::Receiver<Snapshot<Value>>,
    task: JoinHandle<()>,
}

impl Drop for Feed {
    fn drop(&mut self) {
        debug!("releasing feed {:?}", self.query);
        self.task.abort();
    }
}

/// A handle on live data of type `T`.
///
/// Holding the handle keeps the underlying feed running; dropping the last
/// handle for a query stops it.
pub struct Subscription<T> {
    feed: Arc<Feed>,
    rx: watch::Receiver<Snapshot<Value>>,
    _type: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Subscription<T> {
    /// The current snapshot, decoded.
    pub fn snapshot(&self) -> Snapshot<T> {
        match &*self.rx.borrow() {
            Snapshot::Loading => Snapshot::Loading,
            Snapshot::Missing => Snapshot::Missing,
            Snapshot::Failed(e) => Snapshot::Failed(e.clone()),
            Snapshot::Ready(v) => match serde_json::from_value(v.clone()) {
                Ok(t) => Snapshot::Ready(t),
                Err(e) => Snapshot::Failed(format!("undecodable {:?}: {}", self.feed.query, e)),
            },
        }
    }

    /// Wait for the next snapshot. Never resolves once the feed has stopped.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            future::pending::<()>().await;
        }
    }

    pub fn query(&self) -> &Query {
        &self.feed.query
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Subscription {
            feed: self.feed.clone(),
            rx: self.feed.rx.clone(),
            _type: PhantomData,
        }
    }
}

/// Registry of live feeds over one [`DocumentSource`].
pub struct LiveStore {
    source: Arc<dyn DocumentSource>,
    poll_interval: Duration,
    lobby_limit: usize,
    feeds: Mutex<HashMap<Query, Weak<Feed>>>,
}

impl LiveStore {
    pub fn new(source: Arc<dyn DocumentSource>, poll_interval: Duration, lobby_limit: usize) -> Self {
        LiveStore {
            source,
            poll_interval,
            lobby_limit,
            feeds: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn DocumentSource> {
        &self.source
    }

    /// Subscribe to `query`, joining the running feed if there is one.
    ///
    /// Must be called within a tokio runtime.
    pub fn watch<T: DeserializeOwned>(&self, query: Query) -> Subscription<T> {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        feeds.retain(|_, feed| feed.strong_count() > 0);
        let feed = match feeds.get(&query).and_then(Weak::upgrade) {
            Some(feed) => feed,
            None => {
                let feed = Arc::new(self.start(query.clone()));
                feeds.insert(query, Arc::downgrade(&feed));
                feed
            }
        };
        Subscription {
            rx: feed.rx.clone(),
            feed,
            _type: PhantomData,
        }
    }

    /// Number of feeds currently running.
    pub fn active_feeds(&self) -> usize {
        self.feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|f| f.strong_count() > 0)
            .count()
    }

    pub fn account(&self, id: &AccountId) -> Subscription<Account> {
        self.watch(Query::document("accounts", id.as_str()))
    }

    pub fn table(&self, id: &TableId) -> Subscription<Table> {
        self.watch(Query::document("tables", id.as_str()))
    }

    pub fn seats(&self, table_id: &TableId) -> Subscription<Vec<Seat>> {
        self.watch(Query::collection("players").filter_eq("tableId", table_id.as_str()))
    }

    pub fn tables(&self) -> Subscription<Vec<Table>> {
        self.watch(Query::collection("tables").limit(self.lobby_limit))
    }

    fn start(&self, query: Query) -> Feed {
        debug!("starting feed {:?}", query);
        let (tx, rx) = watch::channel(Snapshot::Loading);
        let task = tokio::spawn(poll(
            self.source.clone(),
            query.clone(),
            tx,
            self.poll_interval,
        ));
        Feed { query, rx, task }
    }
}

async fn poll(
    source: Arc<dyn DocumentSource>,
    query: Query,
    tx: watch::Sender<Snapshot<Value>>,
    every: Duration,
) {
    let mut ticker = time::interval(every.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let next = match source.fetch(&query).await {
            Ok(Some(value)) => Snapshot::Ready(value),
            Ok(None) => Snapshot::Missing,
            Err(e) => {
                warn!("fetching {:?}: {}", query, e);
                Snapshot::Failed(e.to_string())
            }
        };
        tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
