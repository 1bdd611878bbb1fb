use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use warp::http::StatusCode;
use warp::Filter;

use lnpoker_client::actions::{self, ActionClient};
use lnpoker_client::identity::Identity;
use lnpoker_client::live::memory::MemorySource;
use lnpoker_client::notify::{self, Level, Notices};
use lnpoker_client::presence::TOKEN_HEADER;
use lnpoker_client::session::{self, Services, REFILL_NOTICE};
use lnpoker_client::settings::Settings;
use lnpoker_game::display::Viewer;
use lnpoker_game::model::Account;

type Received = Arc<Mutex<Vec<(String, Value)>>>;

const ONLINE_DELAY: Duration = Duration::from_millis(200);

/// A stand-in for the action endpoint and the bot's endpoints. Every
/// request is recorded as (path, payload).
struct FakeBackend {
    addr: SocketAddr,
    received: Received,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeBackend {
    fn start() -> Self {
        let received: Received = Arc::new(Mutex::new(Vec::new()));

        let log = received.clone();
        let action = warp::post()
            .and(warp::path("action"))
            .and(warp::path::end())
            .and(warp::body::json())
            .map(move |body: Value| {
                log.lock().unwrap().push(("action".into(), body.clone()));
                let reply = if body["amount"].as_u64().map_or(false, |a| a > 1000) {
                    json!({"error": "Bet is bigger than your stack"})
                } else if body["type"] == "fold" {
                    json!({"error": ""})
                } else {
                    json!({"id": "ignored"})
                };
                warp::reply::json(&reply)
            });

        let log = received.clone();
        let deposit = warp::post()
            .and(warp::path!("app" / "poker" / "deposit"))
            .and(warp::header::<String>(TOKEN_HEADER))
            .and(warp::body::form())
            .map(move |token: String, form: HashMap<String, String>| {
                log.lock()
                    .unwrap()
                    .push(("deposit".into(), json!({"token": token, "form": form})));
                warp::reply()
            });

        let log = received.clone();
        let playing = warp::post()
            .and(warp::path!("app" / "poker" / "playing"))
            .and(warp::header::<String>(TOKEN_HEADER))
            .map(move |token: String| {
                log.lock()
                    .unwrap()
                    .push(("playing".into(), json!({"token": token})));
                warp::reply()
            });

        // Slower than a table refresh, so lookups overlap other updates.
        let online = warp::get()
            .and(warp::path!("app" / "poker" / "online"))
            .and_then(|| async {
                tokio::time::sleep(ONLINE_DELAY).await;
                Ok::<_, warp::Rejection>(warp::reply::json(&json!({"h2": "satoshi"})))
            });

        let ip = warp::get()
            .and(warp::path("ip"))
            .map(|| warp::reply::json(&json!({"origin": "203.0.113.9"})));

        let broken = warp::post()
            .and(warp::path("broken"))
            .map(|| warp::reply::with_status("upstream timeout", StatusCode::BAD_GATEWAY));

        let routes = action
            .or(deposit)
            .or(playing)
            .or(online)
            .or(ip)
            .or(broken);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(routes)
            .bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });
        tokio::spawn(server);
        FakeBackend {
            addr,
            received,
            shutdown: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    fn received(&self) -> Vec<(String, Value)> {
        self.received.lock().unwrap().clone()
    }

    fn services(&self, source: &Arc<MemorySource>, bot: Option<&str>) -> (Services, Notices) {
        let mut settings = Settings::default();
        settings.backend.action_url = self.url("action");
        settings.backend.app_url = self.url("app/poker/");
        settings.backend.poll_interval_ms = 20;
        settings.account.ip_echo_url = Some(self.url("ip"));
        let (notifier, notices) = notify::channel();
        let services = Services::with_source(
            &settings,
            Identity::new("me".into(), bot.map(str::to_owned)),
            source.clone(),
            reqwest::Client::new(),
            notifier,
        );
        (services, notices)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn table_with_seats(source: &MemorySource) {
    source.put("tables", "t1", json!({"smallBlind": 5, "bigBlind": 10, "buyIn": 1000}));
    source.put(
        "players",
        "p7",
        json!({"tableId": "t1", "position": 7, "accountHash": "h1", "chips": 1000, "active": true}),
    );
    source.put(
        "players",
        "p2",
        json!({"tableId": "t1", "position": 2, "accountHash": "h2", "chips": 800}),
    );
}

fn viewer() -> Viewer {
    Viewer {
        account_id: "me".into(),
        account_hash: Some("h1".into()),
    }
}

#[tokio::test]
async fn accepted_action_is_posted_as_flat_json() {
    let backend = FakeBackend::start();
    let client = ActionClient::new(reqwest::Client::new(), backend.url("action"));
    client.call(&"t1".into(), &"p7".into()).await.unwrap();
    assert_eq!(
        backend.received(),
        vec![(
            "action".to_string(),
            json!({"type": "call", "tableId": "t1", "playerId": "p7"})
        )]
    );
}

#[tokio::test]
async fn rejected_action_carries_the_backend_message_verbatim() {
    let backend = FakeBackend::start();
    let client = ActionClient::new(reqwest::Client::new(), backend.url("action"));
    let err = client.bet(&"t1".into(), &"p7".into(), 5000).await.unwrap_err();
    assert!(matches!(err, actions::Error::Rejected { .. }));
    assert_eq!(err.to_string(), "Bet is bigger than your stack");
}

#[tokio::test]
async fn empty_error_counts_as_accepted() {
    let backend = FakeBackend::start();
    let client = ActionClient::new(reqwest::Client::new(), backend.url("action"));
    client.fold(&"t1".into(), &"p7".into()).await.unwrap();
    assert_eq!(backend.received().len(), 1);
}

#[tokio::test]
async fn unreadable_failure_reports_the_status() {
    let backend = FakeBackend::start();
    let client = ActionClient::new(reqwest::Client::new(), backend.url("broken"));
    let err = client.fold(&"t1".into(), &"p7".into()).await.unwrap_err();
    match err {
        actions::Error::Status { status } => assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = ActionClient::new(reqwest::Client::new(), format!("http://{}/action", addr));
    let err = client.all_in(&"t1".into(), &"p7".into()).await.unwrap_err();
    assert!(matches!(err, actions::Error::Transport { .. }));
}

#[tokio::test]
async fn short_balance_requests_a_deposit_and_does_not_sit() {
    let backend = FakeBackend::start();
    let source = Arc::new(MemorySource::new());
    source.put("tables", "t1", json!({"buyIn": 1000}));
    let (services, mut notices) = backend.services(&source, Some("bot42"));
    let table = services.table("t1".into());
    eventually("table", || table.table().ready().is_some()).await;

    let account = Account {
        balance: 400,
        ..Account::default()
    };
    let err = table.sit(3, Some(&account)).await.unwrap_err();
    assert!(matches!(err, session::Error::InsufficientBalance { .. }));

    let notice = notices.next().await.unwrap();
    assert_eq!(notice.level, Level::Info);
    assert_eq!(notice.text, REFILL_NOTICE);

    let received = backend.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "deposit");
    assert_eq!(received[0].1["form"], json!({"satoshis": "600"}));
    // base64 of "bot42~me"
    assert_eq!(received[0].1["token"], "Ym90NDJ+bWU=");
}

#[tokio::test]
async fn sitting_marks_presence_then_adds_the_player() {
    let backend = FakeBackend::start();
    let source = Arc::new(MemorySource::new());
    source.put("tables", "t1", json!({"buyIn": 1000}));
    let (services, _notices) = backend.services(&source, Some("bot42"));
    let table = services.table("t1".into());
    eventually("seats", || table.seats().ready().is_some()).await;
    eventually("table", || table.table().ready().is_some()).await;

    let account = Account {
        balance: 1000,
        ..Account::default()
    };
    table.sit(3, Some(&account)).await.unwrap();

    let paths: Vec<_> = backend.received().into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths, vec!["playing", "action"]);
    assert_eq!(
        backend.received()[1].1,
        json!({"type": "add", "tableId": "t1", "accountId": "me", "position": 3})
    );
}

#[tokio::test]
async fn rejected_move_reaches_the_user() {
    let backend = FakeBackend::start();
    let source = Arc::new(MemorySource::new());
    table_with_seats(&source);
    let (services, mut notices) = backend.services(&source, None);
    let table = services.table("t1".into());
    eventually("seats", || table.seats().ready().map_or(false, |s| s.len() == 2)).await;

    assert!(table.bet(&viewer(), 5000).await.is_err());
    let notice = notices.next().await.unwrap();
    assert_eq!(notice.level, Level::Error);
    assert_eq!(notice.text, "Bet is bigger than your stack");

    table.bet(&viewer(), 50).await.unwrap();
    let (_, last) = backend.received().pop().unwrap();
    assert_eq!(
        last,
        json!({"type": "bet", "tableId": "t1", "playerId": "p7", "amount": 50})
    );
}

#[tokio::test]
async fn seat_changes_refresh_player_names() {
    let backend = FakeBackend::start();
    let source = Arc::new(MemorySource::new());
    table_with_seats(&source);
    let (services, _notices) = backend.services(&source, None);
    let mut table = services.table("t1".into());
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(2), table.changed())
            .await
            .unwrap();
    }
    table.refresh_names().await;
    assert_eq!(table.name(&"h2".into()).as_deref(), Some("satoshi"));
    assert_eq!(table.name(&"h1".into()), None);
}

#[tokio::test]
async fn name_lookups_survive_interrupted_waits() {
    let backend = FakeBackend::start();
    let source = Arc::new(MemorySource::new());
    table_with_seats(&source);
    let (services, _notices) = backend.services(&source, None);
    let mut table = services.table("t1".into());

    // Every wait is cut short well before the lookup answers, the way a
    // countdown tick interrupts the table screen.
    for _ in 0..300 {
        if table.name(&"h2".into()).is_some() {
            break;
        }
        tokio::time::timeout(Duration::from_millis(10), table.changed())
            .await
            .ok();
    }
    assert_eq!(table.name(&"h2".into()).as_deref(), Some("satoshi"));
}

#[tokio::test]
async fn new_account_is_created_with_its_public_address() {
    let backend = FakeBackend::start();
    let source = Arc::new(MemorySource::new());
    let (services, _notices) = backend.services(&source, None);
    let mut account = services.account();
    tokio::time::timeout(Duration::from_secs(2), account.changed())
        .await
        .unwrap();

    eventually("created", || source.get("accounts", "me").is_some()).await;
    let created = source.get("accounts", "me").unwrap();
    assert_eq!(created["ip"], "203.0.113.9");
    assert_eq!(created["referrer"], "");
    eventually("account", || account.snapshot().ready().is_some()).await;
}

#[tokio::test]
async fn lobby_sorts_tables_regardless_of_arrival_order() {
    let backend = FakeBackend::start();
    let source = Arc::new(MemorySource::new());
    source.put("tables", "zz", json!({"smallBlind": 10, "playing": 3}));
    let (services, _notices) = backend.services(&source, None);
    let lobby = services.lobby();
    eventually("first table", || {
        lobby.rows().ready().map_or(false, |rows| rows.len() == 1)
    })
    .await;

    source.put("tables", "aa", json!({"smallBlind": 5}));
    eventually("second table", || {
        lobby.rows().ready().map_or(false, |rows| rows.len() == 2)
    })
    .await;
    let rows = lobby.rows();
    let blinds: Vec<_> = rows.ready().unwrap().iter().map(|t| t.small_blind).collect();
    assert_eq!(blinds, vec![5, 10]);
}
