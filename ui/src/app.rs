use std::collections::BTreeMap;
use std::future::Future;

use futures::future;
use log::{debug, info};

use lnpoker_client::notify::Notice;
use lnpoker_client::route::Route;
use lnpoker_client::session::{self, AccountWatch, LobbySession, Services, TableSession};
use lnpoker_client::ticker::Countdown;
use lnpoker_game::display::Viewer;

use crate::command::{Command, HELP};
use crate::render::{self, TableFrame};

pub enum Msg {
    Command(Command),
    /// A line that did not parse.
    Invalid(String),
    Notice(Notice),
    /// New account, lobby or table data.
    Refresh,
    /// A fold countdown moved.
    Tick,
}

enum Screen {
    Lobby(LobbySession),
    Table(TableScreen),
}

struct TableScreen {
    session: TableSession,
    countdowns: BTreeMap<u8, Countdown>,
}

impl TableScreen {
    fn new(session: TableSession) -> Self {
        TableScreen {
            session,
            countdowns: BTreeMap::new(),
        }
    }

    /// Run a countdown for every seat with a fold deadline, and stop those
    /// whose deadline is gone.
    fn sync_countdowns(&mut self, viewer: &Viewer) {
        let view = self.session.view(viewer);
        let deadlines: BTreeMap<u8, _> = view
            .slots
            .iter()
            .filter_map(|s| s.seat())
            .filter_map(|s| s.fold_at.map(|at| (s.position, at)))
            .collect();
        self.countdowns
            .retain(|position, c| deadlines.get(position) == Some(&c.deadline()));
        for (position, deadline) in deadlines {
            if !self.countdowns.contains_key(&position) {
                let countdown = self.session.countdown(deadline);
                self.countdowns.insert(position, countdown);
            }
        }
    }

    async fn changed(&mut self) -> Msg {
        let TableScreen {
            session,
            countdowns,
        } = self;
        tokio::select! {
            _ = session.changed() => Msg::Refresh,
            _ = next_tick(countdowns) => Msg::Tick,
        }
    }
}

async fn next_tick(countdowns: &mut BTreeMap<u8, Countdown>) {
    if countdowns.is_empty() {
        return future::pending().await;
    }
    future::select_all(countdowns.values_mut().map(|c| Box::pin(c.changed()))).await;
}

/// The whole front-end state: the account, the current screen and the
/// notice being shown.
pub struct App {
    services: Services,
    account: AccountWatch,
    screen: Screen,
    notice: Option<Notice>,
    running: bool,
}

impl App {
    pub fn new(services: Services, route: Route) -> Self {
        let account = services.account();
        let screen = open(&services, route);
        App {
            services,
            account,
            screen,
            notice: None,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn route(&self) -> Route {
        match &self.screen {
            Screen::Lobby(_) => Route::Lobby,
            Screen::Table(t) => Route::Table(t.session.id().clone()),
        }
    }

    /// Wait for something on screen to change.
    pub async fn next(&mut self) -> Msg {
        let App {
            account, screen, ..
        } = self;
        match screen {
            Screen::Lobby(lobby) => tokio::select! {
                _ = account.changed() => Msg::Refresh,
                _ = lobby.changed() => Msg::Refresh,
            },
            Screen::Table(table) => tokio::select! {
                _ = account.changed() => Msg::Refresh,
                msg = table.changed() => msg,
            },
        }
    }

    /// Apply `msg`. Returns whether the screen needs redrawing.
    pub fn update(&mut self, msg: Msg) -> bool {
        match msg {
            Msg::Command(command) => self.command(command),
            Msg::Invalid(text) => self.notice = Some(Notice::error(text)),
            Msg::Notice(notice) => self.notice = Some(notice),
            Msg::Refresh => {
                let viewer = self.viewer();
                if let Screen::Table(table) = &mut self.screen {
                    table.sync_countdowns(&viewer);
                }
            }
            Msg::Tick => {}
        }
        true
    }

    fn command(&mut self, command: Command) {
        match command {
            Command::Lobby => self.navigate(Route::Lobby),
            Command::Open(id) => self.navigate(Route::Table(id)),
            Command::Dismiss => self.notice = None,
            Command::Help => self.notice = Some(Notice::info(HELP)),
            Command::Quit => self.running = false,
            play => self.play(play),
        }
    }

    fn play(&mut self, command: Command) {
        let table = match &self.screen {
            Screen::Table(table) => &table.session,
            Screen::Lobby(_) => {
                self.notice = Some(Notice::error("open a table first"));
                return;
            }
        };
        let account = self.account.snapshot();
        let viewer = self.services.viewer(account.ready());
        match command {
            Command::Sit(position) => spawn(table.sit(position, account.ready())),
            Command::Leave => spawn(table.leave(&viewer)),
            Command::Bet(amount) => spawn(table.bet(&viewer, amount)),
            Command::Call => spawn(table.call(&viewer)),
            Command::Fold => spawn(table.fold(&viewer)),
            Command::AllIn => spawn(table.all_in(&viewer)),
            _ => {}
        }
    }

    fn navigate(&mut self, route: Route) {
        if route == self.route() {
            return;
        }
        info!("navigating to {}", route);
        // The old screen's feeds and countdowns stop here.
        self.screen = open(&self.services, route);
    }

    fn viewer(&self) -> Viewer {
        self.services.viewer(self.account.snapshot().ready())
    }

    pub fn view(&self) -> String {
        let account = self.account.snapshot();
        let body = match &self.screen {
            Screen::Lobby(lobby) => render::lobby(&lobby.rows()),
            Screen::Table(table) => {
                let view = table.session.view(&self.viewer());
                let names = table.session.names();
                let progress: BTreeMap<u8, f64> = table
                    .countdowns
                    .iter()
                    .map(|(position, c)| (*position, c.progress()))
                    .collect();
                render::table(&TableFrame {
                    table: &table.session.table(),
                    view: &view,
                    seats_loaded: table.session.seats().ready().is_some(),
                    names: &names,
                    countdowns: &progress,
                })
            }
        };
        let mut lines = vec![render::balance(&account), String::new(), body];
        if let Some(notice) = &self.notice {
            lines.push(String::new());
            lines.push(render::notice(notice));
        }
        lines.join("\n")
    }
}

fn open(services: &Services, route: Route) -> Screen {
    match route {
        Route::Lobby => Screen::Lobby(services.lobby()),
        Route::Table(id) => Screen::Table(TableScreen::new(services.table(id))),
    }
}

// Moves run in the background; failures reach the user as notices.
fn spawn<F>(act: F)
where
    F: Future<Output = Result<(), session::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = act.await {
            debug!("move failed: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnpoker_client::identity::Identity;
    use lnpoker_client::live::memory::MemorySource;
    use lnpoker_client::notify::{self, Notices};
    use lnpoker_client::settings::Settings;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn app(source: &Arc<MemorySource>, route: Route) -> (App, Notices) {
        let mut settings = Settings::default();
        settings.backend.poll_interval_ms = 100;
        settings.account.ip_echo_url = None;
        settings.backend.app_url = "http://127.0.0.1:9/app/poker".into();
        settings.backend.action_url = "http://127.0.0.1:9/action".into();
        let (notifier, notices) = notify::channel();
        let services = Services::with_source(
            &settings,
            Identity::new("me".into(), None),
            source.clone(),
            reqwest::Client::new(),
            notifier,
        );
        (App::new(services, route), notices)
    }

    // Apply messages until the screen has been quiet for a while.
    async fn settle(app: &mut App) {
        while let Ok(msg) = tokio::time::timeout(Duration::from_millis(500), app.next()).await {
            app.update(msg);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lobby_then_table_and_back() {
        let source = Arc::new(MemorySource::new());
        source.put("accounts", "me", json!({"balance": 2500, "hash": "h1"}));
        source.put("tables", "t2", json!({"smallBlind": 10, "bigBlind": 20}));
        source.put("tables", "t1", json!({"smallBlind": 5, "bigBlind": 10}));
        let (mut app, _notices) = app(&source, Route::Lobby);
        settle(&mut app).await;
        assert_eq!(app.account.snapshot().ready().map(|a| a.balance), Some(2500));
        let screen = app.view();
        assert!(screen.starts_with("Balance: 2500 sats"));
        assert!(screen.find("t1").unwrap() < screen.find("t2").unwrap());

        app.update(Msg::Command(Command::Open("t1".into())));
        assert_eq!(app.route(), Route::Table("t1".into()));
        settle(&mut app).await;
        assert!(app.view().contains("Table t1"));

        app.update(Msg::Command(Command::Lobby));
        assert_eq!(app.route(), Route::Lobby);
    }

    #[tokio::test(start_paused = true)]
    async fn fold_deadline_runs_a_countdown_until_it_is_cleared() {
        let source = Arc::new(MemorySource::new());
        source.put("accounts", "me", json!({"hash": "h1"}));
        source.put("tables", "t1", json!({"bigBlind": 10}));
        let deadline = chrono::Utc::now() + chrono::Duration::seconds(20);
        source.put(
            "players",
            "p4",
            json!({"tableId": "t1", "position": 4, "state": "called", "foldAt": deadline}),
        );
        let (mut app, _notices) = app(&source, Route::Table("t1".into()));
        settle(&mut app).await;
        match &app.screen {
            Screen::Table(t) => assert!(t.countdowns.contains_key(&4)),
            Screen::Lobby(_) => panic!("expected the table screen"),
        }
        assert!(app.view().contains("[#"));

        source.put(
            "players",
            "p4",
            json!({"tableId": "t1", "position": 4, "state": "called"}),
        );
        tokio::time::sleep(Duration::from_millis(300)).await;
        settle(&mut app).await;
        match &app.screen {
            Screen::Table(t) => assert!(t.countdowns.is_empty()),
            Screen::Lobby(_) => panic!("expected the table screen"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn moves_need_a_table_and_notices_can_be_dismissed() {
        let source = Arc::new(MemorySource::new());
        let (mut app, _notices) = app(&source, Route::Lobby);
        app.update(Msg::Command(Command::Fold));
        assert!(app.view().contains("[error] open a table first"));
        app.update(Msg::Command(Command::Dismiss));
        assert!(!app.view().contains("[error]"));
        app.update(Msg::Command(Command::Quit));
        assert!(!app.is_running());
    }
}
