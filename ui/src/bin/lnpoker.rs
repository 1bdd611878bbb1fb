#![warn(rust_2018_idioms)]

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use flexi_logger::{FileSpec, LogSpecBuilder, Logger};
use log::{error, info, warn, LevelFilter};
use tokio::io::BufReader;
use tokio::sync::watch;

use lnpoker_client::identity::Identity;
use lnpoker_client::notify;
use lnpoker_client::route::Route;
use lnpoker_client::session::Services;
use lnpoker_client::settings;
use lnpoker_client::storage::LocalStorage;

/// Play poker with your Lightning balance.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// `/` for the lobby or `/{tableId}` for a table.
    #[arg(default_value = "/")]
    path: String,
    /// Extra configuration file, merged over the standard ones.
    #[arg(short, long, env = "LNPOKER_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let route = Route::parse(&args.path)
        .with_context(|| format!("`{}` is neither `/` nor `/{{tableId}}`", args.path))?;
    let settings = settings::load(args.config.as_deref())?;
    let _logger = setup_logger(&settings.logging)?;
    let shutdown_rx = setup_signal()?;
    let runtime = setup_runtime(&settings.runtime)?;

    let mut storage = LocalStorage::open(&settings.account.storage_path)?;
    let identity = Identity::load_or_create(
        &mut storage,
        settings.account.account_id.as_deref(),
        settings.account.bot_id.as_deref(),
    )?;
    info!(
        "playing as account {} (stored in {})",
        identity.account_id(),
        storage.path().display()
    );
    if identity.bot_id().is_none() {
        warn!("no bot id known for this account; deposits and presence are disabled");
    }
    if settings.backend.poll_interval_ms == 0 {
        warn!("backend.poll_interval_ms must be positive; adjusting to {}", settings::MIN_PERIOD_MS);
    }
    if settings.table.tick_ms == 0 {
        warn!("table.tick_ms must be positive; adjusting to {}", settings::MIN_PERIOD_MS);
    }

    runtime.block_on(async move {
        let (notifier, notices) = notify::channel();
        let services = Services::connect(&settings, identity, notifier)?;
        let input = BufReader::new(tokio::io::stdin());
        let output = tokio::io::stdout();
        if let Err(e) = lnpoker_ui::run(services, notices, route, input, output, shutdown_rx).await {
            error!("front-end stopped: {}", e);
            return Err(e.into());
        }
        Ok::<_, anyhow::Error>(())
    })?;
    info!("good-bye");
    Ok(())
}

// Stdout carries the screen, so logs go to stderr or to files.
fn setup_logger(l: &settings::Logging) -> anyhow::Result<flexi_logger::LoggerHandle> {
    let mut spec_builder = LogSpecBuilder::new();
    spec_builder.default(LevelFilter::from_str(&l.level)?);
    let spec = spec_builder.build();
    let logger = Logger::with(spec).format(flexi_logger::default_format);
    let logger = match &l.directory {
        Some(dir) => logger.log_to_file(FileSpec::default().directory(dir)),
        None => logger.log_to_stderr(),
    };
    Ok(logger.start()?)
}

fn setup_signal() -> anyhow::Result<watch::Receiver<bool>> {
    let (signal_tx, signal_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("received interrupt signal");
        signal_tx.send_replace(true);
    })?;
    Ok(signal_rx)
}

fn setup_runtime(r: &settings::Runtime) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = if r.threaded {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.worker_threads(r.worker_threads.max(1));
        builder
    } else {
        tokio::runtime::Builder::new_current_thread()
    };
    builder.enable_all().thread_name(&r.thread_name);
    Ok(builder.build()?)
}
