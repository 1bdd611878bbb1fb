#![warn(rust_2018_idioms)]

//! A text front-end for the poker table.

pub mod app;
pub mod command;
pub mod render;

use futures::StreamExt;
use log::{debug, info};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use lnpoker_client::notify::Notices;
use lnpoker_client::route::Route;
use lnpoker_client::session::Services;

use crate::app::{App, Msg};
use crate::command::Command;

/// Clears the terminal before each frame.
const CLEAR: &str = "\x1b[2J\x1b[H";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("reading input: {}", source))]
    Input { source: std::io::Error },
    #[snafu(display("drawing the screen: {}", source))]
    Output { source: std::io::Error },
}

/// Drive the front-end until the player quits, input ends, or `shutdown`
/// flips.
pub async fn run<R, W>(
    services: Services,
    notices: Notices,
    route: Route,
    input: R,
    mut output: W,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut app = App::new(services, route);
    let mut lines = input.lines();
    let mut notices = notices.fuse();
    draw(&app, &mut output).await?;
    while app.is_running() {
        let msg = tokio::select! {
            line = lines.next_line() => match line.context(InputSnafu)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match line.parse::<Command>() {
                    Ok(command) => Msg::Command(command),
                    Err(e) => Msg::Invalid(e.to_string()),
                },
                None => {
                    debug!("input closed");
                    break;
                }
            },
            Some(notice) = notices.next() => Msg::Notice(notice),
            msg = app.next() => msg,
            _ = shutdown.changed() => {
                info!("shutting down");
                break;
            }
        };
        if app.update(msg) {
            draw(&app, &mut output).await?;
        }
    }
    Ok(())
}

async fn draw<W: AsyncWrite + Unpin>(app: &App, output: &mut W) -> Result<(), Error> {
    let frame = format!("{}{}\n> ", CLEAR, app.view());
    output
        .write_all(frame.as_bytes())
        .await
        .context(OutputSnafu)?;
    output.flush().await.context(OutputSnafu)
}
