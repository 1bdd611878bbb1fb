//! The channel through which failures and hints reach the user.

use std::fmt;

use futures::channel::mpsc;
use log::debug;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Level {
    Info,
    Error,
}

/// A dismissible message for the user.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notice {
    pub level: Level,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice {
            level: Level::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice {
            level: Level::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Sending half, cloned into every session that may need to tell the user
/// something.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

/// Receiving half, owned by the front-end.
pub type Notices = mpsc::UnboundedReceiver<Notice>;

pub fn channel() -> (Notifier, Notices) {
    let (tx, rx) = mpsc::unbounded();
    (Notifier { tx }, rx)
}

impl Notifier {
    pub fn show(&self, notice: Notice) {
        if let Err(e) = self.tx.unbounded_send(notice) {
            debug!("nobody listening for notice: {}", e.into_inner());
        }
    }

    pub fn error(&self, text: impl Into<String>) {
        self.show(Notice::error(text))
    }

    pub fn info(&self, text: impl Into<String>) {
        self.show(Notice::info(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn notices_arrive_in_order() {
        let (notifier, mut notices) = channel();
        notifier.error("seat taken");
        notifier.clone().info("refilling");
        drop(notifier);
        assert_eq!(notices.next().await, Some(Notice::error("seat taken")));
        assert_eq!(notices.next().await, Some(Notice::info("refilling")));
        assert_eq!(notices.next().await, None);
    }
}
