pub mod auth;
pub mod child;
pub mod config;
pub mod session;
pub mod star;

use serde::Serialize;
use starstudy_core::{App, AppContext, Config, Database, Event, Notification, NotificationKind};
use tokio::sync::broadcast;
use tracing::debug;

/// An app resolved from config and the on-disk cache, plus the
/// notifications it raises while the command runs.
pub struct Shell {
    pub app: App,
    banners: broadcast::Receiver<Notification>,
}

impl Shell {
    pub async fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let db = Database::open()?;
        let ctx = AppContext::from_config(&config, Box::new(db))?;
        let banners = ctx.notifier.subscribe();
        let mut app = App::new(ctx);
        for event in app.start().await? {
            debug!(?event, "startup");
        }
        Ok(Self { app, banners })
    }

    /// Print every notification raised so far to stderr.
    pub fn flush_banners(&mut self) {
        while let Ok(n) = self.banners.try_recv() {
            let tag = match n.kind {
                NotificationKind::Success => "ok",
                NotificationKind::Error => "error",
                NotificationKind::Info => "info",
            };
            eprintln!("[{tag}] {}", n.message);
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn print_events(events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        print_json(event)?;
    }
    Ok(())
}
