use std::io::Write;

use clap::Subcommand;
use starstudy_core::Event;

use super::{print_json, Shell};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a countdown for one subject; Ctrl-C cancels without a star
    Start {
        /// Child ID
        child_id: String,
        /// Subject ID
        subject_id: String,
    },
}

pub async fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut shell = Shell::open().await?;
    let result = match action {
        SessionAction::Start { child_id, subject_id } => countdown(&mut shell, &child_id, &subject_id).await,
    };
    shell.flush_banners();
    result
}

async fn countdown(shell: &mut Shell, child_id: &str, subject_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let started = shell.app.start_session(child_id, subject_id)?;
    print_json(&started)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                // `None` means the countdown already hit zero; keep draining
                // so its completion and star are reported.
                if let Some(event) = shell.app.cancel_session().await {
                    return print_json(&event);
                }
            }
            event = shell.app.next_event() => match event? {
                Some(Event::SessionTicked { display, .. }) => {
                    eprint!("\r{display} ");
                    let _ = std::io::stderr().flush();
                }
                Some(event @ Event::StarAwarded { .. }) => {
                    eprintln!();
                    return print_json(&event);
                }
                Some(event) => {
                    if matches!(event, Event::SessionCompleted { .. }) {
                        eprintln!();
                    }
                    print_json(&event)?;
                }
                None => return Ok(()),
            }
        }
    }
}
