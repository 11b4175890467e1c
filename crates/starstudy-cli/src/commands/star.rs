use starstudy_core::{Event, StarOutcome};

use super::{print_json, Shell};

pub async fn run(child_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut shell = Shell::open().await?;
    let outcome = shell.app.coordinator_mut().add_star(child_id).await;
    shell.flush_banners();
    match outcome? {
        StarOutcome::Awarded { stars, sync } => print_json(&Event::star_awarded(child_id, stars, &sync)),
        StarOutcome::NotFound => Err(format!("no child with id {child_id}").into()),
    }
}
