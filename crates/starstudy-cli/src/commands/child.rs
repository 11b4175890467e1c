use std::io::{BufRead, Write};

use chrono::NaiveDate;
use clap::Subcommand;
use starstudy_core::{ChildDraft, DeleteOutcome, Event};

use super::{print_json, Shell};

#[derive(Subcommand)]
pub enum ChildAction {
    /// Add a child to the roster
    Add {
        #[arg(long)]
        name: String,
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<NaiveDate>,
        /// Subject as NAME:MINUTES (repeatable)
        #[arg(long = "subject")]
        subjects: Vec<String>,
    },
    /// List the roster
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a child from the roster
    Delete {
        /// Child ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

pub async fn run(action: ChildAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut shell = Shell::open().await?;
    let result = dispatch(&mut shell, action).await;
    shell.flush_banners();
    result
}

async fn dispatch(shell: &mut Shell, action: ChildAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ChildAction::Add {
            name,
            birth_date,
            subjects,
        } => {
            let mut draft = ChildDraft::new(name);
            if let Some(date) = birth_date {
                draft = draft.birth_date(date);
            }
            for spec in &subjects {
                let (subject, minutes) = parse_subject(spec)?;
                draft = draft.subject(subject, minutes)?;
            }
            let (child, sync) = shell.app.coordinator_mut().add_child(draft).await?;
            print_json(&Event::child_added(&child, &sync))?;
        }
        ChildAction::List { json } => {
            let roster = shell.app.coordinator().roster();
            if json {
                println!("{}", serde_json::to_string_pretty(roster)?);
            } else if roster.is_empty() {
                println!("No children yet.");
            } else {
                for child in roster {
                    println!("{}  {}  ★ {}", child.id, child.name, child.stars);
                    for subject in &child.subjects {
                        println!("    {}  {} ({} min)", subject.id, subject.name, subject.duration_min);
                    }
                }
            }
        }
        ChildAction::Delete { id, yes } => {
            let outcome = if yes {
                shell.app.coordinator_mut().delete_child(&id, &true).await?
            } else {
                shell.app.coordinator_mut().delete_child(&id, &prompt).await?
            };
            match outcome {
                DeleteOutcome::Deleted(sync) => print_json(&Event::child_deleted(&id, &sync))?,
                DeleteOutcome::NotFound => eprintln!("no child with id {id}"),
                DeleteOutcome::Declined => eprintln!("cancelled"),
            }
        }
    }
    Ok(())
}

/// Split `NAME:MINUTES` at the last colon.
fn parse_subject(spec: &str) -> Result<(&str, u32), String> {
    let (name, minutes) = spec
        .rsplit_once(':')
        .ok_or_else(|| format!("subject must be NAME:MINUTES, got {spec:?}"))?;
    let minutes = minutes
        .trim()
        .parse()
        .map_err(|_| format!("invalid minutes in subject {spec:?}"))?;
    Ok((name.trim(), minutes))
}

/// Ask on stderr, read y/N from stdin.
fn prompt(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_spec_parses() {
        assert_eq!(parse_subject("Math:25").unwrap(), ("Math", 25));
        assert_eq!(parse_subject("Arabic: Reading : 10").unwrap(), ("Arabic: Reading", 10));
    }

    #[test]
    fn subject_spec_rejects_bad_input() {
        assert!(parse_subject("Math").is_err());
        assert!(parse_subject("Math:ten").is_err());
        assert!(parse_subject("Math:-5").is_err());
    }
}
