use clap::Subcommand;
use serde_json::json;
use starstudy_core::auth::SignUpForm;

use super::{print_events, print_json, Shell};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create a parent account; verify the email before signing in
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Repeat the password
        #[arg(long)]
        confirm: String,
        /// Display name (defaults to the email)
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Sign in and load the roster from the cloud
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the remembered account
    SignOut,
    /// Show the signed-in parent
    Status,
}

pub async fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut shell = Shell::open().await?;
    let result = dispatch(&mut shell, action).await;
    shell.flush_banners();
    result
}

async fn dispatch(shell: &mut Shell, action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::SignUp {
            email,
            password,
            confirm,
            name,
        } => {
            let form = SignUpForm {
                name,
                email,
                password,
                confirm,
            };
            let parent = shell.app.sign_up(&form).await?;
            print_json(&parent)?;
        }
        AuthAction::SignIn { email, password } => {
            let events = shell.app.sign_in(&email, &password).await?;
            print_events(&events)?;
        }
        AuthAction::SignOut => {
            let event = shell.app.sign_out().await?;
            print_json(&event)?;
        }
        AuthAction::Status => {
            let status = match shell.app.coordinator().parent() {
                Some(parent) => json!({
                    "signed_in": true,
                    "uid": parent.id,
                    "name": parent.display_name(),
                    "email": parent.email,
                    "children": shell.app.coordinator().roster().len(),
                }),
                None => json!({
                    "signed_in": false,
                    "children": shell.app.coordinator().roster().len(),
                }),
            };
            print_json(&status)?;
        }
    }
    Ok(())
}
