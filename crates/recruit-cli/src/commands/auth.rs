//! Authentication commands.

use super::Session;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_pipeline::AuthError;
use std::io::{self, Write};

/// Login with email and password.
pub async fn login(session: &Session, email: Option<String>, format: OutputFormat) -> Result<()> {
    let status = session.pipeline.status();
    if status.authenticated {
        let who = status.email.or(status.user_id).unwrap_or_else(|| "unknown".to_string());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(());
    }

    let email = match email {
        Some(email) => email,
        None => {
            print!("Email: ");
            io::stdout().flush()?;
            let mut email = String::new();
            io::stdin().read_line(&mut email)?;
            email.trim().to_string()
        }
    };
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    match session.pipeline.login(&email, &password).await {
        Ok(signed_in) => {
            let who = signed_in.identity.email.unwrap_or(email);
            output::print_success(&format!("Logged in as {}", who), format);
            Ok(())
        }
        Err(AuthError::InvalidCredentials(message)) => {
            anyhow::bail!("Login failed: {}", message)
        }
        Err(err) => Err(err.into()),
    }
}

/// Logout and clear the session.
pub async fn logout(session: &Session, format: OutputFormat) -> Result<()> {
    if session.pipeline.logout().await? {
        output::print_success("Logged out successfully", format);
    } else {
        output::print_success("Not logged in", format);
    }
    Ok(())
}

/// Show authentication status.
pub fn status(session: &Session, format: OutputFormat) -> Result<()> {
    let snapshot = session.pipeline.status();

    match format {
        OutputFormat::Text => {
            if snapshot.authenticated {
                output::print_row("Auth", "logged in");
                if let Some(email) = &snapshot.email {
                    output::print_row("Email", email);
                }
                if let Some(name) = &snapshot.name {
                    output::print_row("Name", name);
                }
                if let Some(role) = &snapshot.role {
                    output::print_row("Role", role);
                }
                if let Some(user_id) = &snapshot.user_id {
                    output::print_row("User ID", user_id);
                }
            } else {
                output::print_row("Auth", "not logged in");
            }
            output::print_row("Phase", snapshot.phase.as_str());
        }
        OutputFormat::Json => output::print_json(&snapshot),
    }
    Ok(())
}
