//! `bulkfetch login` – check credentials and the `[auth]` settings.

use anyhow::{Context, Result};
use bulkfetch_core::auth::Authenticator;
use bulkfetch_core::config::FetchConfig;
use bulkfetch_core::task::Credentials;

use super::run::form_login;

pub async fn run_login(cfg: &FetchConfig, credentials: Credentials) -> Result<()> {
    let login = form_login(cfg)?;
    let session = tokio::task::spawn_blocking(move || login.login(&credentials))
        .await
        .context("login task panicked")??;
    println!("login ok: {}", session.cookie_names().join(", "));
    Ok(())
}
