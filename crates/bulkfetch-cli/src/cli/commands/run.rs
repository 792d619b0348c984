//! `bulkfetch run` – download a manifest.

use anyhow::{bail, Context, Result};
use bulkfetch_core::auth::{Authenticator, FormLogin};
use bulkfetch_core::config::FetchConfig;
use bulkfetch_core::forbidden::{self, ForbiddenSet};
use bulkfetch_core::manifest::{filter_forbidden, ManifestFile, TaskSource};
use bulkfetch_core::orchestrator::{self, RunOptions};
use bulkfetch_core::task::Credentials;
use bulkfetch_core::worker::sweep_temp_files;
use bulkfetch_core::transport::{CurlTransport, Transport, TransportOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub manifest: PathBuf,
    pub out_dir: PathBuf,
    pub workers: Option<usize>,
    pub no_overwrite: bool,
    pub ignore_forbidden: bool,
}

impl RunArgs {
    /// Config values, with flags applied on top. Flags only ever override
    /// what they name; an unset flag leaves the config value alone.
    pub fn run_options(&self, cfg: &FetchConfig) -> RunOptions {
        let mut opts = RunOptions::from_config(cfg, &self.out_dir);
        if let Some(n) = self.workers {
            opts.workers = n;
        }
        if self.no_overwrite {
            opts.overwrite = false;
        }
        opts
    }
}

pub(crate) fn form_login(cfg: &FetchConfig) -> Result<FormLogin> {
    let auth = cfg
        .auth
        .clone()
        .context("no [auth] section in config; set at least auth.login_url")?;
    Ok(FormLogin::new(auth).with_timeouts(
        Duration::from_secs(cfg.connect_timeout_secs),
        Duration::from_secs(cfg.transfer_timeout_secs),
    ))
}

pub async fn run_download(cfg: &FetchConfig, credentials: Credentials, args: RunArgs) -> Result<()> {
    let authenticator: Arc<dyn Authenticator> = Arc::new(form_login(cfg)?);
    let transport: Arc<dyn Transport> = Arc::new(CurlTransport::new(TransportOptions::from_config(cfg)));

    let forbidden_path = forbidden::default_path(&args.out_dir);
    let known = forbidden::load_from_path(&forbidden_path)?;
    if !known.is_empty() {
        tracing::info!(count = known.len(), path = %forbidden_path.display(), "loaded forbidden files");
    }
    let forbidden_set = ForbiddenSet::from_ids(known);

    let source = ManifestFile::new(&args.manifest, &args.out_dir);
    let mut tasks = source.tasks(&credentials)?;
    if !args.ignore_forbidden {
        let (kept, dropped) = filter_forbidden(tasks, &forbidden_set);
        if dropped > 0 {
            tracing::info!(dropped, "skipping files forbidden in earlier runs");
        }
        tasks = kept;
    }

    let opts = args.run_options(cfg);

    let run_set = forbidden_set.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
        orchestrator::run(tasks, &credentials, &opts, run_set, transport, authenticator)
    });

    let report = tokio::select! {
        joined = &mut handle => joined.context("download run panicked")??,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            let snapshot = forbidden_set.snapshot();
            forbidden::save_to_path(&forbidden_path, &snapshot)?;
            tracing::warn!(count = snapshot.len(), "interrupted; forbidden files saved");
            eprintln!("interrupted; saved {} forbidden file id(s) to {}", snapshot.len(), forbidden_path.display());
            // Exiting skips the workers' cleanup, so their temp files go here.
            match sweep_temp_files(&args.out_dir) {
                Ok(0) => {}
                Ok(n) => tracing::info!(removed = n, "removed unfinished downloads"),
                Err(e) => tracing::warn!("could not remove unfinished downloads: {:#}", e),
            }
            std::process::exit(130);
        }
    };

    forbidden::save_to_path(&forbidden_path, &report.forbidden)?;
    println!("{}", report);
    if report.login_failed {
        bail!("login failed; {} task(s) abandoned", report.counts.abandoned);
    }
    Ok(())
}
