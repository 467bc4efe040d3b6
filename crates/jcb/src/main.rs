use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use jcb_circuit::CircuitClient;
use jcb_core::{config::Config, scheduler::Scheduler};
use jcb_jira::JiraHttpTransport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(Config::load().context("loading configuration")?);
    jcb_core::logging::init(&cfg.log_level, &cfg.sdk_log_level)?;

    let transport = Arc::new(
        JiraHttpTransport::new(cfg.jira_request_timeout, cfg.jira_accept_invalid_certs)
            .context("building jira transport")?,
    );
    let chat = Arc::new(
        CircuitClient::new(
            cfg.circuit_domain.clone(),
            cfg.circuit_client_id.clone(),
            cfg.circuit_client_secret.clone(),
        )
        .context("building circuit client")?,
    );

    let scheduler = Scheduler::new(cfg, chat, transport);

    tokio::select! {
        res = scheduler.run() => {
            let err = match res {
                Ok(()) => anyhow::anyhow!("scheduler stopped unexpectedly"),
                Err(e) => e.into(),
            };
            error!(error = %err, "bot stopped");
            Err(err)
        }
        res = signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            info!("interrupted, exiting");
            Ok(())
        }
    }
}
