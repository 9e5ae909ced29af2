//! SLIRC Bouncer - upstream side of an IRC bouncer
//!
//! Architecture:
//! - One tokio task per account runs a `Session` event loop
//! - One tokio task per upstream connection runs the transport adapter
//! - Communication via unbounded mpsc channels (session events and commands)

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use slirc_bouncer::backend::TcpConnector;
use slirc_bouncer::config::{self, Account};
use slirc_bouncer::logging;
use slirc_bouncer::push::PushNotification;
use slirc_bouncer::{Session, SessionHandle};

#[derive(Debug, Parser)]
#[command(name = "slirc-bouncer", version, about = "Persistent upstream IRC sessions")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `slirc_bouncer=trace`; RUST_LOG takes precedence
    #[arg(short, long)]
    log_level: Option<String>,
}

/// Build and spawn the session for one configured account
fn start_account(
    account: &Account,
    max_backlog: Option<usize>,
    push_tx: &mpsc::UnboundedSender<PushNotification>,
) -> anyhow::Result<(SessionHandle, tokio::task::JoinHandle<()>)> {
    let session = Session::new(&account.name, &account.nick, TcpConnector)
        .with_push_sink(push_tx.clone());
    let (handle, task) = SessionHandle::spawn(session);

    handle.set_max_backlog(max_backlog)?;
    for client in &account.clients {
        handle.add_client(client)?;
    }
    for room in &account.rooms {
        handle.join_room(room)?;
    }
    // Hosts last: the first one starts the connection
    for host in &account.hosts {
        handle.add_host(host.clone())?;
    }
    Ok((handle, task))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    let settings = config::load_settings(cli.config.as_deref()).context("loading settings")?;
    if settings.accounts.is_empty() {
        anyhow::bail!("no accounts configured");
    }

    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<PushNotification>();
    tokio::spawn(async move {
        // Delivery to a push gateway lives outside this process
        while let Some(n) = push_rx.recv().await {
            info!(account = %n.account, device = %n.device_token, from = %n.sender, target = %n.target, "push notification");
        }
    });

    let mut sessions = Vec::new();
    for account in &settings.accounts {
        info!(account = %account.name, hosts = account.hosts.len(), "starting session");
        sessions.push(start_account(account, settings.max_backlog, &push_tx)?);
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");

    for (handle, task) in sessions {
        handle.shutdown();
        if let Err(e) = task.await {
            error!(account = %handle.name(), error = %e, "session task failed");
        }
    }
    Ok(())
}
