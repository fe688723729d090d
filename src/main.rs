use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use field_ap_controller::{
    access_point::AccessPoint, config::AppConfig, ssh_client::SshCommandRunner,
};
use log::{debug, error, info, warn};
use std::{io::Write, sync::Arc, time::Duration};
use tokio::{
    signal::unix::{SignalKind, signal},
    time::interval,
};

type Controller = AccessPoint<SshCommandRunner>;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::get().context("failed to load application configuration")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let access_point = Arc::new(AccessPoint::new(SshCommandRunner::new()));
    access_point.update_settings(config.access_point.clone());

    if let Err(e) = access_point.apply_admin_settings().await {
        error!("failed to configure access point admin settings: {e}");
    }

    let controller_task = tokio::spawn({
        let access_point = Arc::clone(&access_point);
        async move { access_point.run().await }
    });
    let telemetry_task = tokio::spawn(log_status(
        Arc::clone(&access_point),
        config.telemetry.status_log_interval,
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c");
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM");
        },
        result = controller_task => {
            warn!("access point controller stopped unexpectedly: {result:?}");
        },
    }

    telemetry_task.abort();
    debug!("good bye");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

async fn log_status(access_point: Arc<Controller>, period: Duration) {
    let mut ticker = interval(period);

    loop {
        ticker.tick().await;

        let statuses = access_point.status_snapshot();
        match serde_json::to_string(&statuses) {
            Ok(json) => info!("station status: {json}"),
            Err(e) => warn!("failed to serialize station status: {e}"),
        }

        let metrics = access_point.metrics();
        if metrics.cycle_in_progress {
            info!(
                "WiFi configuration in progress ({} retries, {} verification failures so far)",
                metrics.command_retries, metrics.verification_failures
            );
        }
    }
}
