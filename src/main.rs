/**
 * VEILLEUR - Point d'entrée du moniteur de parc
 *
 * RÔLE : Bootstrap complet : environnement, inventaire CSV, registre
 * partagé, scheduler de sondes, orchestrateur de reboot, serveur HTTP.
 *
 * ARCHITECTURE : un registre unique derrière un verrou lecteur/écrivain,
 * un cycle de fond qui le remplit, une API REST qui le lit. L'inventaire
 * manquant ou invalide empêche le démarrage; identifiants VIA et InfluxDB
 * absents dégradent seulement les fonctions correspondantes.
 */

mod config;
mod http;
mod loader;
mod models;
mod probe;
mod reboot;
mod registry;
mod scheduler;
mod telemetry;

use crate::config::AppConfig;
use crate::http::AppState;
use crate::reboot::{Actuator, RebootOrchestrator};
use crate::registry::{DeviceRegistry, SharedRegistry};
use crate::scheduler::SchedulerConfig;
use crate::telemetry::TelemetryEmitter;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // ok si .env absent

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veilleur=info")),
        )
        .init();

    let cfg = AppConfig::from_env();

    // inventaire chargé une fois; fichier ou colonne manquants = fatal
    let devices = loader::load_devices(&cfg.devices_csv).with_context(|| {
        format!(
            "cannot load device inventory from {}",
            cfg.devices_csv.display()
        )
    })?;

    let registry: SharedRegistry = Arc::new(DeviceRegistry::new());
    registry.replace_all(devices);
    info!("{} devices under watch", registry.len());

    let telemetry = cfg
        .influx
        .as_ref()
        .map(|influx| Arc::new(TelemetryEmitter::new(influx)));

    scheduler::spawn_status_scheduler(
        registry.clone(),
        telemetry,
        SchedulerConfig {
            warmup_delay: cfg.warmup_delay,
            cycle_interval: cfg.cycle_interval,
            probe_ports: cfg.probe_ports.clone(),
            probe_timeout: cfg.probe_timeout,
            probe_concurrency: cfg.probe_concurrency,
        },
    );

    let orchestrator = Arc::new(RebootOrchestrator::new(
        registry.clone(),
        Actuator::from_config(&cfg),
    ));
    let app = http::build_router(
        AppState {
            registry,
            orchestrator,
        },
        &cfg.client_dir,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr)
        .await
        .context("cannot bind HTTP listener")?;
    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}
