/**
 * SCHEDULER DE STATUTS - Cycle périodique de sondes sur tout le parc
 *
 * RÔLE : Toutes les `cycle_interval`, photographie le registre, lance une
 * sonde par appareil avec une concurrence bornée, réécrit chaque résultat
 * sous verrou écriture et pousse un point de télémétrie hors verrou.
 *
 * FONCTIONNEMENT : le cycle attend la fin de toutes les sondes (barrière)
 * avant de rendre la main; l'échec d'une tâche est isolé et n'empêche jamais
 * les autres appareils d'enregistrer leur résultat.
 */

use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::models::ProbeResult;
use crate::probe;
use crate::registry::SharedRegistry;
use crate::telemetry::TelemetryEmitter;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub warmup_delay: Duration,
    pub cycle_interval: Duration,
    pub probe_ports: Vec<u16>,
    pub probe_timeout: Duration,
    pub probe_concurrency: usize,
}

/// Démarre la boucle de fond. Premier cycle après `warmup_delay`, le temps
/// que les sous-systèmes dépendants se posent, puis un cycle par intervalle.
pub fn spawn_status_scheduler(
    registry: SharedRegistry,
    telemetry: Option<Arc<TelemetryEmitter>>,
    cfg: SchedulerConfig,
) {
    info!(
        "starting status scheduler (interval {:?}, {} probe slots)",
        cfg.cycle_interval, cfg.probe_concurrency
    );
    tokio::spawn(async move {
        tokio::time::sleep(cfg.warmup_delay).await;
        let mut interval = tokio::time::interval(cfg.cycle_interval);
        loop {
            interval.tick().await;
            run_cycle(&registry, telemetry.as_ref(), &cfg).await;
        }
    });
}

/// Un cycle complet : snapshot, fan-out borné, barrière.
pub async fn run_cycle(
    registry: &SharedRegistry,
    telemetry: Option<&Arc<TelemetryEmitter>>,
    cfg: &SchedulerConfig,
) {
    let targets = registry.snapshot_targets();
    if targets.is_empty() {
        return;
    }

    let permits = Arc::new(Semaphore::new(cfg.probe_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for target in targets {
        let permits = permits.clone();
        let registry = registry.clone();
        let telemetry = telemetry.cloned();
        let ports = cfg.probe_ports.clone();
        let per_port_timeout = cfg.probe_timeout;
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let outcome = probe::probe_host(&target.address, &ports, per_port_timeout).await;
            let result = ProbeResult {
                target,
                status: outcome.status,
                latency_ms: outcome.latency_ms,
                timestamp: OffsetDateTime::now_utc(),
            };
            registry.apply_probe(&result);
            if let Some(telemetry) = telemetry {
                // hors verrou, et jamais fatal pour le cycle
                telemetry.emit(&result).await;
            }
        });
    }

    // barrière : une tâche qui panique est signalée, les autres aboutissent
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("probe task failed: {e}");
        }
    }
    debug!("status cycle complete");
}
