use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::models::DeviceStatus;

/// Résultat brut d'une sonde, sans identité d'appareil.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub status: DeviceStatus,
    pub latency_ms: i64,
}

/// Sonde de joignabilité : tente une connexion TCP courte sur chaque port
/// candidat, dans l'ordre. La première connexion réussie donne `online` et la
/// latence depuis le début de la sonde; la connexion est refermée aussitôt.
/// Aucun port joignable dans son délai individuel donne `offline`, latence 0.
/// Pas de retry ici, la cadence est l'affaire du scheduler.
pub async fn probe_host(address: &str, ports: &[u16], per_port_timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();
    for &port in ports {
        match timeout(per_port_timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                return ProbeOutcome {
                    status: DeviceStatus::Online,
                    latency_ms: start.elapsed().as_millis() as i64,
                };
            }
            // refus ou délai dépassé : on passe au port suivant
            Ok(Err(_)) | Err(_) => continue,
        }
    }
    ProbeOutcome {
        status: DeviceStatus::Offline,
        latency_ms: 0,
    }
}
