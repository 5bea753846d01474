use reqwest::Client;
use tracing::{debug, warn};

use crate::config::InfluxConfig;
use crate::models::{DeviceStatus, ProbeResult};

/// Export best-effort vers le write API InfluxDB v2 (line protocol).
/// Un échec d'écriture est signalé dans les logs et rien d'autre : la
/// télémétrie n'est pas le système de référence et ne doit jamais bloquer un
/// cycle ni une réponse HTTP.
pub struct TelemetryEmitter {
    client: Client,
    write_url: String,
    org: String,
    bucket: String,
    token: String,
}

impl TelemetryEmitter {
    pub fn new(cfg: &InfluxConfig) -> Self {
        Self {
            client: Client::new(),
            write_url: format!("{}/api/v2/write", cfg.url.trim_end_matches('/')),
            org: cfg.org.clone(),
            bucket: cfg.bucket.clone(),
            token: cfg.token.clone(),
        }
    }

    /// Un point par résultat de sonde, horodaté côté serveur.
    pub async fn emit(&self, result: &ProbeResult) {
        let line = line_protocol(result);
        let mut request = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(line);
        if !self.token.is_empty() {
            request = request.header("Authorization", format!("Token {}", self.token));
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("telemetry written for {}", result.target.name);
            }
            Ok(response) => {
                warn!(
                    "telemetry write rejected for {}: HTTP {}",
                    result.target.name,
                    response.status()
                );
            }
            Err(e) => {
                warn!("telemetry write failed for {}: {e}", result.target.name);
            }
        }
    }
}

fn line_protocol(result: &ProbeResult) -> String {
    let online = matches!(result.status, DeviceStatus::Online) as i64;
    format!(
        "device_reachability,deviceName={},deviceAddress={},building={},tech={} \
         status_str=\"{}\",status={}i,latency_ms={}i {}",
        escape_tag(&result.target.name),
        escape_tag(&result.target.address),
        escape_tag(&result.target.building),
        escape_tag(&result.target.tech),
        escape_string_field(result.status.as_str()),
        online,
        result.latency_ms,
        result.timestamp.unix_timestamp_nanos(),
    )
}

// line protocol : virgules, égals et espaces s'échappent dans les tags
fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn escape_string_field(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeTarget;
    use time::OffsetDateTime;

    fn result(status: DeviceStatus, latency_ms: i64) -> ProbeResult {
        ProbeResult {
            target: ProbeTarget {
                name: "Salle 101".into(),
                address: "10.0.0.1".into(),
                building: "Pavillon A".into(),
                tech: "VIA".into(),
            },
            status,
            latency_ms,
            timestamp: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        }
    }

    #[test]
    fn online_point_carries_flag_and_latency() {
        let line = line_protocol(&result(DeviceStatus::Online, 42));
        assert!(line.starts_with("device_reachability,"));
        assert!(line.contains("deviceName=Salle\\ 101"));
        assert!(line.contains("building=Pavillon\\ A"));
        assert!(line.contains("status_str=\"online\""));
        assert!(line.contains("status=1i"));
        assert!(line.contains("latency_ms=42i"));
        assert!(line.ends_with("1700000000000000000"));
    }

    #[test]
    fn offline_point_has_zero_flag() {
        let line = line_protocol(&result(DeviceStatus::Offline, 0));
        assert!(line.contains("status_str=\"offline\""));
        assert!(line.contains("status=0i"));
        assert!(line.contains("latency_ms=0i"));
    }

    #[test]
    fn tag_escaping_covers_commas_and_equals() {
        assert_eq!(escape_tag("a,b=c d"), "a\\,b\\=c\\ d");
    }
}
