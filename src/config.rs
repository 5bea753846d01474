use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ViaCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub devices_csv: PathBuf,
    pub client_dir: PathBuf,
    pub listen_port: u16,
    pub probe_ports: Vec<u16>,
    pub probe_timeout: Duration,
    pub probe_concurrency: usize,
    pub cycle_interval: Duration,
    pub warmup_delay: Duration,
    pub reboot_command: String,
    pub reboot_script: PathBuf,
    pub reboot_timeout: Duration,
    pub via: Option<ViaCredentials>,
    pub influx: Option<InfluxConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            devices_csv: "appareils.csv".into(),
            client_dir: "client".into(),
            listen_port: 5050,
            probe_ports: vec![80, 443],
            probe_timeout: Duration::from_secs(3),
            probe_concurrency: 32,
            cycle_interval: Duration::from_secs(10),
            warmup_delay: Duration::from_secs(2),
            reboot_command: "node".into(),
            reboot_script: "reboot-via-puppeteer.js".into(),
            reboot_timeout: Duration::from_secs(120),
            via: None,
            influx: None,
        }
    }
}

impl AppConfig {
    /// Construit la configuration depuis l'environnement (après dotenvy).
    /// Les valeurs absentes ou invalides retombent sur les défauts.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = env::var("DEVICES_CSV") {
            cfg.devices_csv = path.into();
        }
        if let Ok(dir) = env::var("CLIENT_DIR") {
            cfg.client_dir = dir.into();
        }
        cfg.listen_port = env_parse("PORT", cfg.listen_port);
        cfg.probe_timeout = Duration::from_secs(env_parse("PROBE_TIMEOUT_SECS", 3));
        cfg.probe_concurrency = env_parse("PROBE_CONCURRENCY", cfg.probe_concurrency).max(1);
        cfg.cycle_interval = Duration::from_secs(env_parse("CHECK_INTERVAL_SECS", 10).max(1));
        cfg.warmup_delay = Duration::from_secs(env_parse("WARMUP_DELAY_SECS", 2));
        if let Ok(command) = env::var("REBOOT_COMMAND") {
            cfg.reboot_command = command;
        }
        if let Ok(script) = env::var("REBOOT_SCRIPT") {
            cfg.reboot_script = script.into();
        }
        cfg.reboot_timeout = Duration::from_secs(env_parse("REBOOT_TIMEOUT_SECS", 120).max(1));

        cfg.via = match (env::var("VIA_USERNAME"), env::var("VIA_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                info!("VIA credentials loaded");
                Some(ViaCredentials { username, password })
            }
            _ => {
                warn!("VIA_USERNAME/VIA_PASSWORD not set, remote reboot disabled");
                None
            }
        };

        let influx_url = env::var("INFLUXDB_URL").unwrap_or_default();
        let influx_bucket = env::var("INFLUXDB_BUCKET").unwrap_or_default();
        cfg.influx = if influx_url.is_empty() || influx_bucket.is_empty() {
            warn!("INFLUXDB_URL/INFLUXDB_BUCKET not set, telemetry disabled");
            None
        } else {
            let mut org = env::var("INFLUXDB_ORG").unwrap_or_default();
            if org.is_empty() {
                // le write API v2 exige une org, même factice
                info!("INFLUXDB_ORG not set, using '-'");
                org = "-".into();
            }
            Some(InfluxConfig {
                url: influx_url,
                token: env::var("INFLUXDB_TOKEN").unwrap_or_default(),
                org,
                bucket: influx_bucket,
            })
        };

        cfg
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
