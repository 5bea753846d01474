use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Statut observé d'un appareil. `Checking` n'existe qu'entre le chargement
/// et le premier cycle de sondes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Checking,
    Online,
    Offline,
    Rebooting,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Checking => "checking",
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Rebooting => "rebooting",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    pub address: String,
    pub mac: String,
    pub building: String,
    pub tech: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reboot_initiated_at: Option<i64>,
    pub is_rebooting: bool,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    pub latency_ms: i64,
}

impl Device {
    pub fn new(name: String, address: String, mac: String, building: String, tech: String) -> Self {
        Self {
            name,
            address,
            mac,
            building,
            tech,
            reboot_initiated_at: None,
            is_rebooting: false,
            status: DeviceStatus::Checking,
            last_seen: None,
            latency_ms: 0,
        }
    }
}

/// Identité d'un appareil prise sous verrou lecture pour la durée d'un cycle.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub name: String,
    pub address: String,
    pub building: String,
    pub tech: String,
}

/// Résultat éphémère d'une sonde, consommé par le registre et la télémétrie.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub status: DeviceStatus,
    pub latency_ms: i64,
    pub timestamp: OffsetDateTime,
}

/// Ticket rendu par le registre quand une demande de reboot est validée.
#[derive(Debug, Clone)]
pub struct RebootTicket {
    pub name: String,
    pub address: String,
    pub tech: String,
}

#[derive(Debug, Deserialize)]
pub struct RebootRequest {
    #[serde(default)]
    pub host: String,
}
