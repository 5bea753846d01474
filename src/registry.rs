/**
 * REGISTRE DU PARC - Unique état mutable partagé du processus
 *
 * RÔLE : Détient la liste des appareils derrière un verrou lecteur/écrivain.
 * Toute lecture ou écriture qui traverse une frontière de tâche passe par ici.
 *
 * DISCIPLINE : aucun verrou tenu pendant une sonde réseau ou un appel de
 * processus externe. Les cycles prennent une photo des identités sous verrou
 * lecture, sondent sans verrou, puis réécrivent sous verrou écriture.
 */

use parking_lot::RwLock;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::{Device, DeviceStatus, ProbeResult, ProbeTarget, RebootTicket};
use crate::reboot::{RebootError, SUPPORTED_REBOOT_TECH};

pub type SharedRegistry = Arc<DeviceRegistry>;

#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
        }
    }

    /// Remplace atomiquement l'ensemble du parc (chargement initial).
    pub fn replace_all(&self, devices: Vec<Device>) {
        *self.devices.write() = devices;
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Copie complète de l'état courant, pour l'API.
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.read().clone()
    }

    /// Identités seules pour un cycle de sondes. Le verrou est relâché avant
    /// tout I/O; la réécriture repasse par `apply_probe`.
    pub fn snapshot_targets(&self) -> Vec<ProbeTarget> {
        self.devices
            .read()
            .iter()
            .map(|d| ProbeTarget {
                name: d.name.clone(),
                address: d.address.clone(),
                building: d.building.clone(),
                tech: d.tech.clone(),
            })
            .collect()
    }

    // recherche linéaire par adresse, acceptable aux tailles de parc visées
    fn find_mut<'a>(devices: &'a mut [Device], address: &str) -> Option<&'a mut Device> {
        devices.iter_mut().find(|d| d.address == address)
    }

    /// Réécrit le résultat d'une sonde. Un appareil en cours de reboot peut
    /// être écrasé ici : c'est le comportement attendu, l'appareil est
    /// injoignable pendant son redémarrage.
    pub fn apply_probe(&self, result: &ProbeResult) {
        let mut devices = self.devices.write();
        if let Some(dev) = Self::find_mut(&mut devices, &result.target.address) {
            dev.status = result.status;
            dev.latency_ms = result.latency_ms;
            dev.last_seen = result.timestamp.format(&Rfc3339).ok();
        }
    }

    /// Valide et marque une demande de reboot sous un seul verrou écriture,
    /// pour qu'aucune course n'existe entre validation et mutation.
    /// Rejet sans aucune mutation si l'appareil est inconnu ou si sa
    /// technologie n'est pas supportée.
    pub fn begin_reboot(&self, host: &str) -> Result<RebootTicket, RebootError> {
        let mut devices = self.devices.write();
        let Some(dev) = Self::find_mut(&mut devices, host) else {
            return Err(RebootError::UnknownDevice(host.to_string()));
        };
        if !dev.tech.eq_ignore_ascii_case(SUPPORTED_REBOOT_TECH) {
            return Err(RebootError::UnsupportedTech(dev.tech.clone()));
        }
        dev.is_rebooting = true;
        dev.status = DeviceStatus::Rebooting;
        dev.reboot_initiated_at =
            Some((OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64);
        Ok(RebootTicket {
            name: dev.name.clone(),
            address: dev.address.clone(),
            tech: dev.tech.clone(),
        })
    }

    /// Lève le marqueur de reboot, quel que soit le résultat de l'actionneur.
    /// Le statut reste volontairement celui du reboot : le prochain cycle de
    /// sondes le remplacera par une observation fraîche.
    pub fn finish_reboot(&self, address: &str) {
        let mut devices = self.devices.write();
        if let Some(dev) = Self::find_mut(&mut devices, address) {
            dev.is_rebooting = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, address: &str, tech: &str) -> Device {
        Device::new(
            name.to_string(),
            address.to_string(),
            "aa:bb:cc:dd:ee:ff".to_string(),
            "Pavillon A".to_string(),
            tech.to_string(),
        )
    }

    fn result_for(target: ProbeTarget, status: DeviceStatus, latency_ms: i64) -> ProbeResult {
        ProbeResult {
            target,
            status,
            latency_ms,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn replace_all_swaps_the_whole_set() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a", "10.0.0.1", "VIA")]);
        assert_eq!(registry.len(), 1);
        registry.replace_all(vec![
            device("b", "10.0.0.2", "VIA"),
            device("c", "10.0.0.3", "SMART"),
        ]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|d| d.address != "10.0.0.1"));
    }

    #[test]
    fn apply_probe_updates_status_latency_and_last_seen() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a", "10.0.0.1", "VIA")]);
        let target = registry.snapshot_targets().remove(0);
        registry.apply_probe(&result_for(target, DeviceStatus::Online, 42));

        let dev = registry.snapshot().remove(0);
        assert_eq!(dev.status, DeviceStatus::Online);
        assert_eq!(dev.latency_ms, 42);
        assert!(dev.last_seen.is_some());
    }

    #[test]
    fn apply_probe_for_unknown_address_is_a_noop() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a", "10.0.0.1", "VIA")]);
        let ghost = ProbeTarget {
            name: "ghost".into(),
            address: "10.9.9.9".into(),
            building: "X".into(),
            tech: "VIA".into(),
        };
        registry.apply_probe(&result_for(ghost, DeviceStatus::Online, 1));
        let dev = registry.snapshot().remove(0);
        assert_eq!(dev.status, DeviceStatus::Checking);
    }

    #[test]
    fn begin_reboot_rejects_unknown_device_without_mutation() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a", "10.0.0.1", "VIA")]);
        let err = registry.begin_reboot("10.9.9.9").unwrap_err();
        assert!(matches!(err, RebootError::UnknownDevice(_)));
        let dev = registry.snapshot().remove(0);
        assert!(!dev.is_rebooting);
        assert_eq!(dev.status, DeviceStatus::Checking);
    }

    #[test]
    fn begin_reboot_rejects_unsupported_tech_without_mutation() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a", "10.0.0.1", "SMART")]);
        let err = registry.begin_reboot("10.0.0.1").unwrap_err();
        assert!(matches!(err, RebootError::UnsupportedTech(ref t) if t == "SMART"));
        let dev = registry.snapshot().remove(0);
        assert!(!dev.is_rebooting);
        assert_eq!(dev.status, DeviceStatus::Checking);
    }

    #[test]
    fn begin_reboot_accepts_via_case_insensitively() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a", "10.0.0.1", "via")]);
        let ticket = registry.begin_reboot("10.0.0.1").unwrap();
        assert_eq!(ticket.address, "10.0.0.1");

        let dev = registry.snapshot().remove(0);
        assert!(dev.is_rebooting);
        assert_eq!(dev.status, DeviceStatus::Rebooting);
        assert!(dev.reboot_initiated_at.is_some());
    }

    #[test]
    fn finish_reboot_clears_the_marker_but_not_the_status() {
        let registry = DeviceRegistry::new();
        registry.replace_all(vec![device("a", "10.0.0.1", "VIA")]);
        registry.begin_reboot("10.0.0.1").unwrap();
        registry.finish_reboot("10.0.0.1");

        let dev = registry.snapshot().remove(0);
        assert!(!dev.is_rebooting);
        // le statut est réconcilié par le cycle suivant, pas ici
        assert_eq!(dev.status, DeviceStatus::Rebooting);
    }
}
