/**
 * ORCHESTRATEUR DE REBOOT - Redémarrage distant d'un appareil du parc
 *
 * RÔLE : Valide la demande sous le verrou du registre, marque l'appareil,
 * invoque le script externe (automatisation de la console d'admin), puis
 * réconcilie l'état quel que soit le résultat.
 *
 * FONCTIONNEMENT : l'appel au script est bloquant et long; il s'exécute hors
 * verrou et sous un délai explicite pour qu'un actionneur muet ne suspende
 * pas la requête indéfiniment. Le scheduler peut sonder l'appareil pendant
 * le reboot : l'entrelacement est accepté, le registre linéarise tout.
 */

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::{AppConfig, ViaCredentials};
use crate::registry::SharedRegistry;

/// Seule classe d'appareils dont la console d'admin est automatisée.
pub const SUPPORTED_REBOOT_TECH: &str = "VIA";

#[derive(Debug, Error)]
pub enum RebootError {
    #[error("unknown device {0}")]
    UnknownDevice(String),
    #[error("reboot not supported for technology {0}")]
    UnsupportedTech(String),
    #[error("VIA credentials not configured")]
    MissingCredentials,
    #[error("reboot script failed: {0}")]
    ActuatorFailed(String),
    #[error("reboot script timed out after {0}s")]
    ActuatorTimeout(u64),
}

/// Sortie capturée du script de reboot.
#[derive(Debug)]
pub struct ActuatorOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Invocation du script externe : `<command> <script> <host> <user> <pass>`.
#[derive(Debug, Clone)]
pub struct Actuator {
    command: String,
    script: PathBuf,
    timeout: Duration,
    credentials: Option<ViaCredentials>,
}

impl Actuator {
    pub fn new(
        command: String,
        script: PathBuf,
        timeout: Duration,
        credentials: Option<ViaCredentials>,
    ) -> Self {
        Self {
            command,
            script,
            timeout,
            credentials,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.reboot_command.clone(),
            cfg.reboot_script.clone(),
            cfg.reboot_timeout,
            cfg.via.clone(),
        )
    }

    async fn invoke(&self, host: &str, creds: &ViaCredentials) -> Result<ActuatorOutput, RebootError> {
        info!("invoking reboot script for {host}");
        let mut command = Command::new(&self.command);
        command
            .arg(&self.script)
            .arg(host)
            .arg(&creds.username)
            .arg(&creds.password)
            // un dépassement de délai ne doit pas laisser le script orphelin
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RebootError::ActuatorFailed(format!(
                    "cannot launch {}: {e}",
                    self.command
                )))
            }
            Err(_) => return Err(RebootError::ActuatorTimeout(self.timeout.as_secs())),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stdout.is_empty() {
            info!("reboot script stdout for {host}: {stdout}");
        }
        if !stderr.is_empty() {
            warn!("reboot script stderr for {host}: {stderr}");
        }

        if !output.status.success() {
            return Err(RebootError::ActuatorFailed(format!(
                "exit code {:?}, stderr: {stderr}",
                output.status.code()
            )));
        }
        Ok(ActuatorOutput { stdout, stderr })
    }
}

pub struct RebootOrchestrator {
    registry: SharedRegistry,
    actuator: Actuator,
}

impl RebootOrchestrator {
    pub fn new(registry: SharedRegistry, actuator: Actuator) -> Self {
        Self { registry, actuator }
    }

    /// Chemin complet d'une demande : validation et marquage sous verrou,
    /// invocation hors verrou, puis `finish_reboot` sur toutes les sorties.
    /// Le statut de l'appareil n'est pas restauré ici : le prochain cycle de
    /// sondes fournira une observation fraîche.
    pub async fn reboot(&self, host: &str) -> Result<String, RebootError> {
        let ticket = self.registry.begin_reboot(host)?;
        info!("reboot requested for {} ({})", ticket.address, ticket.tech);

        let Some(creds) = self.actuator.credentials.clone() else {
            self.registry.finish_reboot(&ticket.address);
            return Err(RebootError::MissingCredentials);
        };

        let invoked = self.actuator.invoke(&ticket.address, &creds).await;
        self.registry.finish_reboot(&ticket.address);

        match invoked {
            Ok(output) => {
                info!("reboot script ok for {}", ticket.address);
                Ok(output.stdout)
            }
            Err(e) => {
                error!("reboot failed for {}: {e}", ticket.address);
                Err(e)
            }
        }
    }
}
