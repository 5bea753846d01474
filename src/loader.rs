use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Device;

/// Colonnes obligatoires de l'inventaire, dans l'ordre du modèle.
const REQUIRED_HEADERS: [&str; 5] = ["Nom", "Adresse", "MAC", "Pavillon", "Technologie"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open device inventory {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot read inventory header: {0}")]
    Header(csv::Error),
    #[error("missing required column {0:?}")]
    MissingColumn(&'static str),
}

/// Charge l'inventaire CSV. Fichier ou colonne manquants = fatal au
/// démarrage; une ligne incomplète est ignorée avec un avertissement.
pub fn load_devices(path: &Path) -> Result<Vec<Device>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers().map_err(LoadError::Header)?.clone();
    let mut columns: HashMap<&str, usize> = HashMap::new();
    for (i, header) in headers.iter().enumerate() {
        columns.insert(header, i);
    }
    let mut indices = [0usize; REQUIRED_HEADERS.len()];
    for (slot, name) in indices.iter_mut().zip(REQUIRED_HEADERS) {
        *slot = *columns.get(name).ok_or(LoadError::MissingColumn(name))?;
    }
    let [col_name, col_address, col_mac, col_building, col_tech] = indices;

    let mut devices = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2; // l'en-tête occupe la ligne 1
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("line {line} skipped (unreadable): {e}");
                continue;
            }
        };
        if record.len() < headers.len() {
            warn!("line {line} skipped (wrong column count)");
            continue;
        }

        let field = |col: usize| record.get(col).unwrap_or("").to_string();
        let name = field(col_name);
        let address = field(col_address);
        let mac = field(col_mac);
        let building = field(col_building);
        let tech = field(col_tech);
        if name.is_empty() || address.is_empty() || mac.is_empty() || building.is_empty() || tech.is_empty()
        {
            warn!("line {line} skipped (missing required field)");
            continue;
        }
        devices.push(Device::new(name, address, mac, building, tech));
    }

    info!("{} devices loaded from {}", devices.len(), path.display());
    Ok(devices)
}
