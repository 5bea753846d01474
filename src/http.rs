/**
 * API REST VEILLEUR - Surface HTTP du moniteur
 *
 * RÔLE :
 * Expose l'état du parc et les actions distantes au dashboard web.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes /api/devices, /resolve, /reboot
 * - Client statique servi en fallback depuis le dossier client/
 * - CORS permissif pour le dashboard (origines locales variées)
 * - Erreurs traduites en JSON {success, error} avec code HTTP adapté
 *
 * Les handlers lisent le registre ou passent par l'orchestrateur; aucun
 * d'eux ne tient le verrou pendant un appel réseau.
 */

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::warn;

use crate::models::{Device, RebootRequest};
use crate::reboot::{RebootError, RebootOrchestrator};
use crate::registry::SharedRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub orchestrator: Arc<RebootOrchestrator>,
}

pub fn build_router(app_state: AppState, client_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/devices", get(get_devices))
        .route("/resolve", get(resolve))
        .route("/reboot", post(reboot))
        .fallback_service(ServeDir::new(client_dir))
        .with_state(app_state)
        .layer(cors)
}

// GET /api/devices (état complet du parc)
async fn get_devices(State(app): State<AppState>) -> Json<Vec<Device>> {
    Json(app.registry.snapshot())
}

#[derive(Debug, Deserialize)]
struct ResolveParams {
    #[serde(default)]
    host: String,
}

// GET /resolve?host=<nom> (résolution DNS, IPv4 préférée)
async fn resolve(Query(params): Query<ResolveParams>) -> (StatusCode, Json<Value>) {
    if params.host.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "missing host parameter"})),
        );
    }

    let addrs = match tokio::net::lookup_host((params.host.as_str(), 0u16)).await {
        Ok(addrs) => addrs.map(|a| a.ip()).collect::<Vec<_>>(),
        Err(e) => {
            warn!("DNS lookup failed for {}: {e}", params.host);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "DNS lookup failed", "details": e.to_string()})),
            );
        }
    };

    match pick_address(&addrs) {
        Some((address, family)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "hostname": params.host,
                "address": address,
                "family": family,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "no address found"})),
        ),
    }
}

/// IPv4 préférée, sinon la première adresse résolue.
fn pick_address(ips: &[IpAddr]) -> Option<(String, u8)> {
    if let Some(v4) = ips.iter().find(|ip| ip.is_ipv4()) {
        return Some((v4.to_string(), 4));
    }
    ips.first().map(|ip| (ip.to_string(), 6))
}

// POST /reboot {host} (redémarrage distant)
async fn reboot(
    State(app): State<AppState>,
    Json(request): Json<RebootRequest>,
) -> (StatusCode, Json<Value>) {
    if request.host.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "missing host"})),
        );
    }

    match app.orchestrator.reboot(&request.host).await {
        Ok(output) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "status": 200,
                "message": "Reboot initiated.",
                "output": output,
            })),
        ),
        Err(e) => (
            reboot_status(&e),
            Json(json!({"success": false, "error": e.to_string()})),
        ),
    }
}

fn reboot_status(err: &RebootError) -> StatusCode {
    match err {
        RebootError::UnknownDevice(_) => StatusCode::NOT_FOUND,
        RebootError::UnsupportedTech(_) => StatusCode::BAD_REQUEST,
        RebootError::MissingCredentials
        | RebootError::ActuatorFailed(_)
        | RebootError::ActuatorTimeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn ipv4_is_preferred_over_ipv6() {
        let ips = vec![
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
        ];
        assert_eq!(pick_address(&ips), Some(("10.0.0.1".to_string(), 4)));
    }

    #[test]
    fn ipv6_only_falls_back_to_first_address() {
        let ips = vec![IpAddr::V6(Ipv6Addr::LOCALHOST)];
        assert_eq!(pick_address(&ips), Some(("::1".to_string(), 6)));
    }

    #[test]
    fn no_address_yields_none() {
        assert_eq!(pick_address(&[]), None);
    }

    #[test]
    fn reboot_errors_map_to_expected_status_codes() {
        assert_eq!(
            reboot_status(&RebootError::UnknownDevice("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            reboot_status(&RebootError::UnsupportedTech("SMART".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            reboot_status(&RebootError::MissingCredentials),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            reboot_status(&RebootError::ActuatorTimeout(120)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
