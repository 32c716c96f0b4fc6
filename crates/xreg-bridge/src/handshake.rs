//! Startup handshake (spec §4.9.2): `GET /model` and `GET /capabilities`
//! against every configured adapter, in descriptor order. Any fetch failure
//! is fatal; the merge step (see `model.rs`) catches the duplicate
//! group-type case.

use serde_json::Value;
use tracing::{error, info};

use crate::config::AdapterDescriptor;
use crate::error::BridgeError;
use crate::model::AdapterHandshake;

/// Fetch `/model` and `/capabilities` from one adapter, applying its
/// configured handshake timeout. A non-200 or transport failure surfaces as
/// `service-unavailable`, matching the Bridge-layer error taxonomy of
/// spec §7.
async fn fetch_one(client: &reqwest::Client, descriptor: &AdapterDescriptor) -> Result<AdapterHandshake, BridgeError> {
    let model = fetch_json(client, descriptor, "model").await?;
    let capabilities = fetch_json(client, descriptor, "capabilities").await?;
    Ok(AdapterHandshake {
        url: descriptor.url.clone(),
        model,
        capabilities,
    })
}

async fn fetch_json(client: &reqwest::Client, descriptor: &AdapterDescriptor, path: &str) -> Result<Value, BridgeError> {
    let url = format!("{}/{path}", descriptor.url.trim_end_matches('/'));
    let mut request = client.get(&url).timeout(descriptor.timeout());
    if let Some(key) = &descriptor.api_key {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .await
        .map_err(|e| BridgeError::ServiceUnavailable(format!("{url}: {e}")))?;
    if !response.status().is_success() {
        return Err(BridgeError::ServiceUnavailable(format!(
            "{url}: upstream returned HTTP {}",
            response.status()
        )));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| BridgeError::BadGateway(format!("{url}: {e}")))
}

/// Run the full handshake phase across every descriptor, sequentially (spec
/// §4.9.1: "order matters only for deterministic error reporting"). Bails
/// out on the first failure rather than continuing to probe unreachable
/// adapters.
pub async fn handshake_all(descriptors: &[AdapterDescriptor]) -> Result<Vec<AdapterHandshake>, BridgeError> {
    let client = reqwest::Client::new();
    let mut handshakes = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        info!(url = %descriptor.url, "handshaking with adapter");
        match fetch_one(&client, descriptor).await {
            Ok(handshake) => handshakes.push(handshake),
            Err(err) => {
                error!(url = %descriptor.url, error = %err, "adapter handshake failed");
                return Err(err);
            }
        }
    }
    Ok(handshakes)
}
