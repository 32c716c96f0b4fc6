//! Health aggregation (spec §4.9.6): probes every routed adapter in
//! parallel with a short timeout; 200 iff every probe succeeds, otherwise
//! 503 naming the failures.

use futures::future::join_all;

use crate::routing::RoutingTable;

#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub group_type: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct HealthReport {
    pub failures: Vec<ProbeFailure>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn probe_one(client: &reqwest::Client, group_type: &str, url: &str, health_path: &str, timeout: std::time::Duration) -> Option<ProbeFailure> {
    let target = format!("{}{}", url.trim_end_matches('/'), health_path);
    match client.get(&target).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => None,
        Ok(response) => Some(ProbeFailure {
            group_type: group_type.to_string(),
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        }),
        Err(e) => Some(ProbeFailure {
            group_type: group_type.to_string(),
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}

pub async fn probe_all(client: &reqwest::Client, routes: &RoutingTable) -> HealthReport {
    let probes = routes
        .routes()
        .map(|(group_type, route)| probe_one(client, group_type, &route.url, &route.health_path, route.timeout));
    let results = join_all(probes).await;
    HealthReport {
        failures: results.into_iter().flatten().collect(),
    }
}
