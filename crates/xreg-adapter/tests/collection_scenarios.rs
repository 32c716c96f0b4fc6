//! End-to-end exercises of the adapter contract's collection endpoint
//! against a fake in-memory ecosystem adapter, covering the S2-S5 scenarios
//! from spec §8.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use xreg_adapter::{AdapterConfig, AdapterError, EcosystemAdapter};
use xreg_core::{EntityBase, EntityConfig, Resource, Version};
use xreg_upstream::NameIndex;

struct FakeAdapter {
    index: Arc<NameIndex>,
    packages: HashMap<&'static str, &'static str>,
}

impl FakeAdapter {
    fn new() -> Self {
        let names = vec!["express", "expressive", "fastify", "react"];
        let mut packages = HashMap::new();
        for n in &names {
            packages.insert(*n, "1.0.0");
        }
        FakeAdapter {
            index: Arc::new(NameIndex::new(names.into_iter().map(String::from).collect())),
            packages,
        }
    }
}

#[async_trait]
impl EcosystemAdapter for FakeAdapter {
    fn group_type(&self) -> &'static str {
        "noderegistries"
    }
    fn group_id(&self) -> &'static str {
        "npmjs.org"
    }
    fn resource_type(&self) -> &'static str {
        "packages"
    }
    fn name_index(&self) -> Arc<NameIndex> {
        self.index.clone()
    }

    async fn fetch_resource(&self, resource_id: &str, base_url: &str) -> Result<Resource, AdapterError> {
        let Some(version) = self.packages.get(resource_id) else {
            return Err(AdapterError::NotFound(resource_id.to_string()));
        };
        let parent = xreg_core::Xid::parse(format!(
            "/{}/{}/{}",
            self.group_type(),
            self.group_id(),
            self.resource_type()
        ))
        .unwrap();
        let base = EntityBase::new(
            &parent,
            base_url,
            EntityConfig {
                id: resource_id.to_string(),
                name: Some(resource_id.to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        Ok(Resource {
            versionsurl: format!("{}/versions", base.self_url),
            versionscount: 1,
            base,
        })
        .map(|mut r: Resource| {
            r.base = r.base.with_extra("latest", (*version).to_string());
            r
        })
    }

    async fn fetch_version(
        &self,
        resource_id: &str,
        version_id: &str,
        base_url: &str,
    ) -> Result<Version, AdapterError> {
        let parent = xreg_core::Xid::parse(format!(
            "/{}/{}/{}/{}/versions",
            self.group_type(),
            self.group_id(),
            self.resource_type(),
            resource_id
        ))
        .unwrap();
        let base = EntityBase::new(
            &parent,
            base_url,
            EntityConfig {
                id: version_id.to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        Ok(Version {
            base,
            versionid: version_id.to_string(),
            isdefault: true,
        })
    }

    async fn list_versions(&self, resource_id: &str, base_url: &str) -> Result<Vec<Version>, AdapterError> {
        Ok(vec![self.fetch_version(resource_id, "1.0.0", base_url).await?])
    }

    async fn default_version_id(&self, resource_id: &str) -> Result<Option<String>, AdapterError> {
        Ok(self.packages.get(resource_id).map(|_| "1.0.0".to_string()))
    }
}

fn app() -> axum::Router {
    let adapter: Arc<dyn EcosystemAdapter> = Arc::new(FakeAdapter::new());
    xreg_adapter::router(adapter, &AdapterConfig::default())
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value, axum::http::HeaderMap) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body, headers)
}

#[tokio::test]
async fn s2_wildcard_and_or_filter() {
    let app = app();
    let (status, body, _) = get(
        &app,
        "/noderegistries/npmjs.org/packages?filter=name=express*&filter=name=fastify",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page = body["page"].as_array().unwrap();
    let mut names: Vec<&str> = page.iter().map(|r| r["name"].as_str().unwrap()).collect();
    names.sort();
    assert_eq!(names, vec!["express", "expressive", "fastify"]);
}

#[tokio::test]
async fn s4_missing_name_filter_is_empty_not_error() {
    let app = app();
    let (status, body, headers) = get(&app, "/noderegistries/npmjs.org/packages?filter=description=foo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body["page"].as_array().unwrap().is_empty());
    assert!(headers.get(axum::http::header::LINK).is_none());
    assert!(headers.get("x-xregistry-notice").is_some());
}

#[tokio::test]
async fn s5_bad_request_on_unparseable_filter() {
    let app = app();
    let (status, body, _) = get(&app, "/noderegistries/npmjs.org/packages?filter=%3C%3Cinvalid%3E%3E").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn resource_and_meta_round_trip_default_version() {
    let app = app();
    let (status, resource_body, _) = get(&app, "/noderegistries/npmjs.org/packages/express").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resource_body["name"], "express");

    let (status, meta_body, _) = get(&app, "/noderegistries/npmjs.org/packages/express/meta").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta_body["defaultversionid"], "1.0.0");
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let app = app();
    let (status, _, _) = get(&app, "/noderegistries/not-npm/packages").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inline_versions_round_trips_individual_version_fetch() {
    let app = app();
    let (status, resource_body, _) =
        get(&app, "/noderegistries/npmjs.org/packages/express?inline=versions").await;
    assert_eq!(status, StatusCode::OK);
    let inlined_page = resource_body["versions"]["page"].as_array().unwrap();
    assert_eq!(inlined_page.len(), 1);
    assert_eq!(inlined_page[0]["versionid"], "1.0.0");

    let (status, version_body, _) =
        get(&app, "/noderegistries/npmjs.org/packages/express/versions/1.0.0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inlined_page[0]["versionid"], version_body["versionid"]);
    assert_eq!(inlined_page[0]["xid"], version_body["xid"]);
}

#[tokio::test]
async fn inline_meta_matches_dedicated_meta_endpoint() {
    let app = app();
    let (status, resource_body, _) =
        get(&app, "/noderegistries/npmjs.org/packages/express?inline=meta").await;
    assert_eq!(status, StatusCode::OK);

    let (status, meta_body, _) = get(&app, "/noderegistries/npmjs.org/packages/express/meta").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resource_body["meta"]["defaultversionid"], meta_body["defaultversionid"]);
}

#[tokio::test]
async fn inline_star_on_group_attaches_bounded_resourcetype_map() {
    let app = app();
    let (status, group_body, _) = get(&app, "/noderegistries/npmjs.org?inline=*").await;
    assert_eq!(status, StatusCode::OK);
    let page = group_body["packages"]["page"].as_array().unwrap();
    let mut names: Vec<&str> = page.iter().map(|r| r["name"].as_str().unwrap()).collect();
    names.sort();
    assert_eq!(names, vec!["express", "expressive", "fastify", "react"]);
}

#[tokio::test]
async fn no_inline_param_leaves_body_unexpanded() {
    let app = app();
    let (status, resource_body, _) = get(&app, "/noderegistries/npmjs.org/packages/express").await;
    assert_eq!(status, StatusCode::OK);
    assert!(resource_body.get("versions").is_none());
    assert!(resource_body.get("meta").is_none());

    let (status, group_body, _) = get(&app, "/noderegistries/npmjs.org").await;
    assert_eq!(status, StatusCode::OK);
    assert!(group_body.get("packages").is_none());
}

#[tokio::test]
async fn epoch_param_filters_collection_to_matching_entities() {
    let app = app();
    let (status, body, _) = get(
        &app,
        "/noderegistries/npmjs.org/packages?filter=name=express*&filter=name=fastify&epoch=1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page = body["page"].as_array().unwrap();
    assert_eq!(page.len(), 3);

    let (status, body, _) = get(
        &app,
        "/noderegistries/npmjs.org/packages?filter=name=express*&filter=name=fastify&epoch=2",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn model_and_capabilities_are_served() {
    let app = app();
    let (status, model, _) = get(&app, "/model").await;
    assert_eq!(status, StatusCode::OK);
    assert!(model["groups"]["noderegistries"].is_object());

    let (status, caps, _) = get(&app, "/capabilities").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(caps["pagination"], true);
}
