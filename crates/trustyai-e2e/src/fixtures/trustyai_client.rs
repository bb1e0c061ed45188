//! TrustyAI service client fixture.
//!
//! Every request resolves the TrustyAI route and a fresh bearer token, then
//! talks to the service over the route with certificate checks disabled.
//! Responses come back uninterpreted as [`ServiceResponse`]; the typed helpers
//! only shape request bodies.

use crate::auth::{get_route, TokenProvider};
use crate::cluster::ClusterApi;
use crate::constants::{
    TRUSTYAI_MODEL_METADATA_ENDPOINT, TRUSTYAI_NAMES_ENDPOINT, TRUSTYAI_SERVICE,
    TRUSTYAI_SPD_ENDPOINT,
};
use crate::error::{HarnessError, Result};
use crate::http::{bearer, insecure_client, sanitize_body, ServiceResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Methods the TrustyAI API is called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMethod::Get => write!(f, "GET"),
            RequestMethod::Post => write!(f, "POST"),
        }
    }
}

/// Feature and outcome display names for a model.
///
/// Posting a mapping replaces whatever mapping the model had before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameMapping {
    pub model_id: String,
    pub input_mapping: BTreeMap<String, String>,
    pub output_mapping: BTreeMap<String, String>,
}

impl NameMapping {
    /// Display names for the loan-default example model's inputs and output.
    pub fn loan_model(model_id: impl Into<String>) -> Self {
        let inputs = [
            "Number of Children",
            "Total Income",
            "Number of Total Family Members",
            "Is Male-Identifying?",
            "Owns Car?",
            "Owns Realty?",
            "Is Partnered?",
            "Is Employed?",
            "Live with Parents?",
            "Age",
            "Length of Employment?",
        ];

        Self {
            model_id: model_id.into(),
            input_mapping: inputs
                .iter()
                .enumerate()
                .map(|(i, name)| (format!("customer_data_input-{}", i), name.to_string()))
                .collect(),
            output_mapping: BTreeMap::from([("predict".to_string(), "Will Default?".to_string())]),
        }
    }
}

/// Statistical parity difference request.
///
/// Attribute and outcome values are JSON values because TrustyAI matches them
/// against the column type (numeric or categorical).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessQuery {
    pub model_id: String,
    pub protected_attribute: String,
    pub privileged_attribute: Value,
    pub unprivileged_attribute: Value,
    pub outcome_name: String,
    pub favorable_outcome: Value,
    pub batch_size: u32,
}

impl FairnessQuery {
    /// SPD of "Will Default?" across "Is Male-Identifying?" for the loan model.
    pub fn loan_default_by_gender(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            protected_attribute: "Is Male-Identifying?".to_string(),
            privileged_attribute: Value::from(1.0),
            unprivileged_attribute: Value::from(0.0),
            outcome_name: "Will Default?".to_string(),
            favorable_outcome: Value::from(0),
            batch_size: 5000,
        }
    }
}

/// Acceptable range for a fairness metric.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub outside_bounds: bool,
}

/// Body of an SPD response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpdResponse {
    #[serde(default)]
    pub name: Option<String>,
    pub value: f64,
    #[serde(default)]
    pub specific_definition: Option<String>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
}

/// Observation count TrustyAI holds for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    pub model_id: String,
    pub observations: u64,
}

/// Parse the `/info` body.
///
/// Older services answer with an array of entries, newer ones with an object
/// keyed by model id. Either way the model id and observation count sit on
/// the entry itself or under its `data` field.
pub fn parse_model_metadata(body: &Value) -> Result<Vec<ModelMetadata>> {
    fn parse_entry<'a>(model_id: Option<&'a str>, entry: &'a Value) -> Option<ModelMetadata> {
        let data = entry.get("data").unwrap_or(entry);
        let model_id = data
            .get("modelId")
            .or_else(|| entry.get("modelId"))
            .and_then(Value::as_str)
            .or(model_id)?;
        let observations = data
            .get("observations")
            .or_else(|| entry.get("observations"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Some(ModelMetadata {
            model_id: model_id.to_string(),
            observations,
        })
    }

    match body {
        Value::Array(entries) => Ok(entries.iter().filter_map(|e| parse_entry(None, e)).collect()),
        Value::Object(models) => Ok(models
            .iter()
            .filter_map(|(id, e)| parse_entry(Some(id), e))
            .collect()),
        other => Err(HarnessError::InvalidResource(format!(
            "model metadata is neither a list nor a map: {}",
            sanitize_body(&other.to_string())
        ))),
    }
}

/// Client for the TrustyAI service of one namespace.
#[derive(Clone)]
pub struct TrustyAiClient {
    cluster: Arc<dyn ClusterApi>,
    tokens: Arc<dyn TokenProvider>,
    http_client: Client,
    namespace: String,
    route_name: String,
}

impl TrustyAiClient {
    /// Create a client for the `trustyai-service` route in `namespace`.
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        tokens: Arc<dyn TokenProvider>,
        namespace: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            cluster,
            tokens,
            http_client: insecure_client()?,
            namespace: namespace.into(),
            route_name: TRUSTYAI_SERVICE.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The same client aimed at the TrustyAI service in another namespace.
    ///
    /// Shares the HTTP client, cluster handle and token source.
    pub fn for_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self.clone()
        }
    }

    /// Issue a request against the TrustyAI API.
    ///
    /// GET sends no body; POST sends `data` (or `null`) as JSON. A missing
    /// route or token fails before anything is sent. The response is returned
    /// whatever its status.
    #[instrument(skip(self, data), fields(namespace = %self.namespace))]
    pub async fn send_service_request(
        &self,
        endpoint: &str,
        method: RequestMethod,
        data: Option<&Value>,
    ) -> Result<ServiceResponse> {
        let route = get_route(self.cluster.as_ref(), &self.namespace, &self.route_name).await?;
        let token = self.tokens.token().await?;
        let url = route.url(endpoint);

        let request = match method {
            RequestMethod::Get => self.http_client.get(&url),
            RequestMethod::Post => self.http_client.post(&url),
        }
        .header(AUTHORIZATION, bearer(&token))
        .header(CONTENT_TYPE, "application/json");

        let request = match method {
            RequestMethod::Get => request,
            RequestMethod::Post => request.json(data.unwrap_or(&Value::Null)),
        };

        let response = request.send().await?;
        let response = ServiceResponse::read(response).await?;
        debug!(status = %response.status, "TrustyAI responded");
        Ok(response)
    }

    /// `GET /info`.
    pub async fn get_model_metadata(&self) -> Result<ServiceResponse> {
        self.send_service_request(TRUSTYAI_MODEL_METADATA_ENDPOINT, RequestMethod::Get, None)
            .await
    }

    /// Fetch and parse `/info`. A non-2xx answer is an error here.
    pub async fn model_metadata(&self) -> Result<Vec<ModelMetadata>> {
        let response = self.get_model_metadata().await?;
        if !response.is_success() {
            return Err(HarnessError::MetadataUnavailable {
                status: response.status.as_u16(),
                body: sanitize_body(&response.text()),
            });
        }

        parse_model_metadata(&response.json()?)
    }

    /// Number of observations TrustyAI has ingested for `model_id`, 0 if the
    /// model is not known yet.
    pub async fn observations(&self, model_id: &str) -> Result<u64> {
        Ok(self
            .model_metadata()
            .await?
            .into_iter()
            .find(|m| m.model_id == model_id)
            .map(|m| m.observations)
            .unwrap_or(0))
    }

    /// `POST /info/names`.
    pub async fn apply_name_mappings(&self, mapping: &NameMapping) -> Result<ServiceResponse> {
        let body = serde_json::to_value(mapping)?;
        self.send_service_request(TRUSTYAI_NAMES_ENDPOINT, RequestMethod::Post, Some(&body))
            .await
    }

    /// `POST /metrics/group/fairness/spd/`.
    pub async fn get_fairness_metrics(&self, query: &FairnessQuery) -> Result<ServiceResponse> {
        let body = serde_json::to_value(query)?;
        self.send_service_request(TRUSTYAI_SPD_ENDPOINT, RequestMethod::Post, Some(&body))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::cluster::fake::FakeCluster;
    use crate::cluster::Route;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NS: &str = "model-namespace";
    const MODEL: &str = "demo-loan-nn-onnx-alpha";

    fn client_for(server: &MockServer) -> TrustyAiClient {
        let host = server.uri().trim_start_matches("http://").to_string();
        let cluster = FakeCluster::new().with_route(
            NS,
            Route {
                name: TRUSTYAI_SERVICE.to_string(),
                host,
                path: String::new(),
                tls: false,
            },
        );
        TrustyAiClient::new(
            Arc::new(cluster),
            Arc::new(StaticToken::new("sha256~test")),
            NS,
        )
        .unwrap()
    }

    #[test]
    fn test_name_mapping_body() {
        let body = serde_json::to_value(NameMapping::loan_model(MODEL)).unwrap();

        assert_eq!(body["modelId"], MODEL);
        assert_eq!(body["inputMapping"].as_object().unwrap().len(), 11);
        assert_eq!(body["inputMapping"]["customer_data_input-3"], "Is Male-Identifying?");
        assert_eq!(body["inputMapping"]["customer_data_input-10"], "Length of Employment?");
        assert_eq!(body["outputMapping"], json!({"predict": "Will Default?"}));
    }

    #[test]
    fn test_fairness_query_body() {
        let body = serde_json::to_value(FairnessQuery::loan_default_by_gender(MODEL)).unwrap();

        assert_eq!(
            body,
            json!({
                "modelId": MODEL,
                "protectedAttribute": "Is Male-Identifying?",
                "privilegedAttribute": 1.0,
                "unprivilegedAttribute": 0.0,
                "outcomeName": "Will Default?",
                "favorableOutcome": 0,
                "batchSize": 5000
            })
        );
    }

    #[test]
    fn test_parse_metadata_list_with_nested_data() {
        let parsed = parse_model_metadata(&json!([
            {"metrics": {}, "data": {"modelId": MODEL, "observations": 250}},
            {"data": {"modelId": "other", "observations": 3}}
        ]))
        .unwrap();

        assert_eq!(
            parsed,
            vec![
                ModelMetadata { model_id: MODEL.to_string(), observations: 250 },
                ModelMetadata { model_id: "other".to_string(), observations: 3 },
            ]
        );
    }

    #[test]
    fn test_parse_metadata_flat_list_and_map() {
        let flat = parse_model_metadata(&json!([{"modelId": MODEL, "observations": 7}])).unwrap();
        assert_eq!(flat[0].observations, 7);

        let keyed = parse_model_metadata(&json!({MODEL: {"data": {"observations": 9}}})).unwrap();
        assert_eq!(keyed[0].model_id, MODEL);
        assert_eq!(keyed[0].observations, 9);
    }

    #[test]
    fn test_parse_metadata_rejects_scalars() {
        let err = parse_model_metadata(&json!("not metadata")).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidResource(_)));
    }

    #[test]
    fn test_spd_response_parses() {
        let spd: SpdResponse = serde_json::from_value(json!({
            "timestamp": "2026-10-16T10:00:00Z",
            "type": "metric",
            "value": -0.0029,
            "specificDefinition": "The SPD of -0.002 indicates ...",
            "name": "SPD",
            "id": "b3f5",
            "thresholds": {"lowerBound": -0.1, "upperBound": 0.1, "outsideBounds": false}
        }))
        .unwrap();

        assert_eq!(spd.name.as_deref(), Some("SPD"));
        assert!(spd.value < 0.0);
        assert!(!spd.thresholds.unwrap().outside_bounds);
    }

    #[tokio::test]
    async fn test_get_sends_bearer_and_no_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .and(header("authorization", "Bearer sha256~test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).get_model_metadata().await.unwrap();

        assert!(response.is_success());
        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        let mapping = NameMapping::loan_model(MODEL);
        Mock::given(method("POST"))
            .and(path("/info/names"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::to_value(&mapping).unwrap()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Feature and output name mapping successfully applied."),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).apply_name_mappings(&mapping).await.unwrap();

        assert!(response.is_success());
        assert!(response.text().contains("successfully applied"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/metrics/group/fairness/spd/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("No metadata found for model"),
            )
            .mount(&server)
            .await;

        let response = client_for(&server)
            .get_fairness_metrics(&FairnessQuery::loan_default_by_gender(MODEL))
            .await
            .unwrap();

        assert_eq!(response.status.as_u16(), 400);
        assert_eq!(response.text(), "No metadata found for model");
    }

    #[tokio::test]
    async fn test_for_namespace_targets_that_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let elsewhere = client_for(&server).for_namespace("fairness-ci");
        assert_eq!(elsewhere.namespace(), "fairness-ci");
        assert!(elsewhere.get_model_metadata().await.unwrap_err().is_not_found());

        let back = elsewhere.for_namespace(NS);
        let response = back
            .send_service_request(TRUSTYAI_MODEL_METADATA_ENDPOINT, RequestMethod::Get, None)
            .await
            .unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_missing_route_fails_before_sending() {
        let client = TrustyAiClient::new(
            Arc::new(FakeCluster::new()),
            Arc::new(StaticToken::new("t")),
            NS,
        )
        .unwrap();

        let err = client.get_model_metadata().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_observations_defaults_to_zero_for_unknown_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"data": {"modelId": "other-model", "observations": 42}}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.observations(MODEL).await.unwrap(), 0);
        assert_eq!(client.observations("other-model").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_metadata_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(
                ResponseTemplate::new(503).set_body_string("Bearer sha256~leaked unavailable"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).observations(MODEL).await.unwrap_err();

        assert!(
            matches!(
                &err,
                HarnessError::MetadataUnavailable { status: 503, body }
                    if !body.contains("sha256~leaked")
            ),
            "unexpected error: {:?}",
            err
        );
    }
}
