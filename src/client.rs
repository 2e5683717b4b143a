//! Query service client
//!
//! The network query service accepts a JSON body describing the SPARQL endpoint and the
//! node/link queries, builds the network, and answers with Cytoscape elements plus graph
//! metrics, or with a GraphML/signature text document.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::visualization::Elements;
use crate::{NetvizError, Result};

/// Default maximum number of links requested
pub const DEFAULT_LIMIT: &str = "1000";

/// Default multiplier the service applies to `limit` while collecting links
pub const DEFAULT_OPTIMIZE: &str = "1.0";

/// Service routes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Sampled or egocentric network as Cytoscape JSON
    Query,
    /// Egocentric network with distances from the center node
    QueryEgo,
    /// The network as a GraphML document
    GraphMl,
    /// A textual signature of the network
    Signature,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Query => "/query",
            Route::QueryEgo => "/query_ego",
            Route::GraphMl => "/graphml",
            Route::Signature => "/signature",
        }
    }

    /// Whether the route answers with Cytoscape JSON rather than text
    pub fn returns_json(&self) -> bool {
        matches!(self, Route::Query | Route::QueryEgo)
    }
}

/// Headers the service forwards to the SPARQL endpoint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeaders {
    #[serde(rename = "User-Agent", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(rename = "Authorization", default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

impl CustomHeaders {
    fn is_empty(&self) -> bool {
        self.user_agent.is_none() && self.authorization.is_none()
    }
}

/// JSON body of a request to the query service.
///
/// Every field is sent as a string, as the service parses `limit` and `optimize` itself.
///
/// # Examples
///
/// ```
/// use netviz::QueryRequest;
///
/// let request = QueryRequest::new(
///     "https://ldf.fi/yoma/sparql",
///     "SELECT ?id ?name WHERE { VALUES ?id { <ID_SET> } ?id skos:prefLabel ?name }",
///     "SELECT ?source ?target WHERE { ?source :knows ?target }",
/// )
/// .with_id("http://ldf.fi/yoma/p660")
/// .with_limit(100);
///
/// assert_eq!(request.limit, "100");
/// assert!(request.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// SPARQL endpoint URL
    pub endpoint: String,
    /// Center node(s) of an egocentric network, space separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `PREFIX` declarations prepended to both queries
    #[serde(default)]
    pub prefixes: String,
    /// Query for node details, with `<ID_SET>` standing for the node ids
    pub nodes: String,
    /// Query for links, with `<ID>` standing for the center node(s)
    pub links: String,
    #[serde(default = "default_limit")]
    pub limit: String,
    #[serde(default = "default_optimize")]
    pub optimize: String,
    /// Output format requested from the service, e.g. `graphml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Whether reverse duplicates of a link are dropped
    #[serde(
        rename = "removeMultipleLinks",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub remove_multiple_links: Option<bool>,
    #[serde(
        rename = "customHttpHeaders",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_http_headers: Option<CustomHeaders>,
}

fn default_limit() -> String {
    DEFAULT_LIMIT.to_string()
}

fn default_optimize() -> String {
    DEFAULT_OPTIMIZE.to_string()
}

fn trimmed(value: impl AsRef<str>) -> String {
    value.as_ref().trim().to_string()
}

impl QueryRequest {
    pub fn new(endpoint: impl AsRef<str>, nodes: impl AsRef<str>, links: impl AsRef<str>) -> Self {
        Self {
            endpoint: trimmed(endpoint),
            id: None,
            prefixes: String::new(),
            nodes: trimmed(nodes),
            links: trimmed(links),
            limit: default_limit(),
            optimize: default_optimize(),
            format: None,
            remove_multiple_links: None,
            custom_http_headers: None,
        }
    }

    /// Sets the center node; a blank id means a sampled network
    pub fn with_id(mut self, id: impl AsRef<str>) -> Self {
        self.id = Some(trimmed(id)).filter(|id| !id.is_empty());
        self
    }

    pub fn with_prefixes(mut self, prefixes: impl AsRef<str>) -> Self {
        self.prefixes = trimmed(prefixes);
        self
    }

    pub fn with_limit(mut self, limit: impl ToString) -> Self {
        self.limit = trimmed(limit.to_string());
        self
    }

    pub fn with_optimize(mut self, optimize: impl ToString) -> Self {
        self.optimize = trimmed(optimize.to_string());
        self
    }

    pub fn with_format(mut self, format: impl AsRef<str>) -> Self {
        self.format = Some(trimmed(format));
        self
    }

    pub fn with_remove_multiple_links(mut self, remove: bool) -> Self {
        self.remove_multiple_links = Some(remove);
        self
    }

    /// Fills `customHttpHeaders` from the configuration without replacing values already set
    pub fn with_config_headers(mut self, config: &ClientConfig) -> Self {
        let mut headers = self.custom_http_headers.take().unwrap_or_default();
        if headers.user_agent.is_none() {
            headers.user_agent = config.user_agent.clone();
        }
        if headers.authorization.is_none() {
            headers.authorization = config.authorization.clone();
        }
        self.custom_http_headers = Some(headers).filter(|h| !h.is_empty());
        self
    }

    /// Checks the fields the service cannot work without
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(NetvizError::InvalidInput("endpoint must not be empty".to_string()));
        }
        if self.links.is_empty() {
            return Err(NetvizError::InvalidInput("links query must not be empty".to_string()));
        }
        if self.limit.parse::<u64>().is_err() {
            return Err(NetvizError::InvalidInput(format!(
                "limit must be a non-negative integer, got '{}'",
                self.limit
            )));
        }
        match self.optimize.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Ok(()),
            _ => Err(NetvizError::InvalidInput(format!(
                "optimize must be a positive number, got '{}'",
                self.optimize
            ))),
        }
    }
}

/// Answer of the JSON routes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub elements: Elements,
    /// Graph-level metrics computed by the service
    #[serde(default)]
    pub metrics: Map<String, Value>,
    /// Other top-level fields such as `directed` or `multigraph`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Answer of any route
#[derive(Clone, Debug, PartialEq)]
pub enum ServiceResponse {
    Network(QueryResponse),
    Text(String),
}

/// Client for the network query service.
///
/// Each client carries its own [`ClientConfig`]; there is no process-wide server address.
/// Requests are sent one at a time and never retried.
#[derive(Clone, Debug)]
pub struct QueryClient {
    client: Client,
    config: ClientConfig,
}

impl QueryClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Full URL of `route` on the configured server
    pub fn url_for(&self, route: Route) -> Result<Url> {
        let base = self.config.server_url()?;
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), route.path());
        Url::parse(&joined).map_err(|e| NetvizError::InvalidServer(format!("{}: {}", joined, e)))
    }

    /// Sends `request` to `route` and decodes the answer according to the route
    pub async fn fetch(&self, route: Route, request: &QueryRequest) -> Result<ServiceResponse> {
        let body = self.send(route, request).await?;

        if route.returns_json() {
            Ok(ServiceResponse::Network(decode_network(&body)?))
        } else {
            log::debug!("received {} bytes of text", body.len());
            Ok(ServiceResponse::Text(body))
        }
    }

    /// Query a sampled network, or an egocentric one when `id` is set
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        decode_network(&self.send(Route::Query, request).await?)
    }

    /// Query an egocentric network; `id` is required
    pub async fn query_ego(&self, request: &QueryRequest) -> Result<QueryResponse> {
        if request.id.is_none() {
            return Err(NetvizError::InvalidInput(
                "an egocentric query needs a center id".to_string(),
            ));
        }
        decode_network(&self.send(Route::QueryEgo, request).await?)
    }

    /// Fetch the network as a GraphML document
    pub async fn graphml(&self, request: &QueryRequest) -> Result<String> {
        self.send(Route::GraphMl, request).await
    }

    /// Fetch the network signature text
    pub async fn signature(&self, request: &QueryRequest) -> Result<String> {
        self.send(Route::Signature, request).await
    }

    async fn send(&self, route: Route, request: &QueryRequest) -> Result<String> {
        let mut request = request.clone().with_config_headers(&self.config);
        if route == Route::GraphMl {
            request = request.with_format("graphml");
        }
        request.validate()?;

        let url = self.url_for(route)?;
        log::info!("POST {}", url);
        log::debug!("request body: {}", serde_json::to_string(&request)?);

        let response = self.client.post(url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            log::warn!("query service answered {}", status);
            return Err(NetvizError::ServiceStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn decode_network(body: &str) -> Result<QueryResponse> {
    let parsed: QueryResponse = serde_json::from_str(body)?;
    log::debug!(
        "received {} nodes and {} edges",
        parsed.elements.nodes.len(),
        parsed.elements.edges.len()
    );
    Ok(parsed)
}
