use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use ureq::Agent;

use crate::config::GbifClientConfig;
use crate::data::SearchPage;
use crate::errors::StreamError;
use crate::source::{OccurrenceApi, SearchRequest};
use crate::types::ContentType;

/// Blocking HTTP client for the occurrence search endpoint.
///
/// Configured once at construction; the request cache (when enabled) lives
/// inside this value, so separate clients never share cached responses.
pub struct GbifClient {
    agent: Agent,
    config: GbifClientConfig,
    cache: Option<Mutex<HashMap<String, String>>>,
}

impl GbifClient {
    /// Build a client from explicit connection settings.
    pub fn new(config: GbifClientConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        let cache = config
            .cache_requests
            .then(|| Mutex::new(HashMap::new()));
        info!(
            endpoint = %config.endpoint,
            cache_requests = config.cache_requests,
            "occurrence client ready"
        );
        Self {
            agent,
            config,
            cache,
        }
    }

    /// Active client settings.
    pub fn config(&self) -> &GbifClientConfig {
        &self.config
    }

    /// Number of search bodies currently memoized (0 when caching is off).
    pub fn cached_responses(&self) -> usize {
        self.cache
            .as_ref()
            .map(|cache| cache.lock().map(|entries| entries.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    fn cache_key(&self, params: &[(String, String)]) -> String {
        let mut key = self.config.endpoint.clone();
        key.push('?');
        for (idx, (field, value)) in params.iter().enumerate() {
            if idx > 0 {
                key.push('&');
            }
            key.push_str(field);
            key.push('=');
            key.push_str(value);
        }
        key
    }

    fn fetch_search_body(
        &self,
        request: &SearchRequest,
        params: &[(String, String)],
    ) -> Result<String, StreamError> {
        let response = self
            .agent
            .get(&self.config.endpoint)
            .query_pairs(params.iter().map(|(field, value)| (field.as_str(), value.as_str())))
            .call()
            .map_err(|err| StreamError::UpstreamRequest {
                stream_id: request.stream_id.clone(),
                reason: format!("failed querying occurrence search endpoint: {err}"),
            })?;

        response
            .into_body()
            .read_to_string()
            .map_err(|err| StreamError::UpstreamRequest {
                stream_id: request.stream_id.clone(),
                reason: format!("failed reading occurrence search response body: {err}"),
            })
    }

    fn parse_search_body(request: &SearchRequest, body: &str) -> Result<SearchPage, StreamError> {
        serde_json::from_str(body).map_err(|err| StreamError::MalformedResponse {
            stream_id: request.stream_id.clone(),
            reason: format!("failed parsing occurrence search response: {err}"),
        })
    }
}

impl OccurrenceApi for GbifClient {
    fn search(&self, request: &SearchRequest) -> Result<SearchPage, StreamError> {
        let params = request.params();
        let Some(cache) = self.cache.as_ref() else {
            let body = self.fetch_search_body(request, &params)?;
            return Self::parse_search_body(request, &body);
        };

        let key = self.cache_key(&params);
        let cached = cache
            .lock()
            .map_err(|_| StreamError::UpstreamRequest {
                stream_id: request.stream_id.clone(),
                reason: "request cache poisoned".into(),
            })?
            .get(&key)
            .cloned();
        if let Some(body) = cached {
            debug!(stream_id = %request.stream_id, offset = request.offset, "search cache hit");
            return Self::parse_search_body(request, &body);
        }

        let body = self.fetch_search_body(request, &params)?;
        let page = Self::parse_search_body(request, &body)?;
        if let Ok(mut entries) = cache.lock() {
            entries.insert(key, body);
        }
        Ok(page)
    }

    fn probe_content_type(&self, url: &str) -> Result<Option<ContentType>, StreamError> {
        debug!(url, "probing media content type");
        let response = self
            .agent
            .head(url)
            .call()
            .map_err(|err| StreamError::ContentProbe {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        Ok(response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string))
    }
}
