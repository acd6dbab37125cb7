//! Request descriptions for the booking API
//!
//! A [`FetchBuilder`] describes a call without owning a client, so the
//! session manager can send the same request again after a token refresh.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use url::Url;

use crate::error::Error;

/// Helper for building replayable HTTP requests
#[derive(Debug, Clone)]
pub struct FetchBuilder {
    path: String,
    method: Method,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl FetchBuilder {
    /// Create a new FetchBuilder for a path relative to the API base
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Self {
            path: path.into(),
            method,
            headers,
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add a query parameter
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query_params.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter when the value is present and non-empty
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value.map(|v| v.to_string()) {
            Some(v) if !v.is_empty() => self.query(key, v),
            _ => self,
        }
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(body)?;
        self.body = Some(json);
        Ok(self)
    }

    /// The HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path relative to the API base
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve the full URL against `base`
    pub fn url(&self, base: &Url) -> Result<Url, Error> {
        let mut url = base.join(self.path.trim_start_matches('/'))?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Build the request, attaching `bearer` when given
    pub(crate) fn build(&self, client: &Client, base: &Url, bearer: Option<&str>) -> Result<RequestBuilder, Error> {
        let url = self.url(base)?;

        let mut headers = self.headers.clone();
        if let Some(token) = bearer {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::store("access token is not a valid header value"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut req = client.request(self.method.clone(), url).headers(headers);
        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }
        Ok(req)
    }
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a GET request
    pub fn get(path: impl Into<String>) -> FetchBuilder {
        FetchBuilder::new(path, Method::GET)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> FetchBuilder {
        FetchBuilder::new(path, Method::POST)
    }

    /// Create a PUT request
    pub fn put(path: impl Into<String>) -> FetchBuilder {
        FetchBuilder::new(path, Method::PUT)
    }

    /// Create a PATCH request
    pub fn patch(path: impl Into<String>) -> FetchBuilder {
        FetchBuilder::new(path, Method::PATCH)
    }

    /// Create a DELETE request
    pub fn delete(path: impl Into<String>) -> FetchBuilder {
        FetchBuilder::new(path, Method::DELETE)
    }
}
