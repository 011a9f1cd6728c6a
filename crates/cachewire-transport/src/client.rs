//! HTTP transport client

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

use crate::codec::JsonCodec;
use crate::error::TransportError;
use crate::headers::{InboundHeaders, TaskLocalInbound, propagate};
use crate::pool::ClientPool;
use crate::settings::TransportSettings;

/// Declared media type of a request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    Json,
    Text,
    FormUrlEncoded,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Json => "application/json",
            MediaType::Text => "text/plain",
            MediaType::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }

    /// Map a content type onto an encoding; unknown types encode as JSON
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("text/plain") {
            MediaType::Text
        } else if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            MediaType::FormUrlEncoded
        } else {
            MediaType::Json
        }
    }
}

/// Request body before encoding
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Json(Value),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers set by the caller; never overridden by propagation
    pub headers: HeaderMap,
    /// Query parameters; pairs without a value are skipped
    pub query: Vec<(String, Option<String>)>,
    /// Body encoding, JSON when unset
    pub media_type: Option<MediaType>,
    /// Turn non-2xx responses into errors
    pub strict: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.query.push((key.into(), value.map(Into::into)));
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Structured error payload returned by remote services
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Verb-agnostic HTTP executor
pub struct HttpTransport {
    default_base_url: Option<String>,
    clients: Arc<ClientPool>,
    codec: JsonCodec,
    inbound: Option<Arc<dyn InboundHeaders>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("default_base_url", &self.default_base_url)
            .field("clients", &self.clients.len())
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport with its own client pool.
    ///
    /// Inbound headers are read from the [`TaskLocalInbound`] scope.
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let default_base_url = settings.default_base_url.clone();
        let clients = Arc::new(ClientPool::new(settings)?);

        Ok(Self {
            default_base_url,
            clients,
            codec: JsonCodec::default(),
            inbound: Some(Arc::new(TaskLocalInbound)),
        })
    }

    pub fn with_codec(mut self, codec: JsonCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Replace the inbound header source; `None` disables propagation
    pub fn with_inbound(mut self, inbound: Option<Arc<dyn InboundHeaders>>) -> Self {
        self.inbound = inbound;
        self
    }

    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    pub fn client_pool(&self) -> &Arc<ClientPool> {
        &self.clients
    }

    pub fn default_base_url(&self) -> Option<&str> {
        self.default_base_url.as_deref()
    }

    /// Execute a request against `{base}{resource}`
    pub async fn send(
        &self,
        method: Method,
        base_url: Option<&str>,
        resource: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        let base = base_url
            .or(self.default_base_url.as_deref())
            .ok_or(TransportError::MissingBaseAddress)?;

        let client = self.clients.get_or_create(base)?;
        let url = build_url(base, resource, &options.query);

        let mut headers = options.headers;
        if let Some(inbound) = &self.inbound {
            propagate(&mut headers, inbound.as_ref());
        }

        let mut request = client.request(method.clone(), &url);

        if method != Method::GET {
            let media_type = options.media_type.unwrap_or_default();
            if let Some(body) = self.encode_body(payload, media_type)? {
                request = request
                    .header(CONTENT_TYPE, media_type.as_str())
                    .body(body);
            }
        }

        debug!("Sending {} {}", method, url);

        let response = request.headers(headers).send().await.map_err(|e| {
            debug!("Request {} {} failed: {}", method, url, e);
            TransportError::Http(e)
        })?;

        debug!("{} {} returned {}", method, url, response.status());

        if options.strict && !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        Ok(response)
    }

    /// Encode a payload according to the declared media type
    pub fn encode_body(
        &self,
        payload: Payload,
        media_type: MediaType,
    ) -> Result<Option<String>, TransportError> {
        let body = match (payload, media_type) {
            (Payload::Empty, _) => return Ok(None),
            (Payload::Text(text), MediaType::Text) => text,
            (Payload::Json(Value::String(text)), MediaType::Text) => text,
            (Payload::Json(value), MediaType::Text) => self.codec.encode(&value)?,
            (Payload::Text(text), MediaType::Json) => self.codec.encode(&text)?,
            (Payload::Json(value), MediaType::Json) => self.codec.encode(&value)?,
            (payload, MediaType::FormUrlEncoded) => encode_form(payload)?,
        };

        Ok(Some(body))
    }

    /// Translate a non-success response into an error
    async fn error_from(&self, response: Response) -> TransportError {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return TransportError::Http(e),
        };

        debug!("Non-success response {}: {}", status, body);

        match self.codec.decode::<RemoteErrorBody>(&body) {
            Ok(parsed) => TransportError::Remote {
                status: status.as_u16(),
                message: parsed
                    .message
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string()),
            },
            Err(_) => TransportError::Status {
                status: status.as_u16(),
                body,
            },
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, TransportError> {
        let text = response.text().await?;
        Ok(self.codec.decode(&text)?)
    }

    pub async fn get(
        &self,
        base_url: Option<&str>,
        resource: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::GET, base_url, resource, Payload::Empty, options)
            .await
    }

    /// GET in strict mode, deserializing the body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        base_url: Option<&str>,
        resource: &str,
        options: RequestOptions,
    ) -> Result<T, TransportError> {
        let response = self.get(base_url, resource, options.strict()).await?;
        self.read_json(response).await
    }

    /// GET in strict mode, returning the raw body
    pub async fn get_bytes(
        &self,
        base_url: Option<&str>,
        resource: &str,
        options: RequestOptions,
    ) -> Result<Bytes, TransportError> {
        let response = self.get(base_url, resource, options.strict()).await?;
        Ok(response.bytes().await?)
    }

    pub async fn post(
        &self,
        base_url: Option<&str>,
        resource: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::POST, base_url, resource, payload, options)
            .await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        base_url: Option<&str>,
        resource: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<T, TransportError> {
        let response = self
            .post(base_url, resource, payload, options.strict())
            .await?;
        self.read_json(response).await
    }

    pub async fn put(
        &self,
        base_url: Option<&str>,
        resource: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::PUT, base_url, resource, payload, options)
            .await
    }

    pub async fn put_json<T: DeserializeOwned>(
        &self,
        base_url: Option<&str>,
        resource: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<T, TransportError> {
        let response = self
            .put(base_url, resource, payload, options.strict())
            .await?;
        self.read_json(response).await
    }

    pub async fn patch(
        &self,
        base_url: Option<&str>,
        resource: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::PATCH, base_url, resource, payload, options)
            .await
    }

    pub async fn patch_json<T: DeserializeOwned>(
        &self,
        base_url: Option<&str>,
        resource: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<T, TransportError> {
        let response = self
            .patch(base_url, resource, payload, options.strict())
            .await?;
        self.read_json(response).await
    }

    pub async fn delete(
        &self,
        base_url: Option<&str>,
        resource: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::DELETE, base_url, resource, Payload::Empty, options)
            .await
    }

    pub async fn head(
        &self,
        base_url: Option<&str>,
        resource: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::HEAD, base_url, resource, Payload::Empty, options)
            .await
    }

    pub async fn options(
        &self,
        base_url: Option<&str>,
        resource: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::OPTIONS, base_url, resource, Payload::Empty, options)
            .await
    }

    pub async fn trace(
        &self,
        base_url: Option<&str>,
        resource: &str,
        options: RequestOptions,
    ) -> Result<Response, TransportError> {
        self.send(Method::TRACE, base_url, resource, Payload::Empty, options)
            .await
    }
}

/// Join base address, resource and query string
pub fn build_url(base: &str, resource: &str, query: &[(String, Option<String>)]) -> String {
    let mut url = String::with_capacity(base.len() + resource.len() + 1);
    url.push_str(base.trim_end_matches('/'));
    if !resource.starts_with('/') {
        url.push('/');
    }
    url.push_str(resource);

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut has_pairs = false;
    for (key, value) in query {
        if let Some(value) = value {
            serializer.append_pair(key, value);
            has_pairs = true;
        }
    }

    if has_pairs {
        url.push('?');
        url.push_str(&serializer.finish());
    }

    url
}

fn encode_form(payload: Payload) -> Result<String, TransportError> {
    let form_error = |reason: String| TransportError::Encoding {
        media_type: MediaType::FormUrlEncoded.as_str(),
        reason,
    };

    let map = match payload {
        Payload::Json(Value::Object(map)) => map,
        Payload::Json(other) => return Err(form_error(format!("expected an object, got {other}"))),
        Payload::Text(_) => return Err(form_error("expected key/value pairs, got text".to_string())),
        Payload::Empty => return Ok(String::new()),
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::String(s) => {
                serializer.append_pair(&key, &s);
            }
            Value::Bool(_) | Value::Number(_) => {
                serializer.append_pair(&key, &value.to_string());
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(form_error(format!("field '{key}' is not a scalar")));
            }
        }
    }

    Ok(serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> HttpTransport {
        HttpTransport::new(TransportSettings::default()).unwrap()
    }

    #[test]
    fn test_build_url() {
        assert_eq!(build_url("http://a:1/", "/rest/x", &[]), "http://a:1/rest/x");
        assert_eq!(build_url("http://a:1", "rest/x", &[]), "http://a:1/rest/x");

        let query = vec![
            ("q".to_string(), Some("a b&c".to_string())),
            ("skip".to_string(), None),
            ("page".to_string(), Some("2".to_string())),
        ];
        assert_eq!(
            build_url("http://a:1", "/search", &query),
            "http://a:1/search?q=a+b%26c&page=2"
        );

        let only_none = vec![("skip".to_string(), None)];
        assert_eq!(build_url("http://a:1", "/x", &only_none), "http://a:1/x");
    }

    #[test]
    fn test_media_type_from_content_type() {
        assert_eq!(MediaType::from_content_type("text/plain; charset=utf-8"), MediaType::Text);
        assert_eq!(
            MediaType::from_content_type("application/x-www-form-urlencoded"),
            MediaType::FormUrlEncoded
        );
        assert_eq!(MediaType::from_content_type("application/problem+json"), MediaType::Json);
    }

    #[test]
    fn test_text_body_is_verbatim() {
        let t = transport();
        let body = t
            .encode_body(Payload::from(r#"{"already":"json"}"#), MediaType::Text)
            .unwrap();
        assert_eq!(body.as_deref(), Some(r#"{"already":"json"}"#));

        let body = t.encode_body(Payload::Json(json!("plain")), MediaType::Text).unwrap();
        assert_eq!(body.as_deref(), Some("plain"));

        let body = t.encode_body(Payload::Json(json!({"a": 1})), MediaType::Text).unwrap();
        assert_eq!(body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_json_body() {
        let t = transport();
        let body = t
            .encode_body(Payload::Json(json!({"a": null, "b": [1]})), MediaType::Json)
            .unwrap();
        assert_eq!(body.as_deref(), Some(r#"{"b":[1]}"#));

        let body = t.encode_body(Payload::from("hi"), MediaType::Json).unwrap();
        assert_eq!(body.as_deref(), Some(r#""hi""#));

        assert_eq!(t.encode_body(Payload::Empty, MediaType::Json).unwrap(), None);
    }

    #[test]
    fn test_form_body() {
        let t = transport();
        let body = t
            .encode_body(
                Payload::Json(json!({"grant_type": "password", "n": 3, "skip": null})),
                MediaType::FormUrlEncoded,
            )
            .unwrap();
        assert_eq!(body.as_deref(), Some("grant_type=password&n=3"));

        let err = t
            .encode_body(Payload::Json(json!({"nested": {"a": 1}})), MediaType::FormUrlEncoded)
            .unwrap_err();
        assert!(matches!(err, TransportError::Encoding { .. }));

        assert!(t.encode_body(Payload::from("a=b"), MediaType::FormUrlEncoded).is_err());
    }

    #[tokio::test]
    async fn test_missing_base_address() {
        let err = transport()
            .get(None, "/x", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MissingBaseAddress));
    }
}
