use std::collections::HashMap;

use reqwest::Method;
use serde_json::Value;

use crate::error::LookupError;
use crate::udi::UdiBarcode;

/// Query parameter and body field holding the device identifier.
pub const UDI_DI_FIELD: &str = "udiDi";

pub const HEADER_ALLOW_ORIGIN: &str = "access-control-allow-origin";
pub const HEADER_ALLOW_HEADERS: &str = "access-control-allow-headers";
pub const HEADER_ALLOW_METHODS: &str = "access-control-allow-methods";
pub const HEADER_CONTENT_TYPE: &str = "content-type";

/// One inbound call, independent of the transport that delivered it.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub body: Option<String>,
    /// Set when the transport delivered a body that is not UTF-8.
    pub undecodable_body: bool,
}

impl Invocation {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: HashMap::new(),
            body: None,
            undecodable_body: false,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Blank bodies are treated as absent.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = if body.trim().is_empty() { None } else { Some(body) };
        self.undecodable_body = false;
        self
    }

    /// Raw body as received. Bytes that are not UTF-8 make the request
    /// unparsable rather than being patched with replacement characters.
    pub fn with_body_bytes(self, bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(body) => self.with_body(body),
            Err(_) => Self {
                body: None,
                undecodable_body: true,
                ..self
            },
        }
    }

    pub fn is_preflight(&self) -> bool {
        self.method == Method::OPTIONS
    }

    /// The identifier from the JSON body, else from the query string.
    ///
    /// A body that is present but not UTF-8 JSON is an error even when the
    /// query string carries an identifier.
    pub fn lookup_request(&self) -> Result<LookupRequest, LookupError> {
        if self.undecodable_body {
            return Err(LookupError::InvalidBody);
        }
        let from_body = match &self.body {
            Some(body) => {
                let value: Value = serde_json::from_str(body).map_err(|_| LookupError::InvalidBody)?;
                match value.get(UDI_DI_FIELD) {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                }
            }
            None => None,
        };

        from_body
            .and_then(|raw| LookupRequest::new(&raw).ok())
            .or_else(|| {
                self.query
                    .get(UDI_DI_FIELD)
                    .and_then(|raw| LookupRequest::new(raw).ok())
            })
            .ok_or(LookupError::MissingIdentifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    udi_di: String,
}

impl LookupRequest {
    pub fn new(raw: &str) -> Result<Self, LookupError> {
        let udi_di = raw.trim();
        if udi_di.is_empty() {
            return Err(LookupError::MissingIdentifier);
        }
        Ok(Self {
            udi_di: udi_di.to_string(),
        })
    }

    pub fn udi_di(&self) -> &str {
        &self.udi_di
    }

    /// The GTIN inside a scanned GS1 string, or the identifier as given.
    pub fn normalized(&self) -> String {
        UdiBarcode::parse(&self.udi_di).identifier().to_string()
    }
}

/// Transport-neutral response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status_code: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}
