use serde_json::{json, Map, Value};

/// Supported cloud providers, normalised to their display spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
}

impl CloudProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "aws" => Some(CloudProvider::Aws),
            "azure" => Some(CloudProvider::Azure),
            "gcp" => Some(CloudProvider::Gcp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Azure => "Azure",
            CloudProvider::Gcp => "GCP",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_AWS_REGION: &str = "us-east-1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("unsupported provider '{0}' (expected AWS, Azure or GCP)")]
    UnsupportedProvider(String),
    #[error("missing required field(s) for {provider}: {}", fields.join(", "))]
    MissingFields {
        provider: String,
        fields: Vec<String>,
    },
    #[error("invalid service_account_json: {0}")]
    InvalidServiceAccount(String),
}

/// A validated link request split into public metadata and secret material.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRequest {
    pub provider: CloudProvider,
    pub name: String,
    pub account_id: String,
    pub metadata: Value,
    pub secret: Value,
}

fn text(body: &Map<String, Value>, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn require(
    body: &Map<String, Value>,
    provider: &str,
    keys: &[&str],
) -> Result<Vec<String>, ValidationError> {
    let mut values = Vec::with_capacity(keys.len());
    let mut missing = Vec::new();
    for key in keys {
        match text(body, key) {
            Some(v) => values.push(v),
            None => missing.push(key.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(values)
    } else {
        Err(ValidationError::MissingFields {
            provider: provider.to_string(),
            fields: missing,
        })
    }
}

/// Validate and normalise an account-link payload.
pub fn validate(body: &Value) -> Result<LinkRequest, ValidationError> {
    let body = body.as_object().ok_or(ValidationError::NotAnObject)?;

    let raw_provider = text(body, "provider").unwrap_or_default();
    let provider = CloudProvider::parse(&raw_provider)
        .ok_or_else(|| ValidationError::UnsupportedProvider(raw_provider.clone()))?;
    let name = require(body, provider.as_str(), &["name"])?.remove(0);

    match provider {
        CloudProvider::Aws => {
            let v = require(body, "AWS", &["access_key_id", "secret_access_key"])?;
            let region = text(body, "region").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
            let account_id = text(body, "account_id").unwrap_or_default();
            Ok(LinkRequest {
                provider,
                name,
                account_id,
                metadata: json!({ "region": region, "access_key_id": mask(&v[0]) }),
                secret: json!({ "access_key_id": v[0], "secret_access_key": v[1] }),
            })
        }
        CloudProvider::Azure => {
            let v = require(
                body,
                "Azure",
                &["tenant_id", "client_id", "client_secret", "subscription_id"],
            )?;
            Ok(LinkRequest {
                provider,
                name,
                account_id: v[3].clone(),
                metadata: json!({ "tenant_id": v[0], "client_id": v[1], "subscription_id": v[3] }),
                secret: json!({
                    "tenant_id": v[0],
                    "client_id": v[1],
                    "client_secret": v[2],
                }),
            })
        }
        CloudProvider::Gcp => {
            let sa = service_account(body.get("service_account_json"))?;
            let v = require(&sa, "GCP", &["project_id", "client_email", "private_key"])?;
            Ok(LinkRequest {
                provider,
                name,
                account_id: v[0].clone(),
                metadata: json!({ "project_id": v[0], "client_email": v[1] }),
                secret: json!({ "service_account": Value::Object(sa) }),
            })
        }
    }
}

/// Accept the service account either as an embedded object or a JSON string.
fn service_account(raw: Option<&Value>) -> Result<Map<String, Value>, ValidationError> {
    match raw {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(ValidationError::InvalidServiceAccount(
                    "expected a JSON object".to_string(),
                )),
                Err(e) => Err(ValidationError::InvalidServiceAccount(e.to_string())),
            }
        }
        _ => Err(ValidationError::MissingFields {
            provider: "GCP".to_string(),
            fields: vec!["service_account_json".to_string()],
        }),
    }
}

/// Keep the last four characters of an identifier for display.
fn mask(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
