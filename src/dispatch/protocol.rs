//! Dispatch Protocol
//!
//! Operation names, request payloads and response shapes for `/{tenant}/{operation}`.

use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tenant operation. Names are case-insensitive; the HTTP verb aliases
/// (`POST`, `GET`, `PUT`) are accepted for the built-in operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Custom(String),
}

impl Operation {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "CREATE" | "POST" => Operation::Create,
            "READ" | "GET" => Operation::Read,
            "UPDATE" | "PUT" => Operation::Update,
            "DELETE" => Operation::Delete,
            _ => Operation::Custom(raw.to_ascii_uppercase()),
        }
    }

    /// Canonical upper-case name, as used in delegate sets.
    pub fn name(&self) -> &str {
        match self {
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Custom(name) => name,
        }
    }
}

/// Body of a local UPDATE. `id` is accepted in place of `index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(alias = "id")]
    pub index: usize,
    pub document: Value,
}

/// Body of a local DELETE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRef {
    #[serde(alias = "id")]
    pub index: usize,
}

/// Response of a locally served operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub success: bool,
    pub result: Value,
}

impl Envelope {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

/// The parts of an inbound request a backend needs.
#[derive(Debug, Clone)]
pub struct DelegatedRequest {
    pub method: Method,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// A backend response, relayed to the client as-is.
#[derive(Debug, Clone)]
pub struct DelegatedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Outcome of one dispatched operation.
#[derive(Debug)]
pub enum DispatchOutcome {
    Local(Envelope),
    Delegated(DelegatedResponse),
}
