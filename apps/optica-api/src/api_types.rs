//! Request and response bodies that are not domain types.
//!
//! Every success body is wrapped in [`Success`], which adds
//! `"success": true` next to the flattened payload.

use serde::{Deserialize, Serialize};

use optica_core::{Client, Notification, Prescription, Sale};

/// `{ "success": true, ...data }`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Self {
        Success { success: true, data }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `PATCH .../status`.
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkDelete {
    pub ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleQuery {
    pub status: Option<String>,
    pub client_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<u32>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
}

/// Preview of the identifier the next registration or sale would receive.
#[derive(Debug, Serialize)]
pub struct NextId {
    pub next_id: String,
}

#[derive(Debug, Serialize)]
pub struct ClientBody {
    pub client: Client,
}

#[derive(Debug, Serialize)]
pub struct ClientList {
    pub clients: Vec<Client>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionBody {
    pub prescription: Prescription,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionList {
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, Serialize)]
pub struct SaleBody {
    pub sale: Sale,
}

#[derive(Debug, Serialize)]
pub struct SaleList {
    pub sales: Vec<Sale>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct Affected {
    pub updated: u64,
}
