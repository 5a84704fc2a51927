//! # Event Descriptors
//!
//! Every state-changing operation reports what happened as an [`Event`].
//! The caller decides how to deliver it; the database layer writes it to the
//! notification log and the API pushes it to WebSocket subscribers.
//!
//! ```text
//! register client ──► newClient
//! record exam     ──► newPrescription
//! create sale     ──► newSale
//! PATCH status    ──► clientStatusUpdate / saleStatusUpdate
//! bulk delete     ──► clientsDeleted
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use ts_rs::TS;

use crate::status::{ActorRole, Transition};
use crate::types::{Client, Prescription, Sale};

/// Kind of event, serialized as the channel name front ends subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "camelCase"))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    NewClient,
    NewPrescription,
    NewSale,
    SaleStatusUpdate,
    ClientStatusUpdate,
    ClientsDeleted,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewClient => "newClient",
            EventKind::NewPrescription => "newPrescription",
            EventKind::NewSale => "newSale",
            EventKind::SaleStatusUpdate => "saleStatusUpdate",
            EventKind::ClientStatusUpdate => "clientStatusUpdate",
            EventKind::ClientsDeleted => "clientsDeleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change worth telling other departments about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: EventKind,
    /// Registration number, reference number or prescription id.
    pub related_id: Option<String>,
    pub message: String,
    #[ts(type = "unknown")]
    pub payload: serde_json::Value,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new_client(client: &Client, at: DateTime<Utc>) -> Self {
        Event {
            kind: EventKind::NewClient,
            related_id: Some(client.registration_number.clone()),
            message: format!(
                "New client {} registered as {}",
                client.full_name(),
                client.registration_number
            ),
            payload: json!(client),
            occurred_at: at,
        }
    }

    pub fn new_prescription(prescription: &Prescription, client: &Client, at: DateTime<Utc>) -> Self {
        Event {
            kind: EventKind::NewPrescription,
            related_id: Some(client.registration_number.clone()),
            message: format!(
                "Prescription ready for {} ({})",
                client.full_name(),
                client.registration_number
            ),
            payload: json!({ "prescription": prescription, "clientStatus": client.status }),
            occurred_at: at,
        }
    }

    pub fn new_sale(sale: &Sale, at: DateTime<Utc>) -> Self {
        Event {
            kind: EventKind::NewSale,
            related_id: Some(sale.reference_number.clone()),
            message: format!(
                "New sale {} for client {}",
                sale.reference_number, sale.client_id
            ),
            payload: json!(sale),
            occurred_at: at,
        }
    }

    /// Status change of a sale. Overrides are flagged in the message.
    pub fn sale_status(sale: &Sale, transition: &Transition, actor: ActorRole, at: DateTime<Utc>) -> Self {
        Event {
            kind: EventKind::SaleStatusUpdate,
            related_id: Some(sale.reference_number.clone()),
            message: status_message("Sale", &sale.reference_number, transition, actor),
            payload: json!({
                "id": sale.id,
                "referenceNumber": sale.reference_number,
                "from": transition.from,
                "to": transition.to,
                "kind": transition.kind,
                "actor": actor,
            }),
            occurred_at: at,
        }
    }

    pub fn client_status(client: &Client, transition: &Transition, actor: ActorRole, at: DateTime<Utc>) -> Self {
        Event {
            kind: EventKind::ClientStatusUpdate,
            related_id: Some(client.registration_number.clone()),
            message: status_message("Client", &client.registration_number, transition, actor),
            payload: json!({
                "registrationNumber": client.registration_number,
                "from": transition.from,
                "to": transition.to,
                "kind": transition.kind,
                "actor": actor,
            }),
            occurred_at: at,
        }
    }

    pub fn clients_deleted(ids: &[String], actor: ActorRole, at: DateTime<Utc>) -> Self {
        Event {
            kind: EventKind::ClientsDeleted,
            related_id: None,
            message: format!("{} client(s) deleted by {}", ids.len(), actor),
            payload: json!({ "ids": ids, "actor": actor }),
            occurred_at: at,
        }
    }
}

fn status_message(what: &str, id: &str, transition: &Transition, actor: ActorRole) -> String {
    if transition.is_override() {
        format!(
            "{} {} status overridden from {} to {} by {}",
            what, id, transition.from, transition.to, actor
        )
    } else {
        format!("{} {} is now {}", what, id, transition.to)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::EntityKind;
    use crate::status::{transition, RecordStatus};

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&EventKind::SaleStatusUpdate).unwrap(), "\"saleStatusUpdate\"");
        assert_eq!(
            serde_json::from_str::<EventKind>("\"clientsDeleted\"").unwrap(),
            EventKind::ClientsDeleted
        );
    }

    #[test]
    fn test_override_message_is_flagged() {
        let at = Utc::now();
        let t = transition(
            EntityKind::Sale,
            RecordStatus::Collected,
            RecordStatus::PendingJob,
            ActorRole::Admin,
        ).unwrap();
        let msg = status_message("Sale", "SALE/2025/03/001", &t, ActorRole::Admin);
        assert_eq!(msg, "Sale SALE/2025/03/001 status overridden from collected to pending_job by admin");

        let event = Event::clients_deleted(&["M/2025/03/1".to_string()], ActorRole::Admin, at);
        assert_eq!(event.kind, EventKind::ClientsDeleted);
        assert_eq!(event.payload["ids"][0], "M/2025/03/1");
    }
}
