//! Event handler - the invocation boundary.
//!
//! Every invocation gets a response envelope: `200` echoing the incoming
//! parameters when the event was applied (or skipped), `400` with the error
//! message otherwise.

use crate::error::{AppError, Result};
use crate::sync::{SyncEngine, SyncOutcome};
use rowmirror_engine::ChangeEvent;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: Value,
}

impl Response {
    /// Success envelope echoing the incoming event.
    pub fn ok(params: &Value) -> Self {
        Self {
            status_code: 200,
            body: json!({ "incomingParams": params }),
        }
    }

    /// Failure envelope carrying the error message.
    pub fn error(err: &AppError) -> Self {
        Self {
            status_code: 400,
            body: json!({ "error": err.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Decode the wire event.
pub fn parse_event(params: &Value) -> Result<ChangeEvent> {
    serde_json::from_value(params.clone())
        .map_err(|e| AppError::from(rowmirror_engine::Error::InvalidEvent(e.to_string())))
}

/// Handle one invocation.
pub async fn handle_event(engine: &SyncEngine, params: &Value) -> Response {
    let invocation_id = Uuid::new_v4();
    let span = tracing::info_span!("event", %invocation_id);

    async {
        match apply(engine, params).await {
            Ok(outcome) => {
                tracing::info!(
                    transition = ?outcome.as_ref().map(|o| o.transition),
                    "Event handled"
                );
                Response::ok(params)
            }
            Err(err) => {
                tracing::error!(error = %err, cause = ?err.root_cause(), "Event failed");
                Response::error(&err)
            }
        }
    }
    .instrument(span)
    .await
}

async fn apply(engine: &SyncEngine, params: &Value) -> Result<Option<SyncOutcome>> {
    let event = parse_event(params)?;
    engine.execute(&event).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmirror_engine::ChangeAction;

    #[test]
    fn success_envelope_echoes_params() {
        let params = json!({"Action": "insert", "Data": "{\"id\": 1}"});
        let response = Response::ok(&params);
        assert!(response.is_success());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"statusCode": 200, "body": {"incomingParams": params}})
        );
    }

    #[test]
    fn error_envelope_hides_transaction_cause() {
        let err = AppError::Transaction(Box::new(AppError::UndefinedAccountType));
        let response = Response::error(&err);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body, json!({"error": "database transaction error"}));
    }

    #[test]
    fn event_decoding() {
        let event = parse_event(&json!({"Action": "delete", "Data": "{\"id\": 3}"})).unwrap();
        assert_eq!(event.action, ChangeAction::Delete);

        let err = parse_event(&json!({"Action": "truncate"})).unwrap_err();
        assert!(matches!(
            err,
            AppError::Engine(rowmirror_engine::Error::InvalidEvent(_))
        ));
        assert_eq!(Response::error(&err).status_code, 400);
    }
}
