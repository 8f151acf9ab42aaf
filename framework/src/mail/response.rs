//! Classification of Mandrill's reply to `send-raw`.
//!
//! A send succeeds only when the status is 200..=399, the body decodes, at
//! least one result record came back, and every record is `sent`, `queued`
//! or `scheduled` with no reject reason anywhere in the results.

use std::sync::Arc;

use serde_json::Value;

use super::events::{DeliveryLog, EventBus, EventKind, EventNaming, MailEvent};
use super::{HttpResponse, MailError, Messenger, SendOutcome};

const ACCEPTED: [&str; 3] = ["sent", "queued", "scheduled"];

/// Everything the interpreter reports to.
pub(crate) struct Reporter<'a> {
    pub subject: &'a str,
    pub messenger: &'a dyn Messenger,
    pub log: Option<Arc<dyn DeliveryLog>>,
    pub events: &'a dyn EventBus,
    pub naming: &'a dyn EventNaming,
}

impl Reporter<'_> {
    fn fire(&self, kind: EventKind, message_id: String, email: String, results: &Value) {
        self.events.fire(MailEvent {
            name: self.naming.named(kind.base_name(), self.subject),
            kind,
            subject: self.subject.to_string(),
            message_id,
            email,
            results: results.clone(),
            data: results.clone(),
            log: self.log.clone(),
        });
    }

    fn fail(
        &self,
        response: &HttpResponse,
        mut diagnostic: String,
        message_id: String,
        email: String,
        results: &Value,
    ) -> MailError {
        if let Some(log) = &self.log {
            log.set_success(false);
        }

        diagnostic.push_str(&format!("Status Code: {}\n", response.status));
        diagnostic.push_str(&format!("Message: {}", response.reason));

        tracing::warn!(
            status = response.status,
            %message_id,
            %email,
            "Mandrill did not accept the message"
        );
        self.fire(EventKind::Failed, message_id, email, results);

        MailError::Delivery {
            status: response.status,
            diagnostic,
        }
    }
}

pub(crate) fn interpret(
    response: &HttpResponse,
    reporter: &Reporter<'_>,
) -> Result<SendOutcome, MailError> {
    let failed = response.status < 200 || response.status > 399;
    let mut diagnostic = String::new();

    let results = if response.body.trim().is_empty() {
        diagnostic.push_str("Empty response received from Mandrill\n");
        Value::Null
    } else {
        serde_json::from_str::<Value>(&response.body)?
    };

    let records = records(&results);
    if records.is_empty() {
        diagnostic.push_str("No results received from Mandrill\n");
        return Err(reporter.fail(response, diagnostic, String::new(), String::new(), &results));
    }

    let rejected = has_reject_reason(&results, &records);

    for record in records {
        let message_id = field(record, "_id").unwrap_or_default();
        let email = field(record, "email").unwrap_or_default();
        let status = field(record, "status").unwrap_or_else(|| "failed".to_string());

        if failed || !ACCEPTED.contains(&status.as_str()) || rejected {
            diagnostic.push_str("Problem sending via Mandrill\n");
            diagnostic.push_str(&dump(&results));
            diagnostic.push('\n');
            return Err(reporter.fail(response, diagnostic, message_id, email, &results));
        }

        let message_id = if message_id.is_empty() {
            reporter.messenger.last_message_id().unwrap_or_default()
        } else {
            message_id
        };

        tracing::info!(%message_id, %email, %status, "sent via Mandrill");
        reporter.fire(EventKind::Sent, message_id, email, &results);
    }

    Ok(SendOutcome::Sent)
}

/// Result records in the decoded body.
///
/// Arrays are the records. An object holding arrays contributes their
/// elements; any other non-empty object (an API error) is a record of its
/// own. Empty objects and bare scalars carry no records.
fn records(results: &Value) -> Vec<&Value> {
    match results {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if map.values().any(Value::is_array) => map
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .collect(),
        Value::Object(map) if !map.is_empty() => vec![results],
        _ => Vec::new(),
    }
}

fn has_reject_reason(results: &Value, records: &[&Value]) -> bool {
    let present = |v: &Value| v.get("reject_reason").is_some_and(|r| !r.is_null());
    present(results) || records.iter().copied().any(present)
}

/// Text value of a record field. Numbers are accepted for ids.
fn field(record: &Value, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `key=value` lines with bracketed paths for nested data, nulls skipped.
fn dump(results: &Value) -> String {
    let mut lines = Vec::new();
    flatten(None, results, &mut lines);
    lines.join("\n")
}

fn flatten(prefix: Option<&str>, value: &Value, lines: &mut Vec<String>) {
    let nested = |key: &str| match prefix {
        Some(p) => format!("{p}[{key}]"),
        None => key.to_string(),
    };
    let scalar = |text: String| match prefix {
        Some(p) => format!("{p}={text}"),
        None => text,
    };

    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, v) in map {
                flatten(Some(&nested(key)), v, lines);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(Some(&nested(&i.to_string())), v, lines);
            }
        }
        Value::Bool(b) => lines.push(scalar(if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => lines.push(scalar(n.to_string())),
        Value::String(s) => lines.push(scalar(s.clone())),
    }
}
