//! Parsing `updateRecord` responses.

use super::{RemoteOutcome, UpdateError, UpdateStatus};
use crate::marcxml::strip_namespaces;
use quick_xml::de::from_str as xml_from_str;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(rename = "Body")]
    body: ResponseBody,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(rename = "updateRecordResponse", default)]
    response: Option<UpdateRecordResponse>,
    #[serde(rename = "Fault", default)]
    fault: Option<Fault>,
}

#[derive(Debug, Deserialize)]
struct UpdateRecordResponse {
    #[serde(rename = "updateRecordResult")]
    result: UpdateRecordResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRecordResult {
    update_status: String,
    #[serde(default)]
    messages: Option<Messages>,
    #[serde(default)]
    double_record_key: Option<String>,
    #[serde(default)]
    double_record_entries: Option<DoubleRecordEntries>,
}

#[derive(Debug, Deserialize)]
struct Messages {
    #[serde(rename = "messageEntry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct DoubleRecordEntries {
    #[serde(rename = "doubleRecordEntry", default)]
    entries: Vec<Entry>,
}

/// `messageEntry` and `doubleRecordEntry` share the `message` child.
#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Fault {
    #[serde(default)]
    faultcode: String,
    #[serde(default)]
    faultstring: String,
}

fn entry_messages(entries: Vec<Entry>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.message.unwrap_or_default())
        .collect()
}

/// Parse a SOAP response body into a [`RemoteOutcome`].
///
/// # Errors
///
/// Returns [`UpdateError::Fault`] for a SOAP fault and
/// [`UpdateError::MalformedResponse`] when the body is not an
/// `updateRecordResponse`.
pub fn parse_update_response(body: &str) -> Result<RemoteOutcome, UpdateError> {
    let cleaned = strip_namespaces(body);
    let envelope: ResponseEnvelope = xml_from_str(&cleaned)
        .map_err(|e| UpdateError::MalformedResponse(e.to_string()))?;

    if let Some(fault) = envelope.body.fault {
        return Err(UpdateError::Fault {
            code: fault.faultcode,
            message: fault.faultstring,
        });
    }

    let result = envelope
        .body
        .response
        .ok_or_else(|| {
            UpdateError::MalformedResponse("missing updateRecordResponse".to_string())
        })?
        .result;

    Ok(RemoteOutcome {
        status: UpdateStatus::from_wire(&result.update_status),
        messages: result.messages.map(|m| entry_messages(m.entries)),
        double_record_key: result.double_record_key,
        double_record_entries: result
            .double_record_entries
            .map(|d| entry_messages(d.entries)),
    })
}
