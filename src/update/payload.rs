//! SOAP request envelopes for the `updateRecord` operation.
//!
//! The envelope is plain serde data serialized with quick-xml. Nothing in
//! here holds state, so workers build envelopes concurrently.

use super::{SubmissionMetadata, UpdateError, UpdateServiceConfig};
use crate::marcxml::{marcxchange_record, MarcxmlRecord, MARCXCHANGE_NS};
use crate::record::Record;
use quick_xml::se::to_string as xml_to_string;
use serde::Serialize;

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace of the `updateRecord` operation.
pub(crate) const CATALOGING_UPDATE_NS: &str = "http://oss.dbc.dk/ns/catalogingUpdate";

/// Namespace of the `updateRecordExtraData` element.
pub const UPDATE_RECORD_EXTRA_DATA_NS: &str = "http://oss.dbc.dk/ns/updateRecordExtraData";

const RECORD_PACKING: &str = "xml";
const VALIDATE_ONLY_OPTION: &str = "validate_only";

#[derive(Debug, Serialize)]
#[serde(rename = "soapenv:Envelope")]
struct Envelope<'a> {
    #[serde(rename = "@xmlns:soapenv")]
    soapenv_ns: &'static str,
    #[serde(rename = "@xmlns:cat")]
    cat_ns: &'static str,
    #[serde(rename = "soapenv:Body")]
    body: Body<'a>,
}

#[derive(Debug, Serialize)]
struct Body<'a> {
    #[serde(rename = "cat:updateRecord")]
    update_record: UpdateRecord<'a>,
}

#[derive(Debug, Serialize)]
struct UpdateRecord<'a> {
    #[serde(rename = "cat:updateRecordRequest")]
    request: UpdateRecordRequest<'a>,
}

#[derive(Debug, Serialize)]
struct UpdateRecordRequest<'a> {
    #[serde(rename = "cat:authentication")]
    authentication: Authentication<'a>,
    #[serde(rename = "cat:schemaName")]
    schema_name: &'a str,
    #[serde(rename = "cat:bibliographicRecord")]
    bibliographic_record: BibliographicRecord<'a>,
    #[serde(rename = "cat:options", skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
    #[serde(rename = "cat:trackingId", skip_serializing_if = "Option::is_none")]
    tracking_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Authentication<'a> {
    #[serde(rename = "cat:groupIdAut")]
    group_id: &'a str,
    #[serde(rename = "cat:passwordAut")]
    password: &'a str,
    #[serde(rename = "cat:userIdAut")]
    user_id: &'a str,
}

#[derive(Debug, Serialize)]
struct Options {
    #[serde(rename = "cat:option")]
    option: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct BibliographicRecord<'a> {
    #[serde(rename = "cat:recordSchema")]
    record_schema: &'static str,
    #[serde(rename = "cat:recordPacking")]
    record_packing: &'static str,
    #[serde(rename = "cat:recordData")]
    record_data: RecordData,
    #[serde(rename = "cat:extraRecordData")]
    extra_record_data: ExtraRecordData<'a>,
}

#[derive(Debug, Serialize)]
struct RecordData {
    record: MarcxmlRecord,
}

#[derive(Debug, Serialize)]
struct ExtraRecordData<'a> {
    #[serde(rename = "updateRecordExtraData", skip_serializing_if = "Option::is_none")]
    extra_data: Option<UpdateRecordExtraData<'a>>,
}

#[derive(Debug, Serialize)]
struct UpdateRecordExtraData<'a> {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "providerName", skip_serializing_if = "Option::is_none")]
    provider_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u32>,
}

fn non_empty<'a>(value: &'a str, name: &str) -> Result<&'a str, UpdateError> {
    if value.trim().is_empty() {
        Err(UpdateError::InvalidArgument(format!("{name} must not be empty")))
    } else {
        Ok(value)
    }
}

/// Render the SOAP envelope submitting `record`.
///
/// # Errors
///
/// Returns [`UpdateError::InvalidArgument`] for an empty group id or
/// template, and a payload error if the record cannot be serialized.
pub fn update_request_envelope(
    config: &UpdateServiceConfig,
    record: &Record,
    metadata: &SubmissionMetadata,
) -> Result<String, UpdateError> {
    let extra_data = (!metadata.is_empty()).then(|| UpdateRecordExtraData {
        xmlns: UPDATE_RECORD_EXTRA_DATA_NS,
        provider_name: metadata.provider.as_deref(),
        priority: metadata.priority,
    });

    let envelope = Envelope {
        soapenv_ns: SOAP_ENVELOPE_NS,
        cat_ns: CATALOGING_UPDATE_NS,
        body: Body {
            update_record: UpdateRecord {
                request: UpdateRecordRequest {
                    authentication: Authentication {
                        group_id: non_empty(&config.group_id, "groupId")?,
                        password: &config.password,
                        user_id: &config.username,
                    },
                    schema_name: non_empty(&config.template, "schemaName")?,
                    bibliographic_record: BibliographicRecord {
                        record_schema: MARCXCHANGE_NS,
                        record_packing: RECORD_PACKING,
                        record_data: RecordData {
                            record: marcxchange_record(record)?,
                        },
                        extra_record_data: ExtraRecordData { extra_data },
                    },
                    options: config.validate_only.then(|| Options {
                        option: vec![VALIDATE_ONLY_OPTION],
                    }),
                    tracking_id: config.tracking_id.as_deref(),
                },
            },
        },
    };

    Ok(xml_to_string(&envelope)?)
}
