//! Decoders for the error body formats the API produces.
//!
//! Failed responses arrive in one of three shapes depending on the endpoint
//! and failure kind: a JSON envelope with per-field validation messages, an
//! urlencoded `oauth_problem` payload, or an XML document whose `Message`
//! elements carry the diagnostics.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::form_urlencoded;

/// Placeholder summary the API sends when the real detail lives in the
/// per-field validation messages.
const GENERIC_VALIDATION_MESSAGE: &str = "A validation exception occurred";

/// Failure to decode an error body in its declared format.
///
/// A body that does not match the format its content type promises surfaces
/// as one of these instead of a constructed [`ApiError`](crate::ApiError).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Body declared as JSON did not match the error envelope.
    #[error("invalid JSON error body: {0}")]
    Json(#[from] serde_json::Error),

    /// Body declared as XML did not parse.
    #[error("invalid XML error body: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An XML error body without a single `Message` element.
    #[error("XML error body contains no Message element")]
    NoMessageElement,

    /// An urlencoded OAuth problem payload without a required key.
    #[error("OAuth problem payload is missing `{0}`")]
    MissingOAuthField(&'static str),
}

/// Decoded urlencoded `oauth_problem` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProblem {
    /// Short machine-oriented code, e.g. `token_expired`.
    pub problem: String,
    /// Longer human-readable description.
    pub advice: String,
}

/// Envelope of a JSON bad-request body.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Elements", default)]
    elements: Vec<ErrorElement>,
}

/// One rejected resource inside `Elements`.
#[derive(Debug, Deserialize)]
struct ErrorElement {
    #[serde(rename = "ValidationErrors", default)]
    validation_errors: Vec<ValidationMessage>,
}

#[derive(Debug, Deserialize)]
struct ValidationMessage {
    #[serde(rename = "Message")]
    message: String,
}

/// Decode a JSON bad-request body into its summary message and the flattened
/// list of validation messages, in document order.
pub fn decode_validation_body(text: &str) -> Result<(String, Vec<String>), DecodeError> {
    let envelope: ErrorEnvelope = serde_json::from_str(text)?;
    let message = format!("{}: {}", envelope.kind, envelope.message);

    let mut errors: Vec<String> = envelope
        .elements
        .iter()
        .flat_map(|element| &element.validation_errors)
        .map(|err| err.message.clone())
        .collect();

    if envelope.kind == "ValidationException" {
        if envelope.message != GENERIC_VALIDATION_MESSAGE {
            errors.push(envelope.message.clone());
        }

        // Batch endpoints (payroll in particular) nest further
        // ValidationErrors one and two levels below arbitrary top-level
        // keys, outside the documented envelope. Probe every top-level
        // array for them; Elements is itself walked again, so its
        // messages repeat.
        let data: Map<String, Value> = serde_json::from_str(text)?;
        collect_nested_validation_errors(&data, &mut errors);
    }

    Ok((message, errors))
}

/// Walk every top-level array of a `ValidationException` body, collecting
/// validation messages from each object item, from its object fields, and
/// from the elements of its array fields.
///
/// Values that are not the expected shape are skipped: this pass probes
/// undocumented per-endpoint structures, unlike the strict envelope decode.
fn collect_nested_validation_errors(data: &Map<String, Value>, errors: &mut Vec<String>) {
    for value in data.values() {
        let Value::Array(items) = value else { continue };
        for item in items {
            let Value::Object(item) = item else { continue };
            push_entry_values(item.get("ValidationErrors"), errors);

            for (field, nested) in item {
                if field == "ValidationErrors" {
                    continue;
                }
                match nested {
                    Value::Object(_) => {
                        push_entry_values(nested.get("ValidationErrors"), errors);
                    }
                    Value::Array(attributes) => {
                        for attribute in attributes {
                            push_entry_values(attribute.get("ValidationErrors"), errors);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Append every string value of every entry in a `ValidationErrors` array.
fn push_entry_values(entries: Option<&Value>, errors: &mut Vec<String>) {
    let Some(Value::Array(entries)) = entries else {
        return;
    };
    for entry in entries {
        let Value::Object(entry) = entry else { continue };
        for value in entry.values() {
            if let Value::String(message) = value {
                errors.push(message.clone());
            }
        }
    }
}

/// First value for `key` in an urlencoded body, if present.
pub fn form_value(text: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(text.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Decode an urlencoded `oauth_problem` payload.
pub fn decode_oauth_problem(text: &str) -> Result<OAuthProblem, DecodeError> {
    let problem =
        form_value(text, "oauth_problem").ok_or(DecodeError::MissingOAuthField("oauth_problem"))?;
    let advice = form_value(text, "oauth_problem_advice")
        .ok_or(DecodeError::MissingOAuthField("oauth_problem_advice"))?;
    Ok(OAuthProblem { problem, advice })
}

/// Collect the text of every `Message` element in an XML body.
///
/// Returns the first message and the remaining ones separately; a document
/// without any `Message` element is a decode failure.
pub fn decode_message_elements(text: &str) -> Result<(String, Vec<String>), DecodeError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut messages = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) if start.local_name().as_ref() == b"Message" => {
                current = Some(String::new());
            }
            Event::Text(chunk) => {
                if let Some(message) = current.as_mut() {
                    message.push_str(&chunk.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            Event::End(end) if end.local_name().as_ref() == b"Message" => {
                if let Some(message) = current.take() {
                    messages.push(message);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut messages = messages.into_iter();
    match messages.next() {
        Some(first) => Ok((first, messages.collect())),
        None => Err(DecodeError::NoMessageElement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_body_message_concatenation() {
        let body = json!({
            "ErrorNumber": 10,
            "Type": "ValidationException",
            "Message": "A validation exception occurred",
            "Elements": []
        })
        .to_string();

        let (message, errors) = decode_validation_body(&body).unwrap();

        assert_eq!(
            message,
            "ValidationException: A validation exception occurred"
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_validation_body_collects_element_errors() {
        let body = json!({
            "Type": "ValidationException",
            "Message": "A validation exception occurred",
            "Elements": [
                {
                    "InvoiceNumber": "INV-001",
                    "ValidationErrors": [
                        { "Message": "Invoice not of valid status for modification" },
                        { "Message": "Date cannot be in the future" }
                    ]
                }
            ]
        })
        .to_string();

        let (_, errors) = decode_validation_body(&body).unwrap();

        // Strict pass picks both up, the exploratory walk repeats them.
        assert_eq!(
            errors,
            vec![
                "Invoice not of valid status for modification",
                "Date cannot be in the future",
                "Invoice not of valid status for modification",
                "Date cannot be in the future",
            ]
        );
    }

    #[test]
    fn test_validation_body_appends_non_generic_message() {
        let body = json!({
            "Type": "ValidationException",
            "Message": "Email address must be unique",
            "Elements": []
        })
        .to_string();

        let (_, errors) = decode_validation_body(&body).unwrap();

        assert_eq!(errors, vec!["Email address must be unique"]);
    }

    #[test]
    fn test_validation_body_skips_generic_message() {
        let body = json!({
            "Type": "ValidationException",
            "Message": "A validation exception occurred",
            "Elements": []
        })
        .to_string();

        let (_, errors) = decode_validation_body(&body).unwrap();

        assert!(!errors.iter().any(|e| e == "A validation exception occurred"));
    }

    #[test]
    fn test_non_validation_type_skips_walk() {
        let body = json!({
            "Type": "PostDataInvalidException",
            "Message": "JSON for post data was invalid",
            "Batch": [
                { "ValidationErrors": [ { "Message": "ignored" } ] }
            ]
        })
        .to_string();

        let (message, errors) = decode_validation_body(&body).unwrap();

        assert_eq!(
            message,
            "PostDataInvalidException: JSON for post data was invalid"
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_nested_walk_document_order() {
        // Payroll-style batch: messages sit on the item, on a nested
        // object field and on the elements of a nested array field.
        let body = r#"{
            "Type": "ValidationException",
            "Message": "A validation exception occurred",
            "Employees": [
                {
                    "ValidationErrors": [ { "Message": "first" } ],
                    "HomeAddress": {
                        "ValidationErrors": [ { "Message": "second" } ]
                    },
                    "BankAccounts": [
                        { "ValidationErrors": [ { "Message": "third" } ] },
                        { "ValidationErrors": [ { "Message": "fourth" } ] }
                    ]
                }
            ]
        }"#;

        let (_, errors) = decode_validation_body(body).unwrap();

        assert_eq!(errors, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_nested_walk_keeps_duplicates() {
        let body = r#"{
            "Type": "ValidationException",
            "Message": "A validation exception occurred",
            "Elements": [
                { "ValidationErrors": [ { "Message": "X" } ] }
            ]
        }"#;

        let (_, errors) = decode_validation_body(body).unwrap();

        assert_eq!(errors, vec!["X", "X"]);
    }

    #[test]
    fn test_walk_skips_non_object_items() {
        let body = r#"{
            "Type": "ValidationException",
            "Message": "A validation exception occurred",
            "Warnings": [ "plain string", 42 ],
            "Employees": [
                { "ValidationErrors": [ { "Message": "kept" } ] }
            ]
        }"#;

        let (_, errors) = decode_validation_body(body).unwrap();

        assert_eq!(errors, vec!["kept"]);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            decode_validation_body("{not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_envelope_without_type_is_an_error() {
        let body = json!({ "Message": "no type here" }).to_string();

        assert!(matches!(
            decode_validation_body(&body),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_validation_entry_without_message_is_an_error() {
        let body = json!({
            "Type": "ValidationException",
            "Message": "A validation exception occurred",
            "Elements": [
                { "ValidationErrors": [ { "Detail": "wrong key" } ] }
            ]
        })
        .to_string();

        assert!(matches!(
            decode_validation_body(&body),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_form_value_decodes_plus_and_percent() {
        let text = "oauth_problem=token_expired&oauth_problem_advice=Token+has+expired%21";

        assert_eq!(
            form_value(text, "oauth_problem_advice").as_deref(),
            Some("Token has expired!")
        );
    }

    #[test]
    fn test_form_value_takes_first_occurrence() {
        let text = "oauth_problem=one&oauth_problem=two";

        assert_eq!(form_value(text, "oauth_problem").as_deref(), Some("one"));
    }

    #[test]
    fn test_decode_oauth_problem() {
        let text = "oauth_problem=token_rejected&oauth_problem_advice=Token+has+been+rejected";

        let oauth = decode_oauth_problem(text).unwrap();

        assert_eq!(oauth.problem, "token_rejected");
        assert_eq!(oauth.advice, "Token has been rejected");
    }

    #[test]
    fn test_decode_oauth_problem_missing_problem() {
        assert!(matches!(
            decode_oauth_problem("foo=bar"),
            Err(DecodeError::MissingOAuthField("oauth_problem"))
        ));
    }

    #[test]
    fn test_decode_oauth_problem_missing_advice() {
        assert!(matches!(
            decode_oauth_problem("oauth_problem=token_expired"),
            Err(DecodeError::MissingOAuthField("oauth_problem_advice"))
        ));
    }

    #[test]
    fn test_message_elements_first_and_rest() {
        let xml = "<ApiException><Message>A</Message><Message>B</Message></ApiException>";

        let (first, rest) = decode_message_elements(xml).unwrap();

        assert_eq!(first, "A");
        assert_eq!(rest, vec!["B"]);
    }

    #[test]
    fn test_message_elements_found_at_depth() {
        let xml = "<ApiException><Elements><DataContractBase>\
                   <Message>nested</Message>\
                   </DataContractBase></Elements></ApiException>";

        let (first, rest) = decode_message_elements(xml).unwrap();

        assert_eq!(first, "nested");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_message_elements_unescapes_entities() {
        let xml = "<Error><Message>Invoice &amp; credit note mismatch</Message></Error>";

        let (first, _) = decode_message_elements(xml).unwrap();

        assert_eq!(first, "Invoice & credit note mismatch");
    }

    #[test]
    fn test_no_message_element_is_an_error() {
        let xml = "<ApiException><Detail>nothing useful</Detail></ApiException>";

        assert!(matches!(
            decode_message_elements(xml),
            Err(DecodeError::NoMessageElement)
        ));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(matches!(
            decode_message_elements("<ApiException><Message>open</Wrong></ApiException>"),
            Err(DecodeError::Xml(_))
        ));
    }
}
