//! Per-recipient message construction from a body template and a CSV
//! upload.
//!
//! The first CSV row is the header.  Each later row yields one message:
//! every `{{column}}` in the template is replaced by that row's trimmed
//! value, and the recipient comes from the `phone` column.

use hm_connector::recipient_address;
use hm_domain::error::{Error, Result};

/// Header that names the recipient column.  Matched exactly.
pub const PHONE_COLUMN: &str = "phone";

/// One message to deliver, plus its outcome once attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Phone number as uploaded (trimmed).
    pub phone: String,
    /// Fully-qualified recipient address.
    pub recipient: String,
    pub body: String,
    pub sent: bool,
    pub log: String,
}

impl Message {
    pub fn mark_sent(&mut self) {
        self.sent = true;
        self.log = format!("Message sent to {}", self.phone);
    }

    pub fn mark_failed(&mut self, err: impl std::fmt::Display) {
        self.sent = false;
        self.log = format!("Could not send message to {}: {err}", self.phone);
    }
}

/// Substitute every `{{header}}` placeholder with the row value in the
/// same position.  Placeholders with no matching header stay as written.
pub fn expand(template: &str, headers: &[String], row: &[String]) -> String {
    let mut body = template.to_owned();
    for (header, value) in headers.iter().zip(row) {
        let placeholder = format!("{{{{{}}}}}", header.trim());
        body = body.replace(&placeholder, value.trim());
    }
    body
}

/// Validate the upload and build one [`Message`] per data row, in file
/// order.  Nothing is sent here; any error means no message is produced.
pub fn build_messages(template: &str, csv: &[u8], address_domain: &str) -> Result<Vec<Message>> {
    let template = template.trim();
    if template.is_empty() {
        return Err(Error::Validation("body not specified in request form".into()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(csv);
    let mut records = reader.records();

    let headers: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(malformed)?
            .iter()
            .map(str::to_owned)
            .collect(),
        None => return Err(Error::Validation("csv file is empty".into())),
    };

    let phone_index = headers
        .iter()
        .position(|h| h == PHONE_COLUMN)
        .ok_or_else(|| Error::Validation("header 'phone' not found in CSV".into()))?;

    let mut messages = Vec::new();
    for record in records {
        let row: Vec<String> = record.map_err(malformed)?.iter().map(str::to_owned).collect();
        let phone = row[phone_index].trim().to_owned();
        messages.push(Message {
            recipient: recipient_address(&phone, address_domain),
            body: expand(template, &headers, &row),
            phone,
            sent: false,
            log: String::new(),
        });
    }
    Ok(messages)
}

fn malformed(e: csv::Error) -> Error {
    Error::Validation(format!("malformed csv: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "s.whatsapp.net";

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn expands_matching_placeholder() {
        let msgs = build_messages("Hi {{name}}", b"phone,name\n555-0100,Ann\n", DOMAIN).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].body, "Hi Ann");
        assert_eq!(msgs[0].recipient, "555-0100@s.whatsapp.net");
        assert_eq!(msgs[0].phone, "555-0100");
    }

    #[test]
    fn unmatched_placeholder_is_kept() {
        let out = expand(
            "Hi {{nickname}}",
            &strings(&["phone", "name"]),
            &strings(&["555-0100", "Ann"]),
        );
        assert_eq!(out, "Hi {{nickname}}");
    }

    #[test]
    fn header_and_value_whitespace_is_trimmed() {
        let out = expand(
            "{{name}} owes {{ amount}}",
            &strings(&["phone", " name ", "amount"]),
            &strings(&["1", "  Bob ", " 12 "]),
        );
        // The template placeholder itself is matched literally.
        assert_eq!(out, "Bob owes {{ amount}}");
    }

    #[test]
    fn repeated_placeholder_is_replaced_everywhere() {
        let msgs = build_messages("{{name}}, {{name}}!", b"name,phone\nAnn,1\n", DOMAIN).unwrap();
        assert_eq!(msgs[0].body, "Ann, Ann!");
    }

    #[test]
    fn rows_keep_file_order() {
        let msgs = build_messages("x", b"phone\n3\n1\n2\n", DOMAIN).unwrap();
        let phones: Vec<&str> = msgs.iter().map(|m| m.phone.as_str()).collect();
        assert_eq!(phones, ["3", "1", "2"]);
    }

    #[test]
    fn missing_phone_column_is_rejected() {
        let err = build_messages("Hi", b"Phone,name\n1,Ann\n", DOMAIN).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("phone")));
    }

    #[test]
    fn blank_body_is_rejected() {
        let err = build_messages("  \n", b"phone\n1\n", DOMAIN).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn empty_csv_is_rejected() {
        assert!(matches!(
            build_messages("Hi", b"", DOMAIN),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn ragged_row_is_rejected() {
        let err = build_messages("Hi", b"phone,name\n1,Ann\n2\n", DOMAIN).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.starts_with("malformed csv")));
    }

    #[test]
    fn header_only_yields_no_messages() {
        assert!(build_messages("Hi", b"phone,name\n", DOMAIN).unwrap().is_empty());
    }

    #[test]
    fn outcome_lines() {
        let mut m = build_messages("Hi", b"phone\n42\n", DOMAIN).unwrap().remove(0);
        m.mark_sent();
        assert!(m.sent);
        assert_eq!(m.log, "Message sent to 42");
        m.mark_failed("timed out");
        assert!(!m.sent);
        assert_eq!(m.log, "Could not send message to 42: timed out");
    }
}
