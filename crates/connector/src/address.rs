/// Turn a phone number from an upload into a recipient address.
///
/// The number is trimmed and used as-is otherwise; no digit normalization
/// is applied.
pub fn recipient_address(phone: &str, domain: &str) -> String {
    format!("{}@{}", phone.trim(), domain)
}
