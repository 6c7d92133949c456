//! Small URL-assembly helpers shared by the sign-in flow and the gateway.

/// Percent-encodes a value for use as a path segment or query value.
pub fn percent_encode_component(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(value.len());
    for byte in value.as_bytes() {
        let is_unreserved = matches!(
            byte,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~'
        );
        if is_unreserved {
            encoded.push(*byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[(byte >> 4) as usize] as char);
            encoded.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    encoded
}

/// Builds the correlation key for a command context. The callback derives the
/// same key from the verified token claims, so the key must depend only on
/// the (team, user, channel) triple.
pub fn correlation_key(team_id: &str, user_id: &str, channel_id: &str) -> String {
    format!("{team_id}:{user_id}:{channel_id}")
}
