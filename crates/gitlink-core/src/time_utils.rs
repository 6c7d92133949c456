/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when `expires_unix` is no longer in the future.
pub fn is_expired_unix(expires_unix: u64, now_unix: u64) -> bool {
    expires_unix <= now_unix
}

/// Converts a TTL expressed in seconds to an absolute millisecond deadline.
pub fn deadline_unix_ms(now_unix_ms: u64, ttl_seconds: u64) -> u64 {
    now_unix_ms.saturating_add(ttl_seconds.saturating_mul(1_000))
}
