//! Time utilities.

/// Current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_is_recent() {
        // Anything after 2024-01-01 counts as a sane clock here.
        assert!(now_timestamp() > 1_704_067_200);
    }
}
