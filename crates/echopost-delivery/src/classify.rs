//! Mapping from response status to record fate.

/// What a delivery response means for the record that was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Accepted by the remote. Delete and log as success.
    Delivered,
    /// Will never succeed unchanged. Delete and log as failure.
    Rejected,
    /// Remote is struggling. Keep the record and stop the pass.
    Retry,
}

/// Classify an HTTP status code.
///
/// | status      | outcome     |
/// |-------------|-------------|
/// | 200..=299   | `Delivered` |
/// | 300..=500   | `Rejected`  |
/// | 501..       | `Retry`     |
/// | below 200   | `Rejected`  |
///
/// 500 itself is rejected: only statuses strictly above it are retried.
pub fn classify_status(status: u16) -> Outcome {
    match status {
        200..=299 => Outcome::Delivered,
        300..=500 => Outcome::Rejected,
        501.. => Outcome::Retry,
        _ => Outcome::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_band() {
        for status in [200, 201, 202, 204, 299] {
            assert_eq!(classify_status(status), Outcome::Delivered, "{status}");
        }
    }

    #[test]
    fn permanent_band_includes_redirects_client_errors_and_500() {
        for status in [300, 301, 304, 400, 401, 403, 404, 422, 429, 499, 500] {
            assert_eq!(classify_status(status), Outcome::Rejected, "{status}");
        }
    }

    #[test]
    fn transient_band_starts_above_500() {
        for status in [501, 502, 503, 504, 599] {
            assert_eq!(classify_status(status), Outcome::Retry, "{status}");
        }
    }

    #[test]
    fn informational_statuses_are_not_retried() {
        assert_eq!(classify_status(100), Outcome::Rejected);
        assert_eq!(classify_status(199), Outcome::Rejected);
    }
}
