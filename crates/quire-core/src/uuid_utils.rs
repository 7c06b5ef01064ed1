//! UUID v7 helpers for job identifiers.
//!
//! Job ids are UUIDv7 so they sort by submission time, which gives listings a
//! stable tiebreak after `created_at`.

use uuid::Uuid;

use crate::error::{Error, Result};

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Parse a caller-supplied job id.
///
/// Callers treat ids as opaque strings, so anything that does not parse can
/// never name a job and is reported as `NotFound`.
pub fn parse_job_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::NotFound(format!("job {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_version_7() {
        assert_eq!(new_v7().get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_ordering() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }

    #[test]
    fn test_parse_job_id_roundtrip() {
        let id = new_v7();
        assert_eq!(parse_job_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_job_id(&format!("  {}  ", id)).unwrap(), id);
    }

    #[test]
    fn test_parse_job_id_garbage_is_not_found() {
        let err = parse_job_id("command:abc123").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
