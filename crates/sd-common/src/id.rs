//! Run identity for capture sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Run ID for tracking one capture session.
///
/// Format: `sd-YYYYMMDD-HHMMSS-XXXX`
/// Example: `sd-20260312-091433-k2qe`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID from the current UTC time.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        RunId(format!(
            "sd-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            generate_base32_suffix()
        ))
    }

    /// Parse and validate an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 23 {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes.first() != Some(&b's')
            || bytes.get(1) != Some(&b'd')
            || bytes.get(2) != Some(&b'-')
            || bytes.get(11) != Some(&b'-')
            || bytes.get(18) != Some(&b'-')
        {
            return None;
        }
        let date = &s[3..11];
        let time = &s[12..18];
        let suffix = &s[19..23];
        if !date.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(RunId(s.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 4-char base32 suffix (20 bits of a v4 UUID) for collision avoidance
/// within a second.
fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let mut value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32);
    value &= 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(4);
    for shift in [15_u32, 10, 5, 0] {
        let idx = ((value >> shift) & 0x1F) as usize;
        out.push(alphabet[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let id = RunId::new();
        assert_eq!(id.0.len(), 23);
        assert!(id.0.starts_with("sd-"));
    }

    #[test]
    fn test_run_id_roundtrip() {
        let id = RunId::new();
        let parsed = RunId::parse(&id.0).expect("generated id must parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_run_id_parse_rejects_garbage() {
        assert!(RunId::parse("").is_none());
        assert!(RunId::parse("pt-20260115-143022-a7xq").is_none());
        assert!(RunId::parse("sd-2026011a-143022-a7xq").is_none());
        assert!(RunId::parse("sd-20260115-143022-A7XQ").is_none());
    }

    #[test]
    fn test_suffix_alphabet() {
        for _ in 0..100 {
            let s = generate_base32_suffix();
            assert_eq!(s.len(), 4);
            assert!(s.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')));
        }
    }
}
