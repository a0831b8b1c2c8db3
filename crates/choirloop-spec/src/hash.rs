//! Canonical serialization and settings fingerprints.
//!
//! The fingerprint of a settings document is computed as:
//!
//! ```text
//! fingerprint = hex(BLAKE3(JCS(settings_json)))
//! ```
//!
//! where JCS is the JSON Canonicalization Scheme (RFC 8785). All numeric
//! settings are integers, so the result never depends on float formatting,
//! locale, or map iteration order.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ValidationError};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 64;

/// Hex-encoded BLAKE3 digest naming one render-settings combination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parses a caller-supplied fingerprint.
    ///
    /// Only 64 lowercase hex characters are accepted, so a parsed fingerprint
    /// is always safe to use as a file name.
    ///
    /// # Example
    /// ```
    /// use choirloop_spec::Fingerprint;
    ///
    /// assert!(Fingerprint::parse(&"ab".repeat(32)).is_ok());
    /// assert!(Fingerprint::parse("../../etc/passwd").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let well_formed = value.len() == FINGERPRINT_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(ValidationError::new(
                ErrorCode::MalformedFingerprint,
                "fingerprint",
                format!(
                    "expected {} lowercase hex characters, got {:?}",
                    FINGERPRINT_LEN, value
                ),
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// The fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines and download names.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Fingerprint::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Computes the canonical BLAKE3 fingerprint of a JSON value.
pub fn canonical_value_hash(value: &serde_json::Value) -> Fingerprint {
    let canonical = canonicalize_json(value);
    Fingerprint(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}

/// Canonicalizes a JSON value according to RFC 8785 (JCS).
///
/// - Object keys are sorted lexicographically
/// - No whitespace between tokens
/// - Integers are written in plain decimal
/// - Strings use minimal escaping
pub fn canonicalize_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => out.push_str(&format_jcs_number(n)),
        serde_json::Value::String(s) => push_jcs_string(s, out),
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        serde_json::Value::Object(obj) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_jcs_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

/// Formats a number according to JCS rules.
fn format_jcs_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => {
            if f == 0.0 {
                return "0".to_string();
            }
            if f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{}", f as i64);
            }
            format!("{}", f)
        }
        _ => "null".to_string(),
    }
}

/// Appends a string according to JCS rules.
fn push_jcs_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if c < '\x20' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_json_object_ordering() {
        let value = serde_json::json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonicalize_json(&value), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_canonicalize_json_nested() {
        let value = serde_json::json!({"outer": {"b": [1, 2, {"y": null, "x": true}], "a": -10}});
        assert_eq!(
            canonicalize_json(&value),
            r#"{"outer":{"a":-10,"b":[1,2,{"x":true,"y":null}]}}"#
        );
    }

    #[test]
    fn test_canonicalize_json_strings() {
        let value = serde_json::json!("tab\there \"quoted\" \u{1}");
        assert_eq!(
            canonicalize_json(&value),
            r#""tab\there \"quoted\" \u0001""#
        );
    }

    #[test]
    fn test_hash_stability() {
        let value = serde_json::json!({"song_id": "ave-maria", "tempo_percent": 100});
        let first = canonical_value_hash(&value);
        let second = canonical_value_hash(&value);
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), FINGERPRINT_LEN);
        assert!(Fingerprint::parse(first.as_str()).is_ok());
    }

    #[test]
    fn test_known_digest() {
        // BLAKE3 of the canonical text, computed independently of the JSON layer.
        let value = serde_json::json!({"b": 1, "a": "x"});
        let expected = blake3::hash(br#"{"a":"x","b":1}"#).to_hex().to_string();
        assert_eq!(canonical_value_hash(&value).as_str(), expected);
    }

    #[test]
    fn test_fingerprint_parse_rejects_bad_input() {
        assert!(Fingerprint::parse("").is_err());
        assert!(Fingerprint::parse(&"A".repeat(64)).is_err());
        assert!(Fingerprint::parse(&"a".repeat(63)).is_err());
        assert!(Fingerprint::parse(&format!("{}/", "a".repeat(63))).is_err());

        let err = Fingerprint::parse("nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedFingerprint);
    }

    #[test]
    fn test_fingerprint_serde_roundtrip_validates() {
        let good = format!("\"{}\"", "0f".repeat(32));
        let fp: Fingerprint = serde_json::from_str(&good).unwrap();
        assert_eq!(fp.short(), "0f0f0f0f");

        assert!(serde_json::from_str::<Fingerprint>("\"not-a-fingerprint\"").is_err());
    }

    #[test]
    fn test_format_jcs_number() {
        let n = serde_json::Number::from(-10);
        assert_eq!(format_jcs_number(&n), "-10");
        let n = serde_json::Number::from_f64(2.0).unwrap();
        assert_eq!(format_jcs_number(&n), "2");
    }
}
