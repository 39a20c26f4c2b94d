//! Conversion between managed records and script files.
//!
//! The device stores script text as UTF-8, but the link layer hands payloads
//! over decoded as ISO-8859-1 (one code point per byte). Recovering the real
//! text therefore takes two steps: map every code point back to its byte,
//! then decode those bytes as UTF-8. Encoding runs the same steps in reverse.
//! Skipping either step corrupts any non-ASCII content.

use crate::error::{StoreError, StoreResult};
use crate::file::ScriptFile;
use crate::record::{OpaqueRecord, Record, ScriptRecord, Snapshot};
use tracing::warn;

/// Result of decoding a snapshot.
#[derive(Debug)]
pub struct Decoded<'a> {
    /// One file per distinct managed record name, in first-seen order.
    pub files: Vec<ScriptFile>,
    /// Records of other types, untouched.
    pub passthrough: Vec<&'a OpaqueRecord>,
}

/// Splits a snapshot into script files and passthrough records.
///
/// When several managed records share a name the last one wins.
pub fn decode(snapshot: &Snapshot) -> StoreResult<Decoded<'_>> {
    let mut files: Vec<ScriptFile> = Vec::new();
    let mut passthrough = Vec::new();

    for record in &snapshot.records {
        match record {
            Record::Opaque(opaque) => passthrough.push(opaque),
            Record::Script(script) => {
                let file = decode_record(script)?;
                if let Some(existing) = files.iter_mut().find(|f| f.name == file.name) {
                    warn!(name = %file.name, "Duplicate script record, keeping the later one");
                    *existing = file;
                } else {
                    files.push(file);
                }
            }
        }
    }

    Ok(Decoded { files, passthrough })
}

/// Decodes a single managed record into a file.
pub fn decode_record(record: &ScriptRecord) -> StoreResult<ScriptFile> {
    let content = decode_payload(&record.name, &record.code)?;
    Ok(ScriptFile::new(record.name.clone(), content))
}

/// Recovers logical text from a link-decoded payload.
pub fn decode_payload(name: &str, code: &str) -> StoreResult<String> {
    let bytes = code
        .chars()
        .map(|c| {
            u8::try_from(c).map_err(|_| {
                StoreError::encoding(name, format!("code point U+{:04X} is not a single byte", u32::from(c)))
            })
        })
        .collect::<StoreResult<Vec<u8>>>()?;
    decode_content(name, bytes)
}

/// Interprets raw content bytes as UTF-8 text.
pub fn decode_content(name: &str, bytes: Vec<u8>) -> StoreResult<String> {
    String::from_utf8(bytes).map_err(|e| StoreError::encoding(name, e.utf8_error()))
}

/// Produces the payload the link layer expects for `content`.
///
/// Every byte maps to one code point in ISO-8859-1, so any UTF-8 text has
/// an exact encoding.
pub fn encode_payload(content: &str) -> String {
    content.bytes().map(char::from).collect()
}

/// Encodes a file's content for its record.
pub fn encode(file: &ScriptFile) -> String {
    encode_payload(&file.content)
}

/// Builds a fresh managed record for a file.
pub fn to_record(file: &ScriptFile) -> ScriptRecord {
    ScriptRecord::new(file.name.clone(), encode(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn opaque(name: &str) -> Record {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(name.into()));
        fields.insert("type".into(), Value::String("exam".into()));
        Record::Opaque(OpaqueRecord { fields })
    }

    #[test]
    fn test_decode_two_step() {
        // "é" is C3 A9 in UTF-8; the link hands it over as "Ã©"
        let decoded = decode_payload("x", "caf\u{c3}\u{a9}").unwrap();
        assert_eq!(decoded, "café");
    }

    #[test]
    fn test_encode_two_step() {
        assert_eq!(encode_payload("café"), "caf\u{c3}\u{a9}");
        assert_eq!(encode_payload("ascii"), "ascii");
    }

    #[test]
    fn test_decode_rejects_wide_code_point() {
        let err = decode_payload("x", "\u{20ac}").unwrap_err();
        assert!(matches!(err, StoreError::EncodingViolation { .. }));
        assert!(err.to_string().contains("U+20AC"));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        // A lone continuation byte
        let err = decode_payload("x", "\u{a9}").unwrap_err();
        assert!(matches!(err, StoreError::EncodingViolation { ref name, .. } if name == "x"));
    }

    #[test]
    fn test_decode_filters_and_keeps_order() {
        let snapshot = Snapshot::new(vec![
            Record::Script(ScriptRecord::new("foo", "1")),
            opaque("settings"),
            Record::Script(ScriptRecord::new("bar", "2")),
        ]);
        let decoded = decode(&snapshot).unwrap();
        let names: Vec<_> = decoded.files.iter().map(ScriptFile::display_name).collect();
        assert_eq!(names, ["foo.py", "bar.py"]);
        assert_eq!(decoded.passthrough.len(), 1);
        assert_eq!(decoded.passthrough[0].name(), Some("settings"));
    }

    #[test]
    fn test_decode_duplicate_names_last_wins() {
        let snapshot = Snapshot::new(vec![
            Record::Script(ScriptRecord::new("dup", "first")),
            Record::Script(ScriptRecord::new("other", "")),
            Record::Script(ScriptRecord::new("dup", "second")),
        ]);
        let decoded = decode(&snapshot).unwrap();
        assert_eq!(decoded.files.len(), 2);
        assert_eq!(decoded.files[0], ScriptFile::new("dup", "second"));
    }

    #[test]
    fn test_to_record_defaults() {
        let record = to_record(&ScriptFile::new("new", "ü"));
        assert_eq!(record.name, "new");
        assert!(!record.auto_import);
        assert_eq!(record.code, "\u{c3}\u{bc}");
        assert!(record.extra.is_empty());
    }
}

/// Property-based tests using proptest.
#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any text survives encode followed by decode.
        #[test]
        fn encode_decode_roundtrip(text in any::<String>()) {
            let payload = encode_payload(&text);
            prop_assert_eq!(decode_payload("p", &payload).unwrap(), text);
        }

        /// Encoded payloads never contain code points above U+00FF.
        #[test]
        fn encoded_payload_is_single_byte(text in any::<String>()) {
            prop_assert!(encode_payload(&text).chars().all(|c| u32::from(c) <= 0xFF));
        }
    }
}
