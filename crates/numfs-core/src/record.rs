//! Wire form of the calculator storage.
//!
//! A [`Snapshot`] is the complete record collection as returned by a storage
//! backup. Only records tagged [`SCRIPT_RECORD_TYPE`] are interpreted; every
//! other record is carried as an [`OpaqueRecord`] and re-emitted exactly as it
//! was received.
//!
//! The JSON shape follows the device client's backup format:
//!
//! ```json
//! { "magik": true,
//!   "records": [
//!     { "name": "hello", "type": "py", "autoImport": true, "code": "print(1)" },
//!     { "name": "poincare", "type": "exam", "data": "..." } ] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Type tag of records managed as scripts.
pub const SCRIPT_RECORD_TYPE: &str = "py";

const NAME_FIELD: &str = "name";
const TYPE_FIELD: &str = "type";
const CODE_FIELD: &str = "code";
const AUTO_IMPORT_FIELD: &str = "autoImport";

/// A managed record could not be interpreted.
#[derive(Debug, Error)]
#[error("malformed script record: {0}")]
pub struct MalformedRecord(String);

/// The full record collection held by the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub records: Vec<Record>,
    /// Top-level fields other than `records` (e.g. `magik`), kept verbatim.
    #[serde(flatten)]
    pub header: Map<String, Value>,
}

impl Snapshot {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            header: Map::new(),
        }
    }

    /// Iterates over the managed (script) records.
    pub fn scripts(&self) -> impl Iterator<Item = &ScriptRecord> {
        self.records.iter().filter_map(Record::as_script)
    }

    /// Finds the managed record with the given name.
    pub fn script_mut(&mut self, name: &str) -> Option<&mut ScriptRecord> {
        self.records
            .iter_mut()
            .filter_map(Record::as_script_mut)
            .find(|r| r.name == name)
    }

    /// Removes the first managed record with the given name.
    pub fn remove_script(&mut self, name: &str) -> Option<ScriptRecord> {
        let pos = self
            .records
            .iter()
            .position(|r| r.as_script().is_some_and(|s| s.name == name))?;
        match self.records.remove(pos) {
            Record::Script(script) => Some(script),
            Record::Opaque(_) => None,
        }
    }
}

/// One storage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub enum Record {
    /// A Python script, edited through the filesystem.
    Script(ScriptRecord),
    /// Any other kind of record, passed through untouched.
    Opaque(OpaqueRecord),
}

impl Record {
    pub fn as_script(&self) -> Option<&ScriptRecord> {
        match self {
            Record::Script(script) => Some(script),
            Record::Opaque(_) => None,
        }
    }

    pub fn as_script_mut(&mut self) -> Option<&mut ScriptRecord> {
        match self {
            Record::Script(script) => Some(script),
            Record::Opaque(_) => None,
        }
    }

    /// Record name, if it carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Record::Script(script) => Some(&script.name),
            Record::Opaque(opaque) => opaque.name(),
        }
    }
}

/// A managed script record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRecord {
    pub name: String,
    /// Whether the device imports this script into the shell automatically.
    pub auto_import: bool,
    /// Payload as decoded by the device link (single-byte encoding).
    pub code: String,
    /// Unrecognized fields, preserved on save.
    pub extra: Map<String, Value>,
}

impl ScriptRecord {
    /// Creates a record for a script that does not exist on the device yet.
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_import: false,
            code: code.into(),
            extra: Map::new(),
        }
    }
}

/// A record of a type this system does not manage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpaqueRecord {
    pub fields: Map<String, Value>,
}

impl OpaqueRecord {
    pub fn name(&self) -> Option<&str> {
        self.fields.get(NAME_FIELD).and_then(Value::as_str)
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.fields.get(TYPE_FIELD).and_then(Value::as_str)
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = MalformedRecord;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        if fields.get(TYPE_FIELD).and_then(Value::as_str) != Some(SCRIPT_RECORD_TYPE) {
            return Ok(Record::Opaque(OpaqueRecord { fields }));
        }

        let name = match fields.remove(NAME_FIELD) {
            Some(Value::String(name)) => name,
            other => return Err(MalformedRecord(format!("expected string name, got {other:?}"))),
        };
        let code = match fields.remove(CODE_FIELD) {
            Some(Value::String(code)) => code,
            None | Some(Value::Null) => String::new(),
            Some(other) => {
                return Err(MalformedRecord(format!("'{name}': expected string code, got {other}")));
            }
        };
        let auto_import = match fields.remove(AUTO_IMPORT_FIELD) {
            Some(Value::Bool(flag)) => flag,
            None | Some(Value::Null) => false,
            Some(other) => {
                return Err(MalformedRecord(format!("'{name}': expected boolean autoImport, got {other}")));
            }
        };
        fields.remove(TYPE_FIELD);

        Ok(Record::Script(ScriptRecord {
            name,
            auto_import,
            code,
            extra: fields,
        }))
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        match record {
            Record::Opaque(opaque) => opaque.fields,
            Record::Script(script) => {
                let mut fields = Map::new();
                fields.insert(NAME_FIELD.into(), Value::String(script.name));
                fields.insert(TYPE_FIELD.into(), Value::String(SCRIPT_RECORD_TYPE.into()));
                fields.insert(AUTO_IMPORT_FIELD.into(), Value::Bool(script.auto_import));
                fields.insert(CODE_FIELD.into(), Value::String(script.code));
                fields.extend(script.extra);
                fields
            }
        }
    }
}
