//! Wire protocol: one JSON request per line, one JSON response per line.
//!
//! ```text
//! -> {"op":"open","path":"/collections/people/documents"}
//! <- {"ok":true}
//! -> {"op":"read","path":"/collections/people/documents","offset":0,"count":4096}
//! <- {"ok":true,"data":"WwoJewoJCSJfaWQiOi..."}
//! -> {"op":"write","path":"/collections/people/documents","offset":0,"data":"W3t9XQ=="}
//! <- {"ok":false,"error":"...","written":4}
//! ```
//!
//! File contents travel as standard base64.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use docfs_kernel::{DirEntry, FileAttr, OpenFlags, VfsError};

use crate::constants::DEFAULT_DIR_MODE;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Stat {
        path: String,
    },
    List {
        path: String,
    },
    Open {
        path: String,
        #[serde(default)]
        write: bool,
        #[serde(default)]
        truncate: bool,
    },
    Read {
        path: String,
        #[serde(default)]
        offset: u64,
        count: u32,
    },
    Write {
        path: String,
        #[serde(default)]
        offset: u64,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    Mkdir {
        path: String,
        #[serde(default = "default_dir_mode")]
        mode: u32,
    },
}

fn default_dir_mode() -> u32 {
    DEFAULT_DIR_MODE
}

impl Request {
    /// Parse one request line (trailing newline allowed).
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(line)?)
    }

    pub fn path(&self) -> &str {
        match self {
            Request::Stat { path }
            | Request::List { path }
            | Request::Open { path, .. }
            | Request::Read { path, .. }
            | Request::Write { path, .. }
            | Request::Mkdir { path, .. } => path,
        }
    }

    /// Open flags for an `open` request; reads are always allowed.
    pub fn open_flags(write: bool, truncate: bool) -> OpenFlags {
        OpenFlags {
            read: true,
            write: write || truncate,
            truncate,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<FileAttr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<DirEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub data: Option<Vec<u8>>,

    /// Bytes accepted; also set on a failed write that was partly applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn attr(attr: FileAttr) -> Self {
        Self {
            attr: Some(attr),
            ..Self::ok()
        }
    }

    pub fn entries(entries: Vec<DirEntry>) -> Self {
        Self {
            entries: Some(entries),
            ..Self::ok()
        }
    }

    pub fn data(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    pub fn written(written: u32) -> Self {
        Self {
            written: Some(written),
            ..Self::ok()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Error response for a failed operation, keeping any partial byte count.
    pub fn from_error(err: &VfsError) -> Self {
        Self {
            written: err.written(),
            ..Self::failure(err.to_string())
        }
    }

    /// Serialize as one line, newline included.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = serde_json::to_vec(self).unwrap_or_else(|e| {
            serde_json::json!({ "ok": false, "error": format!("unencodable response: {e}") })
                .to_string()
                .into_bytes()
        });
        line.push(b'\n');
        line
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => super::base64_bytes::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        use base64::Engine as _;
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| base64::engine::general_purpose::STANDARD.decode(t))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
