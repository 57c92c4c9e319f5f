//! Request/response DTOs carried through the coalescing index and the
//! durable queues.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three request kinds a client can send, matching the three event
/// pairs in the client transport (`{kind}_request` / `{kind}_response`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Calendar,
    Instrument,
    Feature,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Calendar => "calendar",
            TaskKind::Instrument => "instrument",
            TaskKind::Feature => "feature",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instrument selector as accepted by instrument/feature requests.
///
/// Clients may send a flat list, a market-name mapping (passed through
/// untouched), or a mapping of instrument -> list of `(start, end)` ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instruments {
    List(Vec<String>),
    Mapping(BTreeMap<String, Value>),
}

/// A single client request, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRequest {
    Calendar {
        start_time: Option<String>,
        end_time: Option<String>,
        freq: String,
        #[serde(default)]
        future: bool,
    },
    Instrument {
        instruments: Instruments,
        start_time: Option<String>,
        end_time: Option<String>,
        freq: String,
        #[serde(default)]
        as_list: bool,
    },
    Feature {
        instruments: Instruments,
        fields: Vec<String>,
        start_time: Option<String>,
        end_time: Option<String>,
        freq: String,
        #[serde(default = "default_disk_cache")]
        disk_cache: i32,
    },
}

fn default_disk_cache() -> i32 {
    1
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::Calendar { .. } => TaskKind::Calendar,
            TaskRequest::Instrument { .. } => TaskKind::Instrument,
            TaskRequest::Feature { .. } => TaskKind::Feature,
        }
    }

    /// Normalize the literal string `"None"` sent by clients for an absent
    /// optional field into a real `None`. The original service repeated
    /// this check ad hoc in each of its three callbacks; this is the one
    /// place it happens here, applied identically regardless of where the
    /// request is normalized (gateway ingress, or worker re-verification).
    pub fn normalize(mut self) -> Self {
        fn clean(v: &mut Option<String>) {
            if matches!(v.as_deref(), Some("None") | Some("")) {
                *v = None;
            }
        }
        match &mut self {
            TaskRequest::Calendar {
                start_time,
                end_time,
                ..
            } => {
                clean(start_time);
                clean(end_time);
            }
            TaskRequest::Instrument {
                start_time,
                end_time,
                ..
            } => {
                clean(start_time);
                clean(end_time);
            }
            TaskRequest::Feature {
                start_time,
                end_time,
                ..
            } => {
                clean(start_time);
                clean(end_time);
            }
        }
        self
    }
}

/// Outcome status for a finished task, matching the original service's
/// `0 = success / 1 = invalid` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseStatus {
    Success = 0,
    Invalid = 1,
}

/// A task message carried on the task queue (C2). Every request gets its
/// own envelope even when several sessions ask for the same fingerprint;
/// coalescing happens when the worker consults the coalescing index, not
/// at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub ssid: String,
    pub request: TaskRequest,
}

/// A finished-task message carried on the response queue (C3). `ssids` is
/// already the fully drained coalescing-index wait set for this
/// fingerprint, resolved by the worker before it published this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub kind: TaskKind,
    pub ssids: Vec<String>,
    pub data: Option<Value>,
    pub status: ResponseStatus,
    pub detailed_info: Option<String>,
}

/// The result a job-runner child process reports back to its parent
/// worker over stdout: one line of JSON, one outcome per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub data: Option<Value>,
    pub status: ResponseStatus,
    pub detailed_info: Option<String>,
}

impl JobOutcome {
    pub fn success(data: Value) -> Self {
        Self {
            data: Some(data),
            status: ResponseStatus::Success,
            detailed_info: None,
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self {
            data: None,
            status: ResponseStatus::Invalid,
            detailed_info: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clears_none_sentinel() {
        let req = TaskRequest::Calendar {
            start_time: Some("None".to_string()),
            end_time: Some("2020-01-01".to_string()),
            freq: "day".to_string(),
            future: false,
        }
        .normalize();
        match req {
            TaskRequest::Calendar {
                start_time,
                end_time,
                ..
            } => {
                assert_eq!(start_time, None);
                assert_eq!(end_time, Some("2020-01-01".to_string()));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn kind_roundtrips_through_json() {
        let req = TaskRequest::Feature {
            instruments: Instruments::List(vec!["SH600000".into()]),
            fields: vec!["$close".into()],
            start_time: None,
            end_time: None,
            freq: "day".into(),
            disk_cache: 1,
        };
        assert_eq!(req.kind(), TaskKind::Feature);
        let text = serde_json::to_string(&req).unwrap();
        let back: TaskRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back.kind(), TaskKind::Feature);
    }
}
