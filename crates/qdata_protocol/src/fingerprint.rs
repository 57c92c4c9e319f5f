//! Stable content-addressing for [`TaskRequest`](crate::types::TaskRequest)
//! values, ported from the original service's `hash_args`/`get_task_uri`.
//!
//! Two requests that mean the same thing (same instruments in a different
//! order, differently-cased `freq`/fields) must collapse to the same
//! fingerprint so they coalesce onto one [`WaitSet`]. This canonicalizes
//! every request kind the same way (sorted instrument lists, lowercased
//! `freq`/fields, sorted map keys) rather than the original's per-kind
//! treatment, which only canonicalized feature requests — see the fixed
//! "Client-version acceptance grammar" style Open Question decision in
//! DESIGN.md for why the uniform treatment was chosen here.
//!
//! [`WaitSet`]: crate::types::TaskEnvelope

use std::fmt;

use serde_json::{json, Map, Value};

use crate::error::{ProtocolError, Result};
use crate::types::{Instruments, TaskRequest};

/// A 128-bit digest of a canonicalized [`TaskRequest`], used as the key
/// for the coalescing index and the identity carried through the response
/// queue back to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskFingerprint([u8; 16]);

impl TaskFingerprint {
    pub fn compute(request: &TaskRequest) -> Self {
        let canonical = canonical_value(request);
        let text = serde_json::to_string(&canonical).expect("canonical value always serializes");
        let digest = md5::compute(text.as_bytes());
        TaskFingerprint(digest.0)
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 32 {
            return Err(ProtocolError::InvalidFingerprintHex(s.to_string()));
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk)
                .map_err(|_| ProtocolError::InvalidFingerprintHex(s.to_string()))?;
            bytes[i] = u8::from_str_radix(hex, 16)
                .map_err(|_| ProtocolError::InvalidFingerprintHex(s.to_string()))?;
        }
        Ok(TaskFingerprint(bytes))
    }
}

impl fmt::Display for TaskFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn canonical_instruments(instruments: &Instruments) -> Value {
    match instruments {
        Instruments::List(items) => {
            let mut sorted = items.clone();
            sorted.sort();
            json!(sorted)
        }
        Instruments::Mapping(map) => {
            if map.contains_key("market") {
                // Passed through untouched, same as the original service.
                json!(map)
            } else {
                let mut out = Map::new();
                for (instrument, ranges) in map {
                    if let Some(arr) = ranges.as_array() {
                        let mut stringified: Vec<String> =
                            arr.iter().map(|v| v.to_string()).collect();
                        stringified.sort();
                        out.insert(instrument.clone(), json!(stringified));
                    } else {
                        out.insert(instrument.clone(), ranges.clone());
                    }
                }
                Value::Object(out)
            }
        }
    }
}

fn canonical_value(request: &TaskRequest) -> Value {
    match request {
        TaskRequest::Calendar {
            start_time,
            end_time,
            freq,
            future,
        } => json!({
            "kind": "calendar",
            "start_time": start_time,
            "end_time": end_time,
            "freq": freq.to_lowercase(),
            "future": future,
        }),
        TaskRequest::Instrument {
            instruments,
            start_time,
            end_time,
            freq,
            as_list,
        } => json!({
            "kind": "instrument",
            "instruments": canonical_instruments(instruments),
            "start_time": start_time,
            "end_time": end_time,
            "freq": freq.to_lowercase(),
            "as_list": as_list,
        }),
        TaskRequest::Feature {
            instruments,
            fields,
            start_time,
            end_time,
            freq,
            disk_cache,
        } => {
            let mut sorted_fields: Vec<String> =
                fields.iter().map(|field| field.to_lowercase()).collect();
            sorted_fields.sort();
            json!({
                "kind": "feature",
                "instruments": canonical_instruments(instruments),
                "fields": sorted_fields,
                "start_time": start_time,
                "end_time": end_time,
                "freq": freq.to_lowercase(),
                "disk_cache": disk_cache,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar(start: &str, end: &str, freq: &str) -> TaskRequest {
        TaskRequest::Calendar {
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            freq: freq.to_string(),
            future: false,
        }
    }

    #[test]
    fn identical_requests_collide() {
        let a = TaskFingerprint::compute(&calendar("2020-01-01", "2020-06-01", "day"));
        let b = TaskFingerprint::compute(&calendar("2020-01-01", "2020-06-01", "day"));
        assert_eq!(a, b);
    }

    #[test]
    fn freq_case_is_ignored() {
        let a = TaskFingerprint::compute(&calendar("2020-01-01", "2020-06-01", "day"));
        let b = TaskFingerprint::compute(&calendar("2020-01-01", "2020-06-01", "DAY"));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_requests_differ() {
        let a = TaskFingerprint::compute(&calendar("2020-01-01", "2020-06-01", "day"));
        let b = TaskFingerprint::compute(&calendar("2020-01-01", "2020-06-02", "day"));
        assert_ne!(a, b);
    }

    #[test]
    fn instrument_list_order_is_ignored() {
        let a = TaskRequest::Instrument {
            instruments: Instruments::List(vec!["SH600000".into(), "SZ000001".into()]),
            start_time: None,
            end_time: None,
            freq: "day".into(),
            as_list: false,
        };
        let b = TaskRequest::Instrument {
            instruments: Instruments::List(vec!["SZ000001".into(), "SH600000".into()]),
            start_time: None,
            end_time: None,
            freq: "day".into(),
            as_list: false,
        };
        assert_eq!(TaskFingerprint::compute(&a), TaskFingerprint::compute(&b));
    }

    #[test]
    fn fingerprint_hex_roundtrips() {
        let fp = TaskFingerprint::compute(&calendar("2020-01-01", "2020-06-01", "day"));
        let hex = fp.to_hex();
        let back = TaskFingerprint::from_hex(&hex).unwrap();
        assert_eq!(fp, back);
    }
}
