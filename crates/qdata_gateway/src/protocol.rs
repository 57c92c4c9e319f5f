//! Client→server wire shapes. A client message is one JSON text frame
//! carrying an event name, a version header, and a body whose fields
//! match the named [`qdata_protocol::TaskRequest`] variant — the same
//! split the original service's Socket.IO `head`/`body` pickle envelope
//! used, just without pickle.

use qdata_protocol::{Instruments, TaskRequest};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ClientHead {
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct ClientEnvelope {
    pub event: String,
    pub head: ClientHead,
    pub body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CalendarBody {
    start_time: Option<String>,
    end_time: Option<String>,
    freq: String,
    #[serde(default)]
    future: bool,
}

#[derive(Debug, Deserialize)]
struct InstrumentBody {
    instruments: Instruments,
    start_time: Option<String>,
    end_time: Option<String>,
    freq: String,
    #[serde(default)]
    as_list: bool,
}

#[derive(Debug, Deserialize)]
struct FeatureBody {
    instruments: Instruments,
    fields: Vec<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    freq: String,
    #[serde(default = "default_disk_cache")]
    disk_cache: i32,
}

fn default_disk_cache() -> i32 {
    1
}

/// Decode a client envelope's `(event, body)` pair into a [`TaskRequest`].
/// Returns `None` for an event name the gateway does not recognize, which
/// the caller treats the same way the original logged it: a warning, no
/// response sent.
pub fn decode_request(
    event: &str,
    body: serde_json::Value,
) -> Option<Result<TaskRequest, serde_json::Error>> {
    match event {
        "calendar_request" => Some(serde_json::from_value::<CalendarBody>(body).map(|b| {
            TaskRequest::Calendar {
                start_time: b.start_time,
                end_time: b.end_time,
                freq: b.freq,
                future: b.future,
            }
        })),
        "instrument_request" => Some(serde_json::from_value::<InstrumentBody>(body).map(|b| {
            TaskRequest::Instrument {
                instruments: b.instruments,
                start_time: b.start_time,
                end_time: b.end_time,
                freq: b.freq,
                as_list: b.as_list,
            }
        })),
        "feature_request" => Some(serde_json::from_value::<FeatureBody>(body).map(|b| {
            TaskRequest::Feature {
                instruments: b.instruments,
                fields: b.fields,
                start_time: b.start_time,
                end_time: b.end_time,
                freq: b.freq,
                disk_cache: b.disk_cache,
            }
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_calendar_body() {
        let body = json!({"start_time": "2020-01-01", "end_time": "None", "freq": "day"});
        let request = decode_request("calendar_request", body).unwrap().unwrap();
        assert_eq!(request.kind().as_str(), "calendar");
    }

    #[test]
    fn unknown_event_is_none() {
        assert!(decode_request("ping", json!({})).is_none());
    }

    #[test]
    fn malformed_body_surfaces_as_error() {
        let body = json!({"start_time": "2020-01-01"});
        let result = decode_request("calendar_request", body).unwrap();
        assert!(result.is_err());
    }
}
