//! A deterministic stand-in provider used by tests and local runs. It
//! never reaches out to a real market-data engine (out of scope per the
//! spec's Non-goals) — it only derives plausible-looking output purely
//! from its inputs, so the same request always produces the same answer.

use async_trait::async_trait;
use qdata_protocol::Instruments;

use crate::error::Result;
use crate::trait_def::{InstrumentResult, Provider};

pub struct StubProvider;

fn instrument_names(instruments: &Instruments) -> Vec<String> {
    match instruments {
        Instruments::List(items) => {
            let mut out = items.clone();
            out.sort();
            out
        }
        Instruments::Mapping(map) => {
            if let Some(value) = map.get("market") {
                vec![value.as_str().unwrap_or("market").to_string()]
            } else {
                map.keys().cloned().collect()
            }
        }
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn calendar(
        &self,
        start_time: Option<&str>,
        end_time: Option<&str>,
        freq: &str,
        future: bool,
    ) -> Result<Vec<String>> {
        let start = start_time.unwrap_or("2020-01-01");
        let end = end_time.unwrap_or("2020-01-05");
        let mut out = vec![start.to_string()];
        if end != start {
            out.push(end.to_string());
        }
        if future {
            out.push(format!("{end}+1{freq}"));
        }
        Ok(out)
    }

    async fn list_instruments(
        &self,
        instruments: &Instruments,
        start_time: Option<&str>,
        end_time: Option<&str>,
        _freq: &str,
        as_list: bool,
    ) -> Result<InstrumentResult> {
        let names = instrument_names(instruments);
        if as_list {
            Ok(InstrumentResult::List(names))
        } else {
            let start = start_time.unwrap_or("2020-01-01").to_string();
            let end = end_time.unwrap_or("2020-12-31").to_string();
            let ranges = names
                .into_iter()
                .map(|name| (name, vec![(start.clone(), end.clone())]))
                .collect();
            Ok(InstrumentResult::Ranges(ranges))
        }
    }

    async fn features_uri(
        &self,
        instruments: &Instruments,
        fields: &[String],
        start_time: Option<&str>,
        end_time: Option<&str>,
        freq: &str,
        disk_cache: i32,
    ) -> Result<String> {
        let names = instrument_names(instruments).join(",");
        let mut sorted_fields = fields.to_vec();
        sorted_fields.sort();
        Ok(format!(
            "stub://features/{names}/{}/{}-{}/{freq}?disk_cache={disk_cache}",
            sorted_fields.join(","),
            start_time.unwrap_or("None"),
            end_time.unwrap_or("None"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calendar_is_deterministic() {
        let provider = StubProvider;
        let a = provider
            .calendar(Some("2020-01-01"), Some("2020-06-01"), "day", false)
            .await
            .unwrap();
        let b = provider
            .calendar(Some("2020-01-01"), Some("2020-06-01"), "day", false)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn list_instruments_respects_as_list_flag() {
        let provider = StubProvider;
        let instruments = Instruments::List(vec!["SZ000001".into(), "SH600000".into()]);
        let as_list = provider
            .list_instruments(&instruments, None, None, "day", true)
            .await
            .unwrap();
        assert_eq!(
            as_list,
            InstrumentResult::List(vec!["SH600000".into(), "SZ000001".into()])
        );

        let ranges = provider
            .list_instruments(&instruments, Some("2020-01-01"), Some("2020-12-31"), "day", false)
            .await
            .unwrap();
        match ranges {
            InstrumentResult::Ranges(map) => assert_eq!(map.len(), 2),
            _ => panic!("expected ranges"),
        }
    }

    #[tokio::test]
    async fn features_uri_never_contains_dataset_bytes() {
        let provider = StubProvider;
        let instruments = Instruments::List(vec!["SH600000".into()]);
        let uri = provider
            .features_uri(&instruments, &["$close".into()], None, None, "day", 1)
            .await
            .unwrap();
        assert!(uri.starts_with("stub://"));
    }
}
