//! `qdata-jobrunner`: the isolated child process spawned once per task by
//! the worker pool (C4). It reads exactly one normalized [`TaskRequest`]
//! from stdin, asks the provider for an answer, writes exactly one
//! [`JobOutcome`] to stdout, and exits — the subprocess boundary is what
//! actually discards the provider's process-wide memoization between
//! unrelated jobs, the Rust analogue of the original service's
//! `multiprocessing.Process(target=..._callback)`.

use std::io::Read;

use qdata_protocol::{JobOutcome, TaskRequest};
use qdata_provider::{InstrumentResult, Provider, StubProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let request: TaskRequest = serde_json::from_str(input.trim())?;

    let provider = StubProvider;
    let outcome = handle(&provider, &request).await;

    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

async fn handle(provider: &dyn Provider, request: &TaskRequest) -> JobOutcome {
    match request {
        TaskRequest::Calendar {
            start_time,
            end_time,
            freq,
            future,
        } => match provider
            .calendar(start_time.as_deref(), end_time.as_deref(), freq, *future)
            .await
        {
            Ok(entries) => JobOutcome::success(serde_json::json!(entries)),
            Err(e) => JobOutcome::invalid(e.to_string()),
        },
        TaskRequest::Instrument {
            instruments,
            start_time,
            end_time,
            freq,
            as_list,
        } => match provider
            .list_instruments(
                instruments,
                start_time.as_deref(),
                end_time.as_deref(),
                freq,
                *as_list,
            )
            .await
        {
            Ok(InstrumentResult::List(entries)) => JobOutcome::success(serde_json::json!(entries)),
            Ok(InstrumentResult::Ranges(map)) => JobOutcome::success(serde_json::json!(map)),
            Err(e) => JobOutcome::invalid(e.to_string()),
        },
        TaskRequest::Feature {
            instruments,
            fields,
            start_time,
            end_time,
            freq,
            disk_cache,
        } => match provider
            .features_uri(
                instruments,
                fields,
                start_time.as_deref(),
                end_time.as_deref(),
                freq,
                *disk_cache,
            )
            .await
        {
            Ok(uri) => JobOutcome::success(serde_json::json!(uri)),
            Err(e) => JobOutcome::invalid(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calendar_request_produces_success_outcome() {
        let provider = StubProvider;
        let request = TaskRequest::Calendar {
            start_time: Some("2020-01-01".into()),
            end_time: Some("2020-01-05".into()),
            freq: "day".into(),
            future: false,
        };
        let outcome = handle(&provider, &request).await;
        assert_eq!(outcome.status, qdata_protocol::ResponseStatus::Success);
        assert!(outcome.data.is_some());
    }
}
