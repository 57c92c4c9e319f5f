//! The external market-data provider contract. Computing the data itself
//! is explicitly out of scope (see spec §1 Non-goals); only the interface
//! the worker pool calls into is defined here.

use async_trait::async_trait;
use qdata_protocol::{Instruments, TaskFingerprint};

use crate::error::Result;

/// The shape of an instrument-listing result: either a flat sorted list,
/// or per-instrument `(start, end)` ranges, depending on the request's
/// `as_list` flag — mirrors `D.list_instruments`'s two return shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentResult {
    List(Vec<String>),
    Ranges(std::collections::BTreeMap<String, Vec<(String, String)>>),
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn calendar(
        &self,
        start_time: Option<&str>,
        end_time: Option<&str>,
        freq: &str,
        future: bool,
    ) -> Result<Vec<String>>;

    async fn list_instruments(
        &self,
        instruments: &Instruments,
        start_time: Option<&str>,
        end_time: Option<&str>,
        freq: &str,
        as_list: bool,
    ) -> Result<InstrumentResult>;

    /// Resolve (and, if necessary, materialize) the locator for a feature
    /// dataset. Only the locator is ever published — never the dataset
    /// bytes (spec §1 Non-goal).
    async fn features_uri(
        &self,
        instruments: &Instruments,
        fields: &[String],
        start_time: Option<&str>,
        end_time: Option<&str>,
        freq: &str,
        disk_cache: i32,
    ) -> Result<String>;

    /// A provider may supply its own fingerprint for a request instead of
    /// the core's canonical one (spec §6); the core must use it verbatim
    /// when present. Most providers have no reason to override this.
    fn fingerprint_override(&self, _request: &qdata_protocol::TaskRequest) -> Option<TaskFingerprint> {
        None
    }

    /// The fingerprint the core should actually coalesce and drain on:
    /// `fingerprint_override` if the provider supplies one, otherwise the
    /// canonical digest. Calling this never touches the provider's heavy
    /// data path — it's cheap enough to call from the gateway and the
    /// worker pool without breaking the per-job subprocess isolation
    /// boundary (see DESIGN.md Open Question #6).
    fn fingerprint(&self, request: &qdata_protocol::TaskRequest) -> TaskFingerprint {
        self.fingerprint_override(request)
            .unwrap_or_else(|| TaskFingerprint::compute(request))
    }
}
