//! Transport adapters for the Periskope API.
//!
//! Two interchangeable strategies: [`StructuredApi`] (method-oriented client at the configured
//! base URL) and [`RawApi`] (plain HTTP against any candidate base URL). The gateway decides
//! which to try and in what order.

mod call;
mod http;
mod raw;
mod structured;

pub use call::{ApiCall, Operation, Route};
pub use http::TransportError;
pub use raw::RawHttpClient;
pub use structured::PeriskopeClient;

use async_trait::async_trait;
use serde_json::Value;

/// Higher-level client keyed by resource method.
#[async_trait]
pub trait StructuredApi: Send + Sync {
    async fn call(&self, call: &ApiCall) -> Result<Value, TransportError>;
}

/// Direct HTTP requests against an explicit base URL.
#[async_trait]
pub trait RawApi: Send + Sync {
    async fn request(&self, base_url: &str, call: &ApiCall) -> Result<Value, TransportError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted adapters for gateway and dispatcher tests.

    use super::*;
    use std::sync::Mutex;

    /// Label recorded for structured attempts; raw attempts record their base URL.
    pub const STRUCTURED: &str = "structured";

    /// Implements both adapter traits. Attempts whose label is in `ok` succeed with `payload`; the rest fail.
    pub struct ScriptedApi {
        ok: Vec<String>,
        payload: Value,
        log: Mutex<Vec<(String, ApiCall)>>,
    }

    impl ScriptedApi {
        pub fn new(ok: &[&str], payload: Value) -> Self {
            Self {
                ok: ok.iter().map(|s| s.to_string()).collect(),
                payload,
                log: Mutex::new(Vec::new()),
            }
        }

        /// Structured adapter succeeds on the first try.
        pub fn succeeding(payload: Value) -> Self {
            Self::new(&[STRUCTURED], payload)
        }

        pub fn attempts(&self) -> Vec<String> {
            self.log.lock().unwrap().iter().map(|(l, _)| l.clone()).collect()
        }

        pub fn calls(&self) -> Vec<ApiCall> {
            self.log.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
        }

        fn attempt(&self, label: &str, call: &ApiCall) -> Result<Value, TransportError> {
            self.log
                .lock()
                .unwrap()
                .push((label.to_string(), call.clone()));
            if self.ok.iter().any(|l| l == label) {
                Ok(self.payload.clone())
            } else {
                Err(TransportError::Status {
                    status: 503,
                    body: format!("{} unavailable", label),
                })
            }
        }
    }

    #[async_trait]
    impl StructuredApi for ScriptedApi {
        async fn call(&self, call: &ApiCall) -> Result<Value, TransportError> {
            self.attempt(STRUCTURED, call)
        }
    }

    #[async_trait]
    impl RawApi for ScriptedApi {
        async fn request(&self, base_url: &str, call: &ApiCall) -> Result<Value, TransportError> {
            self.attempt(base_url, call)
        }
    }
}
