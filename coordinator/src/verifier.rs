use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use url::Url;

use zkpool_lib::Task;

#[derive(thiserror::Error, Debug)]
pub enum VerifierError {
    #[error("verifier rpc failed: {0}")]
    Rpc(String),
    #[error("verifier returned a malformed response: {0}")]
    Response(String),
}

/// Stateless proof verification.
///
/// An `Err` means the verifier could not evaluate the proof; a clean
/// `Ok(false)` means the proof is definitively invalid. Callers must not
/// conflate the two.
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, task: &Task, proof: &[u8]) -> Result<bool, VerifierError>;
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    id: u64,
    proof: &'a [u8],
    final_pair: Option<&'a [u8]>,
}

#[derive(Deserialize)]
struct VerifyResponse {
    valid: bool,
}

/// Verifier process reached over HTTP.
#[derive(Debug, Clone)]
pub struct RpcVerifier {
    client: reqwest::Client,
    endpoint: Url,
}

impl RpcVerifier {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait::async_trait]
impl Verifier for RpcVerifier {
    async fn verify(&self, task: &Task, proof: &[u8]) -> Result<bool, VerifierError> {
        let request = VerifyRequest {
            id: task.id,
            proof,
            final_pair: task.final_pair.as_deref(),
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| VerifierError::Rpc(err.to_string()))?
            .error_for_status()
            .map_err(|err| VerifierError::Rpc(err.to_string()))?;

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|err| VerifierError::Response(err.to_string()))?;
        Ok(body.valid)
    }
}

/// Scripted verifier for tests.
pub struct MockVerifier {
    verdict: Mutex<Result<bool, String>>,
}

impl MockVerifier {
    pub fn valid() -> Self {
        Self {
            verdict: Mutex::new(Ok(true)),
        }
    }

    pub fn invalid() -> Self {
        Self {
            verdict: Mutex::new(Ok(false)),
        }
    }

    pub fn erroring(message: &str) -> Self {
        Self {
            verdict: Mutex::new(Err(message.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl Verifier for MockVerifier {
    async fn verify(&self, _task: &Task, _proof: &[u8]) -> Result<bool, VerifierError> {
        self.verdict
            .lock()
            .unwrap()
            .clone()
            .map_err(VerifierError::Rpc)
    }
}
