//! Classification service interface
//!
//! The external AI service takes raw video bytes and either accepts the
//! disposal with a category/sub-type or rejects it with a reason code.
//! Transport failures are distinct from rejections: the engine degrades a
//! transport failure to the offline queue, while a rejection is terminal.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ClassifierConfig;
use crate::error::RejectReason;

/// Outcome of a classification call that reached the service.
#[derive(Debug, Clone)]
pub enum Classification {
    Accepted { category: String, sub_type: String },
    Rejected(RejectReason),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify decoded video bytes. `Err` means the service could not be
    /// reached or replied unintelligibly, not that the disposal was rejected.
    async fn classify(&self, video: &[u8]) -> Result<Classification>;
}

/// Wire reply from the classification service.
#[derive(Debug, Deserialize)]
struct ClassifierReply {
    success: bool,
    waste_category: Option<String>,
    waste_sub_type: Option<String>,
    reason_code: Option<String>,
}

/// HTTP client for the classification service, with a bounded request
/// timeout so a slow service degrades to offline instead of hanging the
/// submission path.
pub struct HttpClassifier {
    client: reqwest::Client,
    classify_url: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("building classifier HTTP client")?;
        Ok(Self {
            client,
            classify_url: config.classify_url(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, video: &[u8]) -> Result<Classification> {
        let reply: ClassifierReply = self
            .client
            .post(&self.classify_url)
            .header("Content-Type", "application/octet-stream")
            .body(video.to_vec())
            .send()
            .await
            .context("sending video to classifier")?
            .error_for_status()
            .context("classifier returned an error status")?
            .json()
            .await
            .context("decoding classifier reply")?;

        if reply.success {
            match (reply.waste_category, reply.waste_sub_type) {
                (Some(category), Some(sub_type)) => {
                    Ok(Classification::Accepted { category, sub_type })
                }
                _ => bail!("classifier accepted without category/sub-type"),
            }
        } else {
            let code = reply.reason_code.unwrap_or_default();
            Ok(Classification::Rejected(RejectReason::from_code(&code)))
        }
    }
}
