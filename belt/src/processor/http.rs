use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::bail;
use crate::belt_error;
use crate::error::{BeltResult, ErrorKind};
use crate::processor::ElementProcessor;
use crate::types::{Element, ProcessedRecord};

/// Request timeout applied to every transform call.
const TRANSFORM_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the request body for one batch.
pub type RequestPayloadFn<T> = Arc<dyn Fn(&[T]) -> BeltResult<Vec<u8>> + Send + Sync>;

/// Request payload builder serializing the whole batch as a JSON array.
pub fn json_request_payload<T: Serialize>() -> RequestPayloadFn<T> {
    Arc::new(|records| Ok(serde_json::to_vec(records)?))
}

/// Batch transformer backed by an HTTP endpoint.
///
/// Each batch becomes one `POST` with an `application/json` body built by the
/// payload function. The endpoint must answer `200` with a JSON array of
/// transformed records; each element's `Id` field becomes the record id.
/// Transport failures and non-OK statuses fail the whole batch.
pub struct HttpPostProcessor<T> {
    client: reqwest::Client,
    url: String,
    request_payload: RequestPayloadFn<T>,
}

impl<T> Clone for HttpPostProcessor<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            url: self.url.clone(),
            request_payload: Arc::clone(&self.request_payload),
        }
    }
}

impl<T> HttpPostProcessor<T> {
    pub fn new(host: &str, path: &str, request_payload: RequestPayloadFn<T>) -> BeltResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(TRANSFORM_TIMEOUT)
            .build()
            .map_err(|err| {
                belt_error!(
                    ErrorKind::TransformRequestFailed,
                    "Failed to build transform HTTP client",
                    err
                )
            })?;
        Ok(Self {
            client,
            url: format!("http://{host}/{path}"),
            request_payload,
        })
    }
}

impl<T: Send + Sync + 'static> ElementProcessor<T> for HttpPostProcessor<T> {
    async fn process_batch(&self, records: &[T]) -> BeltResult<Vec<ProcessedRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let payload = (self.request_payload)(records)?;
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!(
                ErrorKind::UnexpectedStatusCode,
                "Transform endpoint returned a non-OK status",
                status.as_u16()
            );
        }

        let transformed: Vec<serde_json::Value> = response.json().await.map_err(|err| {
            belt_error!(
                ErrorKind::TransformResponseInvalid,
                "Failed to decode transform response",
                err
            )
        })?;

        Ok(transformed
            .into_iter()
            .map(|record| {
                let id = record.element_id();
                ProcessedRecord::record(id, record)
            })
            .collect())
    }
}
