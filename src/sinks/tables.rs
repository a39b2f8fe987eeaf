//! Extracted-table upload and notification fan-out.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{ObjectStore, WebhookNotifier};
use crate::Result;
use crate::telemetry;
use crate::types::Table;

const CSV_CONTENT_TYPE: &str = "text/csv";

/// Object key for the `n`th table of a task.
pub fn table_key(project_id: i64, task_id: i64, n: usize) -> String {
    format!("{project_id}/{task_id}/table-{n}.csv")
}

/// Uploads tables as CSV, then announces each uploaded key.
#[derive(Clone)]
pub struct TableSink {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    webhook: Option<WebhookNotifier>,
}

impl TableSink {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            webhook: None,
        }
    }

    pub fn with_webhook(mut self, webhook: WebhookNotifier) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload every table and return the keys written. Stops at the first failure.
    pub async fn upload(
        &self,
        bucket: &str,
        project_id: i64,
        task_id: i64,
        tables: &[Table],
    ) -> Result<Vec<String>> {
        let mut keys = Vec::with_capacity(tables.len());
        for (n, table) in tables.iter().enumerate() {
            let key = table_key(project_id, task_id, n);
            let csv = table.to_csv().into_bytes();
            let size = csv.len();
            self.store.put(bucket, &key, csv, CSV_CONTENT_TYPE).await?;
            info!(bucket, key = %key, bytes = size, "uploaded extracted table");
            keys.push(key);
        }
        Ok(keys)
    }

    /// Upload `tables` and send one webhook per key in the background.
    ///
    /// `bucket` overrides the configured bucket, e.g. to keep tables next to
    /// their source document. Errors are logged, never returned.
    pub fn spawn(
        &self,
        bucket: Option<String>,
        project_id: i64,
        task_id: i64,
        tables: Vec<Table>,
    ) -> JoinHandle<()> {
        let sink = self.clone();
        let bucket = bucket.unwrap_or_else(|| self.bucket.clone());
        tokio::spawn(async move {
            let keys = match sink.upload(&bucket, project_id, task_id, &tables).await {
                Ok(keys) => {
                    telemetry::record_side_effect("table_upload", true);
                    keys
                }
                Err(e) => {
                    warn!(error = %e, project_id, task_id, "failed to upload extracted tables");
                    telemetry::record_side_effect("table_upload", false);
                    return;
                }
            };

            let Some(webhook) = &sink.webhook else {
                return;
            };
            for key in &keys {
                let result = webhook.notify_table(task_id, project_id, &bucket, key).await;
                if let Err(e) = &result {
                    warn!(error = %e, key = %key, "failed to deliver table webhook");
                }
                telemetry::record_side_effect("webhook", result.is_ok());
            }
        })
    }
}

impl std::fmt::Debug for TableSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSink")
            .field("bucket", &self.bucket)
            .field("webhook", &self.webhook)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_by_project_and_task() {
        assert_eq!(table_key(7, 42, 0), "7/42/table-0.csv");
        assert_eq!(table_key(7, 42, 3), "7/42/table-3.csv");
    }
}
