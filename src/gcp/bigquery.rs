//! BigQuery table writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::http_client::HttpClient;
use super::GcpError;
use crate::extract::{CanonicalRecord, TableSchema};

const SERVICE: &str = "BigQuery";

/// Destination for extracted rows.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create the destination table from `schema` if it does not exist.
    async fn ensure_table(&self, schema: &TableSchema) -> Result<(), GcpError>;

    /// Append one row. The record must already be sanitized.
    async fn append_row(&self, record: &CanonicalRecord) -> Result<(), GcpError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest {
    kind: &'static str,
    rows: Vec<InsertRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertRow {
    insert_id: String,
    json: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<RowErrors>,
}

#[derive(Debug, Deserialize)]
struct RowErrors {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

impl InsertAllResponse {
    fn rejection(&self) -> Option<String> {
        if self.insert_errors.is_empty() {
            return None;
        }
        let details: Vec<String> = self
            .insert_errors
            .iter()
            .flat_map(|row| {
                row.errors
                    .iter()
                    .map(move |e| format!("row {}: {} ({})", row.index, e.message, e.reason))
            })
            .collect();
        Some(details.join("; "))
    }
}

/// BigQuery REST client bound to one table.
pub struct BigQueryClient {
    http: HttpClient,
    endpoint: String,
    project_id: String,
    dataset: String,
    table: String,
}

impl BigQueryClient {
    pub fn new(
        http: HttpClient,
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            project_id: project_id.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    fn tables_url(&self) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables",
            self.endpoint, self.project_id, self.dataset
        )
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn ensure_table(&self, schema: &TableSchema) -> Result<(), GcpError> {
        let body = serde_json::json!({
            "tableReference": {
                "projectId": self.project_id,
                "datasetId": self.dataset,
                "tableId": self.table,
            },
            "schema": schema.to_bigquery_json(),
        });

        let response = self.http.post_json(&self.tables_url(), &body).await?;
        if response.is_conflict() {
            debug!("Table {}.{} already exists", self.dataset, self.table);
            return Ok(());
        }
        response.error_for_status(SERVICE).await?;
        info!("Created table {}.{}", self.dataset, self.table);
        Ok(())
    }

    async fn append_row(&self, record: &CanonicalRecord) -> Result<(), GcpError> {
        let request = InsertAllRequest {
            kind: "bigquery#tableDataInsertAllRequest",
            rows: vec![InsertRow {
                insert_id: uuid::Uuid::new_v4().to_string(),
                json: record.to_json_row(),
            }],
        };

        let url = format!("{}/{}/insertAll", self.tables_url(), self.table);
        let response: InsertAllResponse = self
            .http
            .post_json(&url, &request)
            .await?
            .error_for_status(SERVICE)
            .await?
            .json(SERVICE)
            .await?;

        if let Some(rejection) = response.rejection() {
            return Err(GcpError::InsertRejected(rejection));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CanonicalKey;

    #[test]
    fn test_insert_request_shape() {
        let mut record = CanonicalRecord::new("invoice2.gif");
        record.set(CanonicalKey::Total, "42.00");
        let request = InsertAllRequest {
            kind: "bigquery#tableDataInsertAllRequest",
            rows: vec![InsertRow {
                insert_id: "id-1".to_string(),
                json: record.to_json_row(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["rows"][0]["insertId"], "id-1");
        assert_eq!(json["rows"][0]["json"]["total"], "42.00");
        assert_eq!(json["rows"][0]["json"]["input_file_name"], "invoice2.gif");
    }

    #[test]
    fn test_insert_response_without_errors() {
        let response: InsertAllResponse =
            serde_json::from_str(r#"{"kind": "bigquery#tableDataInsertAllResponse"}"#).unwrap();
        assert_eq!(response.rejection(), None);
    }

    #[test]
    fn test_insert_response_with_errors() {
        let response: InsertAllResponse = serde_json::from_str(
            r#"{"insertErrors": [{"index": 0, "errors": [
                {"reason": "invalid", "location": "vendor_id", "message": "no such field: vendor_id."}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(
            response.rejection().unwrap(),
            "row 0: no such field: vendor_id. (invalid)"
        );
    }
}
