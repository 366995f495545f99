use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{parse_rows, EvidenceStore, FetchOutcome, Row, StoreError, TokenSource};
use crate::config::StoreConfig;
use crate::meeting::DateWindow;

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 30;
const SERVER_WAIT_MS: u64 = 10_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<QueryParameter>,
    timeout_ms: u64,
    max_results: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameter {
    name: &'static str,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: String,
}

impl QueryParameter {
    fn new(name: &'static str, kind: &'static str, value: String) -> Self {
        Self {
            name,
            parameter_type: ParameterType { kind },
            parameter_value: ParameterValue { value },
        }
    }
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Reads scored meetings from a BigQuery table over the REST API.
pub struct BigQueryStore {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    table_id: String,
    row_limit: u32,
    tokens: TokenSource,
}

impl BigQueryStore {
    pub fn new(client: reqwest::Client, config: &StoreConfig, tokens: TokenSource) -> Result<Self> {
        let table_id = config.table_id();
        if !is_valid_table_id(&table_id) {
            bail!("Invalid BigQuery table id '{}'", table_id);
        }

        let endpoint = config
            .api_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        info!("Initialized BigQuery store for table {}", table_id);

        Ok(Self {
            client,
            endpoint,
            project_id: config.project_id.clone(),
            table_id,
            row_limit: config.row_limit,
            tokens,
        })
    }

    fn request_body(&self, window: DateWindow) -> QueryRequest {
        QueryRequest {
            query: build_query(&self.table_id),
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: vec![
                QueryParameter::new("start_date", "DATE", window.start.to_string()),
                QueryParameter::new("end_date", "DATE", window.end.to_string()),
                QueryParameter::new("row_limit", "INT64", self.row_limit.to_string()),
            ],
            timeout_ms: SERVER_WAIT_MS,
            max_results: self.row_limit,
        }
    }

    async fn start_query(&self, token: &str, window: DateWindow) -> Result<QueryResponse, StoreError> {
        let url = format!("{}/projects/{}/queries", self.endpoint, self.project_id);
        debug!("Running BigQuery query for {}", window);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&self.request_body(window))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("BigQuery request failed: {}", e)))?;

        read_response(response).await
    }

    async fn query_results(
        &self,
        token: &str,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, StoreError> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.endpoint, self.project_id, job.job_id
        );

        let mut query: Vec<(&str, String)> = vec![
            ("timeoutMs", SERVER_WAIT_MS.to_string()),
            ("maxResults", self.row_limit.to_string()),
        ];
        if let Some(location) = &job.location {
            query.push(("location", location.clone()));
        }
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("BigQuery request failed: {}", e)))?;

        read_response(response).await
    }

    async fn fetch_rows(&self, window: DateWindow) -> Result<Vec<Row>, StoreError> {
        let token = self.tokens.token().await?;
        let mut page = self.start_query(&token, window).await?;

        let mut polls = 0;
        while !page.job_complete {
            polls += 1;
            if polls > MAX_POLLS {
                return Err(StoreError::Unavailable(format!(
                    "BigQuery query did not complete after {} polls",
                    MAX_POLLS
                )));
            }
            let job = job_of(&page)?;
            debug!("BigQuery job {} still running (poll {})", job.job_id, polls);
            tokio::time::sleep(POLL_INTERVAL).await;
            page = self.query_results(&token, &job, None).await?;
        }

        let columns = column_names(&page)?;
        let mut rows = to_rows(&columns, std::mem::take(&mut page.rows));

        while let Some(page_token) = page.page_token.take() {
            if rows.len() >= self.row_limit as usize {
                break;
            }
            let job = job_of(&page)?;
            page = self.query_results(&token, &job, Some(&page_token)).await?;
            rows.extend(to_rows(&columns, std::mem::take(&mut page.rows)));
        }

        Ok(rows)
    }
}

#[async_trait]
impl EvidenceStore for BigQueryStore {
    fn name(&self) -> &'static str {
        "BigQuery"
    }

    async fn fetch(&self, window: DateWindow) -> Result<FetchOutcome, StoreError> {
        let rows = self.fetch_rows(window).await?;
        let total = rows.len();

        let mut outcome = parse_rows(rows);
        outcome.records.retain(|record| window.contains(record.date));

        info!(
            "Fetched {} meetings from BigQuery ({} rows, {} skipped)",
            outcome.records.len(),
            total,
            outcome.skipped
        );
        Ok(outcome)
    }
}

async fn read_response(response: reqwest::Response) -> Result<QueryResponse, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::Unavailable(format!("failed to read BigQuery response: {}", e)))?;

    if !status.is_success() {
        error!("BigQuery request failed with status {}: {}", status, body);
        if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&body) {
            return Err(StoreError::Unavailable(format!(
                "BigQuery API error: {}",
                error_response.error.message
            )));
        }
        return Err(StoreError::Unavailable(format!(
            "BigQuery request failed with status {}",
            status
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| StoreError::Protocol(format!("invalid BigQuery response: {}", e)))
}

fn job_of(page: &QueryResponse) -> Result<JobReference, StoreError> {
    page.job_reference
        .clone()
        .ok_or_else(|| StoreError::Protocol("BigQuery response has no jobReference".to_string()))
}

fn column_names(page: &QueryResponse) -> Result<Vec<String>, StoreError> {
    page.schema
        .as_ref()
        .map(|schema| schema.fields.iter().map(|field| field.name.clone()).collect())
        .ok_or_else(|| StoreError::Protocol("BigQuery response has no schema".to_string()))
}

fn to_rows(columns: &[String], rows: Vec<TableRow>) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            columns
                .iter()
                .cloned()
                .zip(row.f.into_iter().map(|cell| cell.v))
                .collect()
        })
        .collect()
}

fn is_valid_table_id(table_id: &str) -> bool {
    let parts: Vec<&str> = table_id.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

/// Parameterized evidence query. JSON columns are serialized so every
/// scoring field arrives as JSON text regardless of the column type.
fn build_query(table_id: &str) -> String {
    format!(
        r#"SELECT
  CAST(meeting_id AS STRING) AS meeting_id,
  CAST(DATE(date) AS STRING) AS date,
  IFNULL(title, calendar_event_title) AS title,
  creator_name AS owner,
  desk,
  TO_JSON_STRING(client_info) AS client_info,
  TO_JSON_STRING(`now`) AS `now`,
  TO_JSON_STRING(`next`) AS `next`,
  TO_JSON_STRING(measure) AS measure,
  TO_JSON_STRING(blocker) AS blocker,
  TO_JSON_STRING(fit) AS fit,
  granola_link AS notes_url,
  qualified,
  total_qualified_sections AS score
FROM `{}`
WHERE DATE(date) BETWEEN @start_date AND @end_date
ORDER BY total_qualified_sections DESC, date DESC, meeting_id
LIMIT @row_limit"#,
        table_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn store() -> BigQueryStore {
        let config = StoreConfig {
            project_id: "talent-data".to_string(),
            dataset: "meetings".to_string(),
            table: "scored".to_string(),
            row_limit: 250,
            ..StoreConfig::default()
        };
        BigQueryStore::new(
            reqwest::Client::new(),
            &config,
            TokenSource::Static("t".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_request_uses_named_date_parameters() {
        let window = DateWindow::ending(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(), 7).unwrap();
        let body = serde_json::to_value(store().request_body(window)).unwrap();

        assert_eq!(body["useLegacySql"], json!(false));
        assert_eq!(body["parameterMode"], json!("NAMED"));
        assert_eq!(body["maxResults"], json!(250));
        assert_eq!(
            body["queryParameters"][0],
            json!({
                "name": "start_date",
                "parameterType": {"type": "DATE"},
                "parameterValue": {"value": "2025-03-07"}
            })
        );
        assert_eq!(body["queryParameters"][1]["parameterValue"]["value"], json!("2025-03-14"));

        let sql = body["query"].as_str().unwrap();
        assert!(sql.contains("FROM `talent-data.meetings.scored`"));
        assert!(sql.contains("BETWEEN @start_date AND @end_date"));
        assert!(!sql.contains("2025-03"));
    }

    #[test]
    fn test_rejects_suspicious_table_id() {
        let config = StoreConfig {
            project_id: "p".to_string(),
            dataset: "d".to_string(),
            table: "t` WHERE 1=1 --".to_string(),
            ..StoreConfig::default()
        };
        assert!(BigQueryStore::new(
            reqwest::Client::new(),
            &config,
            TokenSource::Static("t".to_string())
        )
        .is_err());
    }

    #[test]
    fn test_response_rows_map_to_named_columns() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": true,
            "jobReference": {"projectId": "p", "jobId": "job_1", "location": "EU"},
            "schema": {"fields": [
                {"name": "meeting_id", "type": "STRING"},
                {"name": "date", "type": "STRING"},
                {"name": "score", "type": "INTEGER"},
                {"name": "measure", "type": "STRING"}
            ]},
            "rows": [
                {"f": [{"v": "m-1"}, {"v": "2025-03-10"}, {"v": "4"}, {"v": "{\"qualified\":true,\"evidence\":\"£40k budget\"}"}]},
                {"f": [{"v": "m-2"}, {"v": "2025-03-11"}, {"v": null}, {"v": null}]}
            ],
            "totalRows": "2"
        }))
        .unwrap();

        let columns = column_names(&response).unwrap();
        let rows = to_rows(&columns, response.rows);
        let outcome = parse_rows(rows);

        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.records[0].score, 4);
        assert!(outcome.records[0].qualified);
        assert_eq!(outcome.records[0].measure.evidence_text(), Some("£40k budget"));
        assert_eq!(outcome.records[1].score, 0);
    }

    #[test]
    fn test_incomplete_job_response_parses() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": false,
            "jobReference": {"jobId": "job_2"}
        }))
        .unwrap();

        assert!(!response.job_complete);
        assert_eq!(job_of(&response).unwrap().job_id, "job_2");
        assert!(column_names(&response).is_err());
    }
}
