//! Hosted tabular prediction endpoint (`:predict`).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

use crate::error::PredictionError;
use crate::models::{PredictionConfig, PredictionOutcome, PredictionRow, customer_id_for};

pub type Record = Map<String, Value>;

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: &'a [Record],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct PredictionClient {
    client: Client,
    endpoint_url: String,
    access_token: Option<String>,
}

impl PredictionClient {
    pub fn new(config: &PredictionConfig) -> Result<Self, PredictionError> {
        let project = required(&config.project, "PROJECT_ID")?;
        let region = required(&config.region, "REGION")?;
        let endpoint = required(&config.endpoint_id, "VERTEX_ENDPOINT_ID")?;

        let base = match &config.url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", region),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint_url: format!(
                "{}/v1/projects/{}/locations/{}/endpoints/{}:predict",
                base, project, region, endpoint
            ),
            access_token: config.access_token.clone(),
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Raw prediction values, one per instance as returned by the endpoint.
    pub async fn predict(&self, instances: &[Record]) -> Result<Vec<Value>, PredictionError> {
        let mut request = self
            .client
            .post(&self.endpoint_url)
            .json(&PredictRequest { instances });
        if let Some(ref token) = self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PredictionError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| PredictionError::InvalidResponse(e.to_string()))?;

        if parsed.predictions.len() != instances.len() {
            tracing::warn!(
                instances = instances.len(),
                predictions = parsed.predictions.len(),
                "Prediction count differs from instance count"
            );
        }

        Ok(parsed.predictions)
    }

    /// Predict and label each outcome with its record's customer id.
    pub async fn classify(&self, records: &[Record]) -> Result<Vec<PredictionRow>, PredictionError> {
        let predictions = self.predict(records).await?;
        Ok(label_predictions(records, &predictions))
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, PredictionError> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PredictionError::NotConfigured(format!("set {}", name)))
}

pub fn label_predictions(records: &[Record], predictions: &[Value]) -> Vec<PredictionRow> {
    predictions
        .iter()
        .enumerate()
        .map(|(i, prediction)| PredictionRow {
            customer_id: customer_id_for(records.get(i), i),
            outcome: PredictionOutcome::interpret(prediction),
        })
        .collect()
}

/// Load records from a local file; see [`records_from_bytes`] for the accepted formats.
pub fn load_records(path: &Path) -> Result<Vec<Record>, PredictionError> {
    let bytes = std::fs::read(path)?;
    records_from_bytes(&path.to_string_lossy(), &bytes)
}

/// Parse records by file name: `.csv` is read as CSV with a header row, anything else as a
/// JSON array of objects or JSON Lines.
pub fn records_from_bytes(name: &str, bytes: &[u8]) -> Result<Vec<Record>, PredictionError> {
    if name.to_lowercase().ends_with(".csv") {
        return parse_csv_records(bytes);
    }
    let content = std::str::from_utf8(bytes)
        .map_err(|e| PredictionError::InvalidRecords(format!("not UTF-8: {}", e)))?;
    parse_records(content)
}

/// CSV rows keyed by header. Integers and floats become JSON numbers, empty cells null.
pub fn parse_csv_records(bytes: &[u8]) -> Result<Vec<Record>, PredictionError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| PredictionError::InvalidRecords(e.to_string()))?
        .clone();

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.map_err(|e| PredictionError::InvalidRecords(format!("row {}: {}", i + 1, e)))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.to_string(), csv_cell_value(cell)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

fn csv_cell_value(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = cell.parse::<i64>() {
        return Value::from(n);
    }
    match cell.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::String(cell.to_string()),
    }
}

pub fn parse_records(content: &str) -> Result<Vec<Record>, PredictionError> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed)
            .map_err(|e| PredictionError::InvalidRecords(e.to_string()))?;
        return values
            .into_iter()
            .enumerate()
            .map(|(i, v)| into_record(v, i + 1))
            .collect();
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let value: Value = serde_json::from_str(line)
                .map_err(|e| PredictionError::InvalidRecords(format!("line {}: {}", i + 1, e)))?;
            into_record(value, i + 1)
        })
        .collect()
}

fn into_record(value: Value, position: usize) -> Result<Record, PredictionError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PredictionError::InvalidRecords(format!(
            "record {} is not an object: {}",
            position, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn config_for(server: &MockServer) -> PredictionConfig {
        PredictionConfig {
            url: Some(server.base_url()),
            project: Some("risk-project".into()),
            region: Some("us-central1".into()),
            endpoint_id: Some("42".into()),
            access_token: Some("vertex-token".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_endpoint_settings() {
        let err = PredictionClient::new(&PredictionConfig::default()).unwrap_err();
        assert!(matches!(err, PredictionError::NotConfigured(ref m) if m.contains("PROJECT_ID")));
    }

    #[test]
    fn test_default_regional_url() {
        let config = PredictionConfig {
            project: Some("p".into()),
            region: Some("europe-west4".into()),
            endpoint_id: Some("7".into()),
            ..Default::default()
        };
        let client = PredictionClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint_url(),
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/p/locations/europe-west4/endpoints/7:predict"
        );
    }

    #[tokio::test]
    async fn test_classify_labels_rows() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/projects/risk-project/locations/us-central1/endpoints/42:predict")
                    .header("authorization", "Bearer vertex-token")
                    .json_body(json!({
                        "instances": [
                            {"Customer ID": "C-1", "balance": "10"},
                            {"balance": "20"}
                        ]
                    }));
                then.status(200).json_body(json!({
                    "predictions": [
                        {"classes": ["LOW", "HIGH"], "scores": [0.2, 0.8]},
                        {"displayName": "LOW", "confidence": 0.51}
                    ]
                }));
            })
            .await;

        let records =
            parse_records(r#"[{"Customer ID": "C-1", "balance": "10"}, {"balance": "20"}]"#).unwrap();
        let client = PredictionClient::new(&config_for(&server)).unwrap();
        let rows = client.classify(&records).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].customer_id, "C-1");
        assert_eq!(
            rows[0].outcome,
            PredictionOutcome::Classified {
                label: "HIGH".into(),
                confidence: 0.8
            }
        );
        assert_eq!(rows[1].customer_id, "CustID_2_NotFound");
    }

    #[tokio::test]
    async fn test_endpoint_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(403).body("permission denied");
            })
            .await;

        let client = PredictionClient::new(&config_for(&server)).unwrap();
        let err = client.predict(&[Record::new()]).await.unwrap_err();
        assert!(matches!(err, PredictionError::ServerError(ref m) if m.contains("403")));
    }

    #[test]
    fn test_parse_json_lines() {
        let records = parse_records("{\"a\": 1}\n\n{\"a\": 2}\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["a"], json!(2));

        let err = parse_records("{\"a\": 1}\n[1]\n").unwrap_err();
        assert!(matches!(err, PredictionError::InvalidRecords(ref m) if m.contains("record 2")));
    }

    #[test]
    fn test_csv_records_keep_customer_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.CSV");
        std::fs::write(
            &path,
            "Customer ID, credit_score ,profit_margin,segment,notes\nC-100,712,0.12,SME,\nC-101,640,-0.5,Corporate,late\n",
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Customer ID"], json!("C-100"));
        assert_eq!(records[0]["credit_score"], json!(712));
        assert_eq!(records[0]["profit_margin"], json!(0.12));
        assert_eq!(records[0]["notes"], Value::Null);
        assert_eq!(records[1]["profit_margin"], json!(-0.5));
        assert_eq!(records[1]["segment"], json!("Corporate"));

        let rows = label_predictions(&records, &[json!({"displayName": "LOW", "confidence": 0.9})]);
        assert_eq!(rows[0].customer_id, "C-100");
    }

    #[test]
    fn test_csv_ragged_row_is_rejected() {
        let err = parse_csv_records(b"a,b\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, PredictionError::InvalidRecords(ref m) if m.contains("row 2")));
    }

    #[test]
    fn test_non_csv_names_parse_as_json() {
        let records = records_from_bytes("records.jsonl", b"{\"a\": 1}\n").unwrap();
        assert_eq!(records[0]["a"], json!(1));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_records("  \n").unwrap().is_empty());
    }
}
