use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::payroll::{PayrollBreakdown, PayrollRecord};
use crate::errors::ApplicationError;
use crate::payroll::service::PayrollComputationService;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Batch computation delegated to an HTTP endpoint.
///
/// The endpoint receives the ordered employee records as a JSON array and
/// answers with one `{id, grossPay, taxes, insurance, pf, esic, netPay}`
/// object per employee. The request is read-only, so transport failures and
/// 5xx answers are retried up to `max_retries` times.
#[derive(Clone, Debug)]
pub struct HttpComputationService {
    client: Client,
    endpoint: String,
    credential: Option<SecretString>,
    max_retries: u32,
}

impl HttpComputationService {
    pub fn new(
        endpoint: impl Into<String>,
        credential: Option<SecretString>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ApplicationError> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ApplicationError::Configuration(format!(
                "payroll service url `{endpoint}` must start with http:// or https://"
            )));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            ApplicationError::Configuration(format!("failed to build payroll http client: {error}"))
        })?;

        Ok(Self { client, endpoint, credential, max_retries })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, employees: &[Employee]) -> Result<Vec<PayrollRecord>, AttemptError> {
        let mut request = self.client.post(&self.endpoint).json(employees);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.expose_secret());
        }

        let response = request.send().await.map_err(|error| AttemptError::Retryable(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = format!("payroll service returned {status}");
            return Err(if is_retryable(status) {
                AttemptError::Retryable(message)
            } else {
                AttemptError::Fatal(message)
            });
        }

        let payload = response.json::<WirePayload>().await.map_err(|error| {
            AttemptError::Fatal(format!("malformed payroll service response: {error}"))
        })?;
        payload.into_records().map_err(AttemptError::Fatal)
    }
}

#[async_trait]
impl PayrollComputationService for HttpComputationService {
    async fn compute(&self, employees: &[Employee]) -> Result<Vec<PayrollRecord>, ApplicationError> {
        let mut attempt = 0;
        loop {
            match self.attempt(employees).await {
                Ok(records) => {
                    debug!(
                        event_name = "payroll.remote_computed",
                        requested = employees.len(),
                        returned = records.len(),
                        "remote payroll computation returned"
                    );
                    return Ok(records);
                }
                Err(AttemptError::Retryable(message)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "payroll.remote_retry",
                        attempt,
                        error = %message,
                        "retrying remote payroll computation"
                    );
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                }
                Err(AttemptError::Retryable(message)) | Err(AttemptError::Fatal(message)) => {
                    return Err(ApplicationError::ComputationServiceFailure(message));
                }
            }
        }
    }
}

enum AttemptError {
    Retryable(String),
    Fatal(String),
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WirePayload {
    Records(Vec<WireRecord>),
    Wrapped { payroll: Vec<WireRecord> },
}

impl WirePayload {
    fn into_records(self) -> Result<Vec<PayrollRecord>, String> {
        let records = match self {
            Self::Records(records) | Self::Wrapped { payroll: records } => records,
        };
        records.into_iter().map(WireRecord::into_record).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    id: WireId,
    gross_pay: Decimal,
    taxes: Decimal,
    insurance: Decimal,
    pf: Decimal,
    esic: Decimal,
    net_pay: Decimal,
}

impl WireRecord {
    fn into_record(self) -> Result<PayrollRecord, String> {
        let id = match self.id {
            WireId::Number(id) => EmployeeId(id),
            WireId::Text(text) => text
                .trim()
                .parse::<u64>()
                .map(EmployeeId)
                .map_err(|_| format!("payroll service returned non-numeric id `{text}`"))?,
        };
        Ok(PayrollRecord {
            id,
            breakdown: PayrollBreakdown {
                gross_pay: self.gross_pay,
                taxes: self.taxes,
                insurance: self.insurance,
                pf: self.pf,
                esic: self.esic,
                net_pay: self.net_pay,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::domain::employee::{Department, Employee, EmployeeId};
    use crate::errors::ApplicationError;
    use crate::payroll::service::PayrollComputationService;

    use super::{HttpComputationService, WirePayload};

    fn employee() -> Employee {
        Employee {
            id: EmployeeId(7),
            name: "Vikram Rathore".to_string(),
            department: Department::Operations,
            role: "Operations Manager".to_string(),
            salary: Decimal::from(1_500_000),
            hours_worked: Decimal::from(160),
            overtime_hours: Decimal::ZERO,
        }
    }

    /// Serves one canned HTTP response per accepted connection.
    async fn serve(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let mut buffer = vec![0_u8; 16 * 1024];
                let _ = socket.read(&mut buffer).await;
                let reply = format!(
                    "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{address}/payroll")
    }

    #[test]
    fn decodes_string_and_numeric_ids() {
        let payload: WirePayload = serde_json::from_str(
            r#"[
                {"id":"7","grossPay":125000,"taxes":25000,"insurance":1000,"pf":15000,"esic":0,"netPay":84000},
                {"id":8,"grossPay":10000.0,"taxes":2000,"insurance":1000,"pf":1200,"esic":75,"netPay":5725}
            ]"#,
        )
        .expect("payload");

        let records = payload.into_records().expect("records");
        assert_eq!(records[0].id, EmployeeId(7));
        assert_eq!(records[1].id, EmployeeId(8));
        assert_eq!(records[1].breakdown.esic, Decimal::from(75));
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let payload: WirePayload = serde_json::from_str(
            r#"{"payroll":[{"id":"emp-7","grossPay":1,"taxes":0,"insurance":0,"pf":0,"esic":0,"netPay":1}]}"#,
        )
        .expect("payload");

        let error = payload.into_records().expect_err("non-numeric id");
        assert!(error.contains("emp-7"));
    }

    #[test]
    fn rejects_non_http_urls() {
        let error = HttpComputationService::new("ftp://payroll", None, Duration::from_secs(1), 0)
            .expect_err("scheme is validated");
        assert!(matches!(error, ApplicationError::Configuration(_)));
    }

    #[tokio::test]
    async fn retries_server_errors_then_returns_records() {
        let endpoint = serve(vec![
            (503, r#"{"error":"warming up"}"#),
            (
                200,
                r#"[{"id":"7","grossPay":125000.00,"taxes":25000,"insurance":1000,"pf":15000,"esic":0,"netPay":84000}]"#,
            ),
        ])
        .await;
        let service =
            HttpComputationService::new(endpoint, None, Duration::from_secs(5), 2).expect("service");

        let records = service.compute(&[employee()]).await.expect("records");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].breakdown.net_pay, Decimal::from_str("84000").expect("decimal"));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let endpoint = serve(vec![(400, r#"{"error":"bad roster"}"#)]).await;
        let service =
            HttpComputationService::new(endpoint, None, Duration::from_secs(5), 3).expect("service");

        let error = service.compute(&[employee()]).await.expect_err("400 is fatal");

        assert!(matches!(
            error,
            ApplicationError::ComputationServiceFailure(ref message) if message.contains("400")
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_a_computation_failure() {
        let endpoint = serve(vec![(200, r#"{"unexpected":true}"#)]).await;
        let service =
            HttpComputationService::new(endpoint, None, Duration::from_secs(5), 0).expect("service");

        let error = service.compute(&[employee()]).await.expect_err("malformed payload");
        assert!(matches!(error, ApplicationError::ComputationServiceFailure(_)));
    }
}
