use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};

use crate::llm::{AgentReply, AgentRequest, LlmClient};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Remote analyst reached over HTTP.
///
/// Each turn is one POST of the [`AgentRequest`] (plus the configured model)
/// to `endpoint`; the body of a successful answer must decode as an
/// [`AgentReply`]. Only failures before a reply arrives are retried, so a
/// tool call is never requested twice for one turn.
#[derive(Clone, Debug)]
pub struct HttpAgentClient {
    client: Client,
    endpoint: String,
    model: String,
    credential: SecretString,
    max_retries: u32,
}

#[derive(Serialize)]
struct ModelScopedRequest<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a AgentRequest,
}

impl HttpAgentClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        credential: SecretString,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(anyhow!("agent base url `{endpoint}` must start with http:// or https://"));
        }

        let client =
            Client::builder().timeout(timeout).build().context("failed to build agent http client")?;

        Ok(Self { client, endpoint, model: model.into(), credential, max_retries })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn attempt(&self, request: &AgentRequest) -> Result<AgentReply, AttemptError> {
        let body = ModelScopedRequest { model: &self.model, request };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.credential.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| AttemptError::Retryable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("agent service returned {status}");
            return Err(if is_retryable(status) {
                AttemptError::Retryable(message)
            } else {
                AttemptError::Fatal(message)
            });
        }

        response
            .json::<AgentReply>()
            .await
            .map_err(|error| AttemptError::Fatal(format!("malformed agent reply: {error}")))
    }
}

#[async_trait]
impl LlmClient for HttpAgentClient {
    async fn respond(&self, request: &AgentRequest) -> Result<AgentReply> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Ok(reply) => {
                    debug!(
                        event_name = "analyst.agent_replied",
                        session_id = %request.session_id,
                        tool_call = matches!(reply, AgentReply::ToolCall { .. }),
                        "remote analyst replied"
                    );
                    return Ok(reply);
                }
                Err(AttemptError::Retryable(message)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "analyst.agent_retry",
                        session_id = %request.session_id,
                        attempt,
                        error = %message,
                        "retrying remote analyst turn"
                    );
                    tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                }
                Err(AttemptError::Retryable(message)) | Err(AttemptError::Fatal(message)) => {
                    return Err(anyhow!(message));
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

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::HttpAgentClient;
    use crate::llm::{AgentReply, AgentRequest, LlmClient, PayrollContext, TurnInput};
    use crate::tools::{add_employee_declaration, ToolCall};

    /// Serves one canned HTTP response per accepted connection and hands back the raw requests.
    async fn canned_server(
        responses: Vec<(u16, String)>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.expect("accept");
                requests.push(read_request(&mut socket).await);
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.expect("write");
                socket.shutdown().await.ok();
            }
            requests
        });
        (format!("http://{address}/v1/analyst"), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await.expect("read");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&buffer);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buffer.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn client(endpoint: &str, max_retries: u32) -> HttpAgentClient {
        HttpAgentClient::new(
            endpoint,
            "payroll-analyst",
            SecretString::from("agent-token".to_string()),
            Duration::from_secs(5),
            max_retries,
        )
        .expect("client")
    }

    fn request() -> AgentRequest {
        AgentRequest {
            session_id: "session-1".to_string(),
            system_instruction: "be brief".to_string(),
            tools: vec![add_employee_declaration()],
            context: PayrollContext::default(),
            transcript: Vec::new(),
            input: TurnInput::Text { text: "add Asha".to_string() },
        }
    }

    #[tokio::test]
    async fn posts_request_with_model_and_bearer_credential() {
        let body = json!({"kind": "text", "text": "Payroll looks healthy."}).to_string();
        let (endpoint, server) = canned_server(vec![(200, body)]).await;

        let reply = client(&endpoint, 0).respond(&request()).await.expect("reply");
        assert_eq!(reply, AgentReply::text("Payroll looks healthy."));

        let requests = server.await.expect("server");
        let raw = &requests[0];
        assert!(raw.starts_with("POST /v1/analyst"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer agent-token"));
        assert!(raw.contains("\"model\":\"payroll-analyst\""));
        assert!(raw.contains("\"sessionId\":\"session-1\""));
    }

    #[tokio::test]
    async fn retries_server_errors_before_a_reply() {
        let tool = json!({
            "kind": "tool_call",
            "call": {"name": "add_employee", "args": {"name": "Asha Rao"}}
        })
        .to_string();
        let (endpoint, server) =
            canned_server(vec![(502, "{}".to_string()), (200, tool)]).await;

        let reply = client(&endpoint, 2).respond(&request()).await.expect("reply");
        assert_eq!(
            reply,
            AgentReply::ToolCall { call: ToolCall::new("add_employee", json!({"name": "Asha Rao"})) }
        );
        assert_eq!(server.await.expect("server").len(), 2);
    }

    #[tokio::test]
    async fn client_errors_and_malformed_replies_fail_without_retry() {
        let (endpoint, server) = canned_server(vec![(401, "{}".to_string())]).await;
        let error = client(&endpoint, 3).respond(&request()).await.expect_err("unauthorized");
        assert!(error.to_string().contains("401"));
        assert_eq!(server.await.expect("server").len(), 1);

        let (endpoint, server) =
            canned_server(vec![(200, json!({"kind": "shrug"}).to_string())]).await;
        let error = client(&endpoint, 3).respond(&request()).await.expect_err("malformed");
        assert!(error.to_string().contains("malformed agent reply"));
        assert_eq!(server.await.expect("server").len(), 1);
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let error = HttpAgentClient::new(
            "ftp://agents.internal",
            "payroll-analyst",
            SecretString::from("token".to_string()),
            Duration::from_secs(1),
            0,
        )
        .expect_err("scheme must be http");
        assert!(error.to_string().contains("http://"));
    }
}
