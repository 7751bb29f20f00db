use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::CfnEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CfnStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

impl From<bool> for CfnStatus {
    fn from(success: bool) -> Self {
        if success {
            CfnStatus::Success
        } else {
            CfnStatus::Failed
        }
    }
}

/// Status document CloudFormation expects on the pre-signed callback URL.
/// Field names must match the cfnresponse contract exactly.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseBody {
    #[serde(rename = "Status")]
    pub status: CfnStatus,
    #[serde(rename = "Reason")]
    pub reason: String,
    #[serde(rename = "PhysicalResourceId")]
    pub physical_resource_id: String,
    #[serde(rename = "StackId")]
    pub stack_id: String,
    #[serde(rename = "RequestId")]
    pub request_id: String,
    #[serde(rename = "LogicalResourceId")]
    pub logical_resource_id: String,
    #[serde(rename = "NoEcho")]
    pub no_echo: bool,
    #[serde(rename = "Data")]
    pub data: Map<String, Value>,
}

/// Prepare a worker's data map for the callback: drop the timestamp fields
/// the SDK returns on client/provider descriptions and attach the worker
/// message as `Reason` so stack operators can read it from the resource.
pub fn finalize_data(mut data: Map<String, Value>, message: &str) -> Map<String, Value> {
    data.remove("LastModifiedDate");
    data.remove("CreationDate");
    data.insert("Reason".to_string(), Value::String(message.to_string()));
    data
}

/// Send the status document to the event's callback URL.
///
/// This is the terminal step of every invocation and must never raise: a
/// failed PUT is logged and swallowed, leaving CloudFormation to time the
/// resource out, which is the intended failure signal.
pub async fn send_response(
    http: &reqwest::Client,
    event: &CfnEvent,
    log_stream: &str,
    status: CfnStatus,
    data: Map<String, Value>,
    physical_resource_id: Option<String>,
    no_echo: bool,
) {
    let body = ResponseBody {
        status,
        reason: format!("See the details in CloudWatch Log Stream: {}", log_stream),
        physical_resource_id: physical_resource_id.unwrap_or_else(|| log_stream.to_string()),
        stack_id: event.stack_id.clone(),
        request_id: event.request_id.clone(),
        logical_resource_id: event.logical_resource_id.clone(),
        no_echo,
        data,
    };

    let payload = match serde_json::to_string(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("failed to serialize response body: {}", e);
            return;
        }
    };

    info!("Response body: {}", payload);

    let result = http
        .put(&event.response_url)
        .header(CONTENT_TYPE, "")
        .header(CONTENT_LENGTH, payload.len())
        .body(payload)
        .send()
        .await;

    match result {
        Ok(response) => info!("Callback status: {}", response.status()),
        Err(e) => error!("send_response failed executing PUT: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finalize_data_strips_timestamps_and_injects_reason() {
        let mut data = Map::new();
        data.insert("ClientId".to_string(), json!("abc123"));
        data.insert("LastModifiedDate".to_string(), json!("2019-01-01"));
        data.insert("CreationDate".to_string(), json!("2019-01-01"));

        let data = finalize_data(data, "Updated user pool client");

        assert!(!data.contains_key("LastModifiedDate"));
        assert!(!data.contains_key("CreationDate"));
        assert_eq!(data["Reason"], "Updated user pool client");
        assert_eq!(data["ClientId"], "abc123");
    }

    #[test]
    fn test_finalize_data_injects_reason_on_empty_map() {
        let data = finalize_data(Map::new(), "Timed-out!");
        assert_eq!(data.len(), 1);
        assert_eq!(data["Reason"], "Timed-out!");
    }

    #[test]
    fn test_response_body_field_names() {
        let body = ResponseBody {
            status: CfnStatus::Success,
            reason: "See the details in CloudWatch Log Stream: stream-1".to_string(),
            physical_resource_id: "stream-1".to_string(),
            stack_id: "stack-1".to_string(),
            request_id: "req-1".to_string(),
            logical_resource_id: "Domain".to_string(),
            no_echo: false,
            data: Map::new(),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["Status"], "SUCCESS");
        assert_eq!(value["PhysicalResourceId"], "stream-1");
        assert_eq!(value["StackId"], "stack-1");
        assert_eq!(value["RequestId"], "req-1");
        assert_eq!(value["LogicalResourceId"], "Domain");
        assert_eq!(value["NoEcho"], false);
        assert!(value["Data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_failed_status_serializes_as_failed() {
        assert_eq!(serde_json::to_value(CfnStatus::Failed).unwrap(), "FAILED");
        assert_eq!(CfnStatus::from(false), CfnStatus::Failed);
        assert_eq!(CfnStatus::from(true), CfnStatus::Success);
    }

    fn callback_event(response_url: String) -> CfnEvent {
        CfnEvent {
            request_type: "Delete".to_string(),
            response_url,
            stack_id: "stack-1".to_string(),
            request_id: "req-1".to_string(),
            logical_resource_id: "WebClient".to_string(),
            resource_properties: Value::Null,
        }
    }

    /// Accept one connection, capture the full request, answer 200.
    async fn capture_one_request(listener: tokio::net::TcpListener) -> Vec<u8> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&raw[..pos]).to_string();
                let declared = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= pos + 4 + declared {
                    break;
                }
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
            .await
            .unwrap();
        raw
    }

    #[tokio::test]
    async fn test_send_response_puts_with_empty_content_type_and_explicit_length() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(capture_one_request(listener));

        let event = callback_event(format!("http://{}/callback", addr));
        let data = finalize_data(Map::new(), "Deleted user pool client");
        send_response(
            &reqwest::Client::new(),
            &event,
            "stream-1",
            CfnStatus::Success,
            data,
            None,
            false,
        )
        .await;

        let raw = server.await.unwrap();
        let text = String::from_utf8_lossy(&raw);
        let (head, body) = text.split_once("\r\n\r\n").unwrap();

        assert!(head.lines().next().unwrap().starts_with("PUT /callback"));

        let mut content_type = None;
        let mut content_length = None;
        for line in head.lines().skip(1) {
            if let Some((name, value)) = line.split_once(':') {
                match name.to_ascii_lowercase().as_str() {
                    "content-type" => content_type = Some(value.trim().to_string()),
                    "content-length" => content_length = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        assert_eq!(content_type.as_deref(), Some(""));
        assert_eq!(
            content_length.unwrap().parse::<usize>().unwrap(),
            body.len()
        );

        let sent: Value = serde_json::from_str(body).unwrap();
        assert_eq!(sent["Status"], "SUCCESS");
        assert_eq!(sent["Data"]["Reason"], "Deleted user pool client");
        assert_eq!(sent["PhysicalResourceId"], "stream-1");
    }

    #[tokio::test]
    async fn test_send_response_swallows_transport_failures() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let event = callback_event(format!("http://{}/callback", addr));
        // Must return normally; a failed PUT is logged, never raised.
        send_response(
            &reqwest::Client::new(),
            &event,
            "stream-1",
            CfnStatus::Failed,
            Map::new(),
            None,
            false,
        )
        .await;
    }
}
