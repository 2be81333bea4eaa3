use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::import::commit::{BulkCommitter, CommitReceipt, CommitRequest};
use crate::{ClientError, ClientResult};

const BULK_PATH: &str = "transactions/bulk";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpCommitter {
    http: Client,
    endpoint: Url,
}

impl HttpCommitter {
    pub fn new(base_url: &str, api_token: Option<&str>) -> ClientResult<Self> {
        let endpoint = bulk_endpoint(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::invalid_argument(
                    "POCKETBOOK_API_TOKEN contains characters that cannot be sent in a header.",
                )
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| {
                ClientError::commit_failed(&format!("could not build HTTP client: {error}"), None)
            })?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl BulkCommitter for HttpCommitter {
    fn target(&self) -> String {
        self.endpoint.to_string()
    }

    fn commit(&mut self, request: &CommitRequest) -> ClientResult<CommitReceipt> {
        let endpoint = self.endpoint.clone();
        let response = self
            .http
            .post(endpoint.clone())
            .json(request)
            .send()
            .map_err(|error| {
                ClientError::commit_failed(&format!("POST {endpoint} failed: {error}"), None)
            })?;

        let status = response.status();
        let body = response.text().map_err(|error| {
            ClientError::commit_failed(
                &format!("could not read response from {endpoint}: {error}"),
                Some(status.as_u16()),
            )
        })?;
        debug!(status = status.as_u16(), bytes = body.len(), "bulk commit response");

        if !status.is_success() {
            let detail = error_detail(&body)
                .unwrap_or_else(|| format!("{endpoint} returned {status}"));
            return Err(ClientError::commit_failed(&detail, Some(status.as_u16())));
        }

        parse_receipt(&body).ok_or_else(|| {
            ClientError::commit_failed(
                &format!("{endpoint} returned a body without an `imported` count"),
                Some(status.as_u16()),
            )
        })
    }
}

fn bulk_endpoint(base_url: &str) -> ClientResult<Url> {
    let trimmed = base_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let base = Url::parse(&with_slash).map_err(|error| {
        ClientError::invalid_argument_with_recovery(
            &format!("Commit endpoint `{trimmed}` is not a valid URL: {error}"),
            vec!["Pass an absolute http(s) URL with --endpoint or POCKETBOOK_COMMIT_URL.".to_string()],
        )
    })?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(ClientError::invalid_argument_with_recovery(
            &format!("Commit endpoint `{trimmed}` must use http or https."),
            vec!["Pass an absolute http(s) URL with --endpoint or POCKETBOOK_COMMIT_URL.".to_string()],
        ));
    }

    base.join(BULK_PATH).map_err(|error| {
        ClientError::invalid_argument(&format!("Could not build bulk endpoint URL: {error}"))
    })
}

/// Accepts `{ "imported": n }` or the same object wrapped in `data`.
fn parse_receipt(body: &str) -> Option<CommitReceipt> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    let imported = value
        .get("imported")
        .or_else(|| value.get("data").and_then(|data| data.get("imported")))?
        .as_i64()?;
    Some(CommitReceipt { imported })
}

fn error_detail(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use serde_json::Value;

    use super::{HttpCommitter, bulk_endpoint, error_detail, parse_receipt};
    use crate::import::commit::{BulkCommitter, CommitRequest, CommitTransaction};
    use crate::import::normalize::TransactionKind;

    fn serve_once(status: &'static str, body: &'static str) -> Option<(String, JoinHandle<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let base_url = format!("http://{}/api", listener.local_addr().ok()?);
        let handle = thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return String::new();
            };
            let mut received = Vec::new();
            let mut chunk = [0_u8; 4096];
            while !request_complete(&received) {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(read) => received.extend_from_slice(&chunk[..read]),
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            String::from_utf8_lossy(&received).into_owned()
        });
        Some((base_url, handle))
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        received.len() >= header_end + 4 + content_length
    }

    fn one_row_request() -> CommitRequest {
        CommitRequest {
            transactions: vec![CommitTransaction {
                kind: TransactionKind::Expense,
                amount: 42.1,
                description: "Supermercado".to_string(),
                category: "Comida".to_string(),
                account_name: "Principal".to_string(),
                date: "2025-01-05T00:00:00.000Z".to_string(),
                tags: None,
                recurring: None,
            }],
        }
    }

    #[test]
    fn bulk_path_is_appended_to_base_url() {
        let with_prefix = bulk_endpoint("https://api.example.com/v1");
        assert!(matches!(
            with_prefix,
            Ok(ref url) if url.as_str() == "https://api.example.com/v1/transactions/bulk"
        ));

        let with_slash = bulk_endpoint("http://localhost:8080/");
        assert!(matches!(
            with_slash,
            Ok(ref url) if url.as_str() == "http://localhost:8080/transactions/bulk"
        ));
    }

    #[test]
    fn non_http_endpoints_are_rejected() {
        let result = bulk_endpoint("ftp://example.com");
        assert!(matches!(result, Err(ref error) if error.code == "invalid_argument"));
        assert!(bulk_endpoint("not a url").is_err());
    }

    #[test]
    fn receipts_read_imported_count() {
        assert_eq!(parse_receipt(r#"{"imported":4}"#).map(|receipt| receipt.imported), Some(4));
        assert_eq!(
            parse_receipt(r#"{"data":{"imported":2}}"#).map(|receipt| receipt.imported),
            Some(2)
        );
        assert!(parse_receipt(r#"{"ok":true}"#).is_none());
        assert!(parse_receipt("<html>").is_none());
    }

    #[test]
    fn error_payload_message_is_surfaced() {
        assert_eq!(
            error_detail(r#"{"message":"quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(error_detail(r#"{"error":"bad token"}"#).as_deref(), Some("bad token"));
        assert!(error_detail("Internal Server Error").is_none());
    }

    #[test]
    fn unreachable_service_is_a_commit_failure() {
        let committer = HttpCommitter::new("http://127.0.0.1:9", None);
        assert!(committer.is_ok());
        if let Ok(mut committer) = committer {
            let result = committer.commit(&CommitRequest {
                transactions: Vec::new(),
            });
            assert!(matches!(result, Err(ref error) if error.code == "commit_failed"));
        }
    }

    #[test]
    fn successful_post_sends_transactions_and_reads_imported() {
        let server = serve_once("200 OK", r#"{"imported":1}"#);
        assert!(server.is_some());
        let Some((base_url, handle)) = server else {
            return;
        };

        let committer = HttpCommitter::new(&base_url, Some("secret"));
        assert!(committer.is_ok());
        if let Ok(mut committer) = committer {
            let receipt = committer.commit(&one_row_request());
            assert!(matches!(receipt, Ok(ref receipt) if receipt.imported == 1));
        }

        let request = handle.join().unwrap_or_default();
        assert!(request.starts_with("POST /api/transactions/bulk HTTP/1.1"));
        assert!(
            request
                .to_ascii_lowercase()
                .contains("authorization: bearer secret")
        );
        let body = request.split_once("\r\n\r\n").map(|(_, body)| body);
        let payload = body.and_then(|body| serde_json::from_str::<Value>(body).ok());
        assert!(payload.is_some());
        if let Some(payload) = payload {
            assert_eq!(payload["transactions"][0]["type"], "expense");
            assert_eq!(payload["transactions"][0]["description"], "Supermercado");
            assert!(payload["transactions"][0].get("errors").is_none());
        }
    }

    #[test]
    fn error_status_carries_server_message_and_status() {
        let server = serve_once("422 Unprocessable Entity", r#"{"message":"account is closed"}"#);
        assert!(server.is_some());
        let Some((base_url, handle)) = server else {
            return;
        };

        let committer = HttpCommitter::new(&base_url, None);
        assert!(committer.is_ok());
        if let Ok(mut committer) = committer {
            let result = committer.commit(&one_row_request());
            assert!(result.is_err());
            if let Err(error) = result {
                assert_eq!(error.code, "commit_failed");
                assert!(error.message.contains("account is closed"));
                let status = error.data.as_ref().and_then(|data| data.get("status"));
                assert_eq!(status.and_then(Value::as_u64), Some(422));
            }
        }
        let _ = handle.join();
    }
}
