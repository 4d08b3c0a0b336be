use crate::error::SourceError;
use serde_json::Value;
use std::sync::OnceLock;
use tokio::time::{sleep, Duration};

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("falling back to default http client: {e}");
                reqwest::Client::new()
            })
    })
}

fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// POST `{endpoint}/v1/{path}` against a chain node.
pub async fn chain_post(
    endpoint: &str,
    path: &str,
    body: &Value,
    timeout_ms: u64,
    retries: u32,
) -> Result<Value, SourceError> {
    let url = join_url(endpoint, &format!("v1/{path}"));
    // Small, bounded retry on transient HTTP failures.
    // 500 is not transient here: nodes answer unknown keys with 500.
    let mut attempt = 0u32;
    loop {
        log::debug!("📡 POST {url}");
        let res = http_client()
            .post(&url)
            .json(body)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = res.status().as_u16();
        if res.status().is_success() {
            return res
                .json::<Value>()
                .await
                .map_err(|e| SourceError::Decode(e.to_string()));
        }
        if matches!(status, 429 | 502 | 503 | 504) && attempt < retries {
            attempt += 1;
            log::debug!("http {status} from {url}, retry {attempt}/{retries}");
            sleep(Duration::from_millis(150 * attempt as u64)).await;
            continue;
        }
        let text = res.text().await.unwrap_or_default();
        return Err(classify_remote_error(status, &text));
    }
}

/// GET `{endpoint}/{path_and_query}` against a history index.
pub async fn history_get(
    endpoint: &str,
    path_and_query: &str,
    timeout_ms: u64,
    retries: u32,
) -> Result<Value, SourceError> {
    let url = join_url(endpoint, path_and_query);
    log::debug!("📡 GET {url}");
    let rb = http_client()
        .get(&url)
        .timeout(Duration::from_millis(timeout_ms));
    let res = crate::net::send_with_backoff(rb, "history", retries)
        .await
        .map_err(|e| SourceError::Transport(e.to_string()))?;

    let status = res.status().as_u16();
    if res.status().is_success() {
        return res
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()));
    }
    let text = res.text().await.unwrap_or_default();
    Err(classify_remote_error(status, &text))
}

const NOT_FOUND_MARKERS: [&str; 4] = ["unknown", "not found", "not_found", "does not exist"];

/// Sorts a non-2xx answer into "entity absent" versus any other rejection.
///
/// Chain nodes answer `{"code":500,"message":..,"error":{"name":"unknown_key",
/// "what":..}}`; history indexes answer `{"statusCode":404,"error":"Not Found",
/// "message":..}`.
pub fn classify_remote_error(status: u16, body: &str) -> SourceError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error_name = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.get("name").or(Some(e)))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let what = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.get("what"))
        .and_then(Value::as_str);
    let message = what
        .or_else(|| {
            parsed
                .as_ref()
                .and_then(|v| v.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("http {status}")
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    let haystack = format!("{error_name} {message}").to_ascii_lowercase();
    if status == 404 || NOT_FOUND_MARKERS.iter().any(|m| haystack.contains(m)) {
        SourceError::NotFound(message)
    } else {
        SourceError::Rejected { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_unknown_key_is_not_found() {
        let body = r#"{"code":500,"message":"Internal Service Error","error":{"code":0,"name":"unknown_key","what":"unknown key","details":[]}}"#;
        assert_eq!(
            classify_remote_error(500, body),
            SourceError::NotFound("unknown key".into())
        );
    }

    #[test]
    fn history_404_is_not_found() {
        let body = r#"{"statusCode":404,"error":"Not Found","message":"transaction not found"}"#;
        assert_eq!(
            classify_remote_error(404, body),
            SourceError::NotFound("transaction not found".into())
        );
    }

    #[test]
    fn other_failures_are_rejections() {
        let body = r#"{"code":500,"message":"Internal Service Error","error":{"name":"tx_cpu_usage_exceeded","what":"Transaction exceeded the current CPU usage limit"}}"#;
        assert!(matches!(
            classify_remote_error(500, body),
            SourceError::Rejected { status: 500, .. }
        ));
        assert_eq!(
            classify_remote_error(503, ""),
            SourceError::Rejected {
                status: 503,
                message: "http 503".into()
            }
        );
    }

    #[test]
    fn joins_without_double_slash() {
        assert_eq!(
            join_url("https://wax.greymass.com/", "/v1/chain/get_info"),
            "https://wax.greymass.com/v1/chain/get_info"
        );
    }
}
