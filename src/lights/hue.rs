//! Philips Hue bridge client (local REST API v1).
//!
//! Toggling a light is a read-then-write: `GET /api/<user>/lights/<id>` for
//! the current `state.on`, then `PUT /api/<user>/lights/<id>/state` with the
//! opposite. The bridge reports failures in-band as
//! `[{"error": {"type": N, "address": "...", "description": "..."}}]`,
//! usually with HTTP 200.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{LightControl, LightTarget, ToggleError, ToggleFuture};

/// Per-request timeout. The bridge is on the LAN; anything slower is down.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HueBridge {
    client: reqwest::Client,
    /// `http://<address>`
    host: String,
    /// `http://<address>/api/<username>`
    api_base: String,
}

impl HueBridge {
    pub fn new(address: &str, username: &str) -> Result<Self, ToggleError> {
        let host = normalize_host(address)?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| ToggleError::Network(e.to_string()))?;

        Ok(Self {
            api_base: format!("{}/api/{}", host, username),
            host,
            client,
        })
    }

    fn light_url(&self, id: u32) -> String {
        format!("{}/lights/{}", self.api_base, id)
    }

    /// Flip one light. Returns the new on/off state.
    async fn toggle_light(&self, id: u32) -> Result<bool, ToggleError> {
        let current = self.get_json(&self.light_url(id)).await?;
        let on = parse_light_on(id, &current)?;

        let url = format!("{}/state", self.light_url(id));
        let response = self
            .client
            .put(&url)
            .json(&json!({ "on": !on }))
            .send()
            .await
            .map_err(|e| ToggleError::Network(e.to_string()))?;
        let body = read_json(response).await?;
        check_put_response(id, &body)?;

        debug!(light = id, on = !on, "Light toggled");
        Ok(!on)
    }

    async fn get_json(&self, url: &str) -> Result<Value, ToggleError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToggleError::Network(e.to_string()))?;
        read_json(response).await
    }
}

impl LightControl for HueBridge {
    fn toggle<'a>(&'a self, target: &'a LightTarget) -> ToggleFuture<'a> {
        Box::pin(async move {
            // Every light gets its chance; the first failure is reported.
            let mut first_err = None;
            for &id in target.ids() {
                if let Err(e) = self.toggle_light(id).await {
                    warn!(light = id, "Toggle failed: {}", e);
                    first_err.get_or_insert(e);
                }
            }
            match first_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    fn name(&self) -> String {
        format!("Hue bridge ({})", self.host)
    }
}

/// `192.168.1.2` -> `http://192.168.1.2`; explicit schemes are kept.
/// The bridge's local API is plain HTTP; the client is built without TLS.
fn normalize_host(address: &str) -> Result<String, ToggleError> {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") {
        Ok(trimmed.to_string())
    } else if trimmed.contains("://") {
        Err(ToggleError::InvalidAddress(trimmed.to_string()))
    } else {
        Ok(format!("http://{}", trimmed))
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ToggleError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ToggleError::Status(status.as_u16()));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ToggleError::Malformed(e.to_string()))
}

/// First in-band error description in a bridge response, if any.
fn bridge_error(body: &Value) -> Option<String> {
    body.as_array()?.iter().find_map(|item| {
        let err = item.get("error")?;
        Some(
            err.get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        )
    })
}

fn parse_light_on(id: u32, body: &Value) -> Result<bool, ToggleError> {
    if let Some(description) = bridge_error(body) {
        return Err(ToggleError::Bridge {
            light: id,
            description,
        });
    }
    body.pointer("/state/on")
        .and_then(Value::as_bool)
        .ok_or_else(|| ToggleError::Malformed(format!("light {} has no state.on", id)))
}

fn check_put_response(id: u32, body: &Value) -> Result<(), ToggleError> {
    if let Some(description) = bridge_error(body) {
        return Err(ToggleError::Bridge {
            light: id,
            description,
        });
    }
    if body.as_array().is_some() {
        Ok(())
    } else {
        Err(ToggleError::Malformed(format!(
            "light {} state update returned {}",
            id, body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("10.0.0.2").unwrap(), "http://10.0.0.2");
        assert_eq!(
            normalize_host(" http://bridge.local/ ").unwrap(),
            "http://bridge.local"
        );
    }

    #[test]
    fn test_https_address_is_rejected_up_front() {
        assert_eq!(
            normalize_host("https://hue:8443"),
            Err(ToggleError::InvalidAddress("https://hue:8443".into()))
        );
        assert!(matches!(
            HueBridge::new("https://10.0.0.2", "abc"),
            Err(ToggleError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_urls() {
        let bridge = HueBridge::new("10.0.0.2", "abc").unwrap();
        assert_eq!(bridge.light_url(4), "http://10.0.0.2/api/abc/lights/4");
        assert_eq!(bridge.name(), "Hue bridge (http://10.0.0.2)");
    }

    #[test]
    fn test_parse_light_on() {
        let body = json!({ "state": { "on": true, "bri": 254 }, "name": "Desk" });
        assert_eq!(parse_light_on(1, &body), Ok(true));

        let off = json!({ "state": { "on": false } });
        assert_eq!(parse_light_on(1, &off), Ok(false));

        let missing = json!({ "name": "Desk" });
        assert!(matches!(parse_light_on(1, &missing), Err(ToggleError::Malformed(_))));
    }

    #[test]
    fn test_parse_light_on_bridge_error() {
        let body = json!([{ "error": {
            "type": 1, "address": "/lights/1", "description": "unauthorized user"
        }}]);
        assert_eq!(
            parse_light_on(1, &body),
            Err(ToggleError::Bridge {
                light: 1,
                description: "unauthorized user".into()
            })
        );
    }

    #[test]
    fn test_check_put_response() {
        let ok = json!([{ "success": { "/lights/2/state/on": false } }]);
        assert_eq!(check_put_response(2, &ok), Ok(()));

        let err = json!([
            { "success": { "/lights/2/state/on": false } },
            { "error": { "type": 201, "description": "parameter, on, is not modifiable" } }
        ]);
        assert!(matches!(check_put_response(2, &err), Err(ToggleError::Bridge { light: 2, .. })));

        assert!(matches!(
            check_put_response(2, &json!({ "weird": true })),
            Err(ToggleError::Malformed(_))
        ));
    }

    /// One-request-per-connection HTTP stub. Lights listed in `on` start on;
    /// every request line and body is recorded.
    async fn fake_bridge(on: Vec<u32>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);

        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                // Read headers, then the body by Content-Length.
                let header_end = loop {
                    let n = sock.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break None;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break Some(pos + 4);
                    }
                };
                let Some(header_end) = header_end else { continue };
                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        if k.eq_ignore_ascii_case("content-length") {
                            v.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                while buf.len() < header_end + content_length {
                    let n = sock.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request_line = head.lines().next().unwrap_or_default().to_string();
                let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
                seen.lock().unwrap().push(format!("{} {}", request_line, body).trim().to_string());

                let path = request_line.split_whitespace().nth(1).unwrap_or_default();
                let id: u32 = path
                    .split('/')
                    .nth(4)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                let response_body = if request_line.starts_with("GET") {
                    if id == 99 {
                        json!([{ "error": { "type": 3, "description": "resource, /lights/99, not available" } }])
                    } else {
                        json!({ "state": { "on": on.contains(&id) } })
                    }
                } else {
                    json!([{ "success": { "on": true } }])
                }
                .to_string();

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response_body.len(),
                    response_body
                );
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });

        (addr.to_string(), log)
    }

    #[tokio::test]
    async fn test_toggle_flips_each_light() {
        let (addr, log) = fake_bridge(vec![1]).await;
        let bridge = HueBridge::new(&addr, "user").unwrap();

        bridge.toggle(&LightTarget::new(vec![1, 2])).await.unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0], "GET /api/user/lights/1 HTTP/1.1");
        assert!(log[1].starts_with("PUT /api/user/lights/1/state HTTP/1.1"));
        assert!(log[1].ends_with(r#"{"on":false}"#));
        assert_eq!(log[2], "GET /api/user/lights/2 HTTP/1.1");
        assert!(log[3].ends_with(r#"{"on":true}"#));
    }

    #[tokio::test]
    async fn test_toggle_reports_first_error_but_tries_all() {
        let (addr, log) = fake_bridge(vec![]).await;
        let bridge = HueBridge::new(&addr, "user").unwrap();

        let result = bridge.toggle(&LightTarget::new(vec![99, 5])).await;
        assert!(matches!(result, Err(ToggleError::Bridge { light: 99, .. })));

        let log = log.lock().unwrap().clone();
        assert!(log.iter().any(|l| l.starts_with("PUT /api/user/lights/5/state")));
    }

    #[tokio::test]
    async fn test_unreachable_bridge_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let bridge = HueBridge::new(&addr.to_string(), "user").unwrap();
        let result = bridge.toggle(&LightTarget::new(vec![1])).await;
        assert!(matches!(result, Err(ToggleError::Network(_))));
    }
}
