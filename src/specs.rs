use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use serde_json::{Deserializer, Value, json};
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::urls;

const STREAM_MARKER: &str = "1:[";

/// Secondary lookup of the specification list for a product.
///
/// Never fails: every problem is logged and reported as `None`.
pub trait SpecificationSource {
    fn fetch_specifications(&self, page_url: &str, book_id: Option<&str>) -> Option<Vec<Value>>;
}

/// Calls the page's server action (`next-action` header) with the book id.
pub struct ActionSpecFetcher {
    client: Client,
    next_action_id: String,
    user_agent: String,
}

impl ActionSpecFetcher {
    pub fn new(client: Client, config: &ScraperConfig) -> Self {
        Self {
            client,
            next_action_id: config.next_action_id.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    fn post(&self, page_url: &str, book_id: &str) -> Result<String, ScrapeError> {
        let origin = urls::validate_product_url(page_url).map(|url| urls::origin_of(&url))?;
        let payload = json!([book_id]).to_string();

        let resp = self
            .client
            .post(page_url)
            .header(ACCEPT, "text/x-component")
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .header("next-action", &self.next_action_id)
            .header(ORIGIN, origin)
            .header(REFERER, page_url)
            .header(USER_AGENT, &self.user_agent)
            .body(payload)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: page_url.to_string(),
            });
        }
        Ok(resp.text()?)
    }
}

impl SpecificationSource for ActionSpecFetcher {
    fn fetch_specifications(&self, page_url: &str, book_id: Option<&str>) -> Option<Vec<Value>> {
        let Some(book_id) = book_id else {
            warn!("No book ID provided for fetching specifications");
            return None;
        };

        info!("Fetching specifications via API for book ID: {book_id}");
        let body = match self.post(page_url, book_id) {
            Ok(body) => body,
            Err(e) => {
                warn!("Error fetching specifications for book ID {book_id}: {e}");
                return None;
            }
        };

        let specs = parse_specifications(&body);
        match &specs {
            Some(specs) => info!("Parsed {} specification entries", specs.len()),
            None => {
                warn!("Could not parse specifications response");
                debug!("Specifications response body: {body}");
            }
        }
        specs
    }
}

/// Accepts either a bare `[meta, specs]` JSON array or an RSC-style stream
/// where the specification array follows a `1:` line prefix.
pub fn parse_specifications(body: &str) -> Option<Vec<Value>> {
    if let Ok(Value::Array(mut parts)) = serde_json::from_str::<Value>(body.trim()) {
        if parts.len() == 2 {
            if let Value::Array(specs) = parts.swap_remove(1) {
                return Some(specs);
            }
        }
        debug!("Response is JSON but not a [meta, specs] pair");
    }

    let start = find_stream_marker(body)?;
    // Start at the `[` of the marker.
    let array_text = &body[start + STREAM_MARKER.len() - 1..];
    match Deserializer::from_str(array_text).into_iter::<Value>().next() {
        Some(Ok(Value::Array(specs))) => Some(specs),
        Some(Ok(other)) => {
            debug!("Unexpected specifications shape: {other}");
            None
        }
        Some(Err(e)) => {
            debug!("Specifications JSON did not parse: {e}");
            None
        }
        None => None,
    }
}

/// Prefers a marker at the start of a line, then any occurrence.
fn find_stream_marker(body: &str) -> Option<usize> {
    if body.starts_with(STREAM_MARKER) {
        return Some(0);
    }
    body.find(&format!("\n{STREAM_MARKER}"))
        .map(|idx| idx + 1)
        .or_else(|| body.find(STREAM_MARKER))
}

#[cfg(test)]
mod tests {
    use std::io::{ErrorKind, Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use super::*;

    /// Serves one canned response on loopback and hands back the raw request.
    fn serve_once(listener: TcpListener, body: &'static str) -> thread::JoinHandle<(String, String)> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let head_end = loop {
                let n = stream.read(&mut chunk).unwrap();
                assert!(n > 0, "connection closed before headers ended");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                let n = stream.read(&mut chunk).unwrap();
                assert!(n > 0, "connection closed before body ended");
                buf.extend_from_slice(&chunk[..n]);
            }
            let request_body = String::from_utf8_lossy(&buf[head_end..head_end + content_length]).into_owned();

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/x-component\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            (head, request_body)
        })
    }

    fn fetcher() -> (ActionSpecFetcher, ScraperConfig) {
        let config = ScraperConfig::default();
        let client = crate::fetcher::build_client(&config).unwrap();
        (ActionSpecFetcher::new(client, &config), config)
    }

    #[test]
    fn absent_book_id_returns_none_without_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}/book/48659/masud-rana", listener.local_addr().unwrap());
        // Bounded so a stray request fails the assertion below instead of hanging.
        let client = Client::builder().timeout(Duration::from_secs(2)).build().unwrap();
        let fetcher = ActionSpecFetcher::new(client, &ScraperConfig::default());

        assert_eq!(fetcher.fetch_specifications(&url, None), None);

        // A connect attempt would sit in the accept backlog by now.
        let err = listener.accept().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }

    #[test]
    fn posts_server_action_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = serve_once(
            listener,
            "0:{\"a\":\"$@1\"}\n1:[{\"key\":\"Pages\",\"value\":\"256\"}]\n",
        );
        let url = format!("http://{addr}/book/48659/masud-rana");
        let (fetcher, config) = fetcher();

        let specs = fetcher.fetch_specifications(&url, Some("48659"));
        let (head, body) = server.join().unwrap();

        assert_eq!(specs, Some(vec![json!({"key": "Pages", "value": "256"})]));
        assert!(head.starts_with("post /book/48659/masud-rana http/1.1\r\n"), "{head}");
        for expected in [
            "accept: text/x-component".to_string(),
            "content-type: text/plain;charset=utf-8".to_string(),
            format!("next-action: {}", config.next_action_id),
            format!("origin: http://{addr}"),
            format!("referer: {url}"),
            format!("user-agent: {}", config.user_agent.to_lowercase()),
        ] {
            assert!(head.contains(&format!("\r\n{expected}\r\n")), "missing `{expected}` in {head}");
        }
        assert_eq!(body, r#"["48659"]"#);
    }

    #[test]
    fn error_status_is_none() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut chunk = [0u8; 4096];
            let _ = stream.read(&mut chunk).unwrap();
            stream
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 7\r\nconnection: close\r\n\r\n1:[1,2]")
                .unwrap();
        });
        let (fetcher, _) = fetcher();

        let specs = fetcher.fetch_specifications(&format!("http://{addr}/book/1/x"), Some("1"));
        server.join().unwrap();

        assert_eq!(specs, None);
    }

    #[test]
    fn transport_error_is_none() {
        let (fetcher, _) = fetcher();
        assert_eq!(
            fetcher.fetch_specifications("http://127.0.0.1:1/book/1/x", Some("1")),
            None
        );
    }

    #[test]
    fn parses_two_element_array() {
        let body = r#"[{"a":"$@1","b":"build"},[{"key":"Author","value":"Qazi Anwar Hussain"}]]"#;
        assert_eq!(
            parse_specifications(body),
            Some(vec![json!({"key": "Author", "value": "Qazi Anwar Hussain"})])
        );
    }

    #[test]
    fn parses_marker_stream() {
        let body = "0:{\"a\":\"$@1\",\"b\":\"x\"}\n1:[{\"key\":\"Pages\",\"value\":\"256\"},{\"key\":\"Edition\",\"value\":\"1st\"}]\n";
        let specs = parse_specifications(body).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0]["key"], "Pages");
    }

    #[test]
    fn marker_at_body_start() {
        assert_eq!(parse_specifications("1:[]"), Some(vec![]));
    }

    #[test]
    fn marker_without_line_break_still_found() {
        let body = r#"0:"x"1:[{"k":"v"}]"#;
        assert_eq!(parse_specifications(body), Some(vec![json!({"k": "v"})]));
    }

    #[test]
    fn trailing_stream_lines_are_ignored() {
        let body = "1:[1,2]\n2:{\"other\":true}\n";
        assert_eq!(parse_specifications(body), Some(vec![json!(1), json!(2)]));
    }

    #[test]
    fn unexpected_shapes_are_none() {
        for body in [
            "",
            "<html>blocked</html>",
            "0:{\"a\":1}\n",
            "1:[{\"unterminated\":",
            r#"[{"a":1},{"not":"a list"}]"#,
        ] {
            assert_eq!(parse_specifications(body), None, "{body}");
        }
    }

    #[test]
    fn array_of_other_length_falls_back_to_marker_scan() {
        assert_eq!(parse_specifications("[1,2,3]"), None);
    }
}
