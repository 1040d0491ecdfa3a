//! `curl`-backed transport.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::Transport;
use crate::error::{TransportError, TransportResult};
use crate::wire::{WireBody, WireRequest, WireResponse, parse_output, reason_phrase};

/// Options for spawning `curl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurlOptions {
    /// Path or name of the `curl` executable.
    pub program: PathBuf,
    /// Total time allowed for one request.
    pub timeout: Duration,
    /// Time allowed for connection setup.
    pub connect_timeout: Duration,
    /// Redirects followed before giving up.
    pub max_redirects: u32,
    /// User agent sent when the request carries none.
    pub user_agent: Option<String>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("curl"),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: None,
        }
    }
}

impl CurlOptions {
    /// Locate `curl` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotFound`] if no executable is found.
    pub fn discover() -> TransportResult<Self> {
        let program =
            which::which("curl").map_err(|e| TransportError::NotFound(format!("curl: {e}")))?;
        Ok(Self {
            program,
            ..Self::default()
        })
    }
}

/// Runs one `curl` process per request.
///
/// `curl` follows redirects, dumps response headers into its output and
/// appends the final status code after the body, so the whole response is
/// recovered from stdout with [`parse_output`].
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    /// Create a transport with the given options.
    #[must_use]
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    #[must_use]
    pub fn options(&self) -> &CurlOptions {
        &self.options
    }

    fn build_command(&self, request: &WireRequest) -> Command {
        let mut cmd = Command::new(&self.options.program);
        cmd.arg("--silent")
            .arg("--show-error")
            .arg("--location")
            .arg("--max-redirs")
            .arg(self.options.max_redirects.to_string())
            .arg("--compressed")
            .arg("--max-time")
            .arg(self.options.timeout.as_secs().max(1).to_string())
            .arg("--connect-timeout")
            .arg(self.options.connect_timeout.as_secs().max(1).to_string())
            .arg("--dump-header")
            .arg("-")
            .arg("--write-out")
            .arg("\n%{http_code}")
            .arg("--request")
            .arg(&request.method);

        for (name, value) in &request.headers {
            cmd.arg("--header").arg(format!("{name}: {value}"));
        }

        let has_user_agent = request
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("user-agent"));
        if let Some(agent) = self.options.user_agent.as_deref().filter(|_| !has_user_agent) {
            cmd.arg("--user-agent").arg(agent);
        }

        if request.body.is_some() {
            cmd.arg("--data-binary").arg("@-").stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        cmd.arg("--").arg(&request.url);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }
}

impl Transport for CurlTransport {
    fn execute(&self, request: &WireRequest) -> TransportResult<WireResponse> {
        let started = Instant::now();
        let mut child = self
            .build_command(request)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: self.options.program.display().to_string(),
                source,
            })?;

        // curl may answer and exit before reading the whole body; the
        // response it printed still decides the outcome.
        if let (Some(body), Some(mut stdin)) = (&request.body, child.stdin.take())
            && let Err(e) = stdin.write_all(body.as_bytes())
        {
            debug!(url = %request.url, error = %e, "curl stopped reading the request body");
        }

        let output = child.wait_with_output()?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();

        if output.stdout.is_empty() {
            return Err(TransportError::NoOutput {
                exit_code: output.status.code(),
                stderr,
            });
        }

        let parsed = parse_output(&output.stdout);
        let body = if request.want_bytes {
            WireBody::Base64(STANDARD.encode(&parsed.body))
        } else {
            WireBody::Text(String::from_utf8_lossy(&parsed.body).into_owned())
        };

        let error = if !output.status.success() {
            warn!(
                url = %request.url,
                exit_code = ?output.status.code(),
                %stderr,
                "curl exited unsuccessfully"
            );
            Some(format!(
                "curl exited with status {}: {stderr}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_owned(), |c| c.to_string())
            ))
        } else if parsed.status >= 400 {
            let reason = reason_phrase(parsed.status);
            Some(format!("HTTP {} {reason}", parsed.status).trim_end().to_owned())
        } else {
            None
        };

        debug!(
            url = %request.url,
            method = %request.method,
            status = parsed.status,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "transport request completed"
        );

        Ok(WireResponse {
            status: parsed.status,
            headers: parsed.headers,
            body,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_for_get() {
        let transport = CurlTransport::new(CurlOptions {
            user_agent: Some("kura/0.1".into()),
            ..CurlOptions::default()
        });
        let request = WireRequest::get("https://example.org/a?b=c").with_header("Accept", "*/*");
        let args = args(&transport.build_command(&request));

        assert!(args.contains(&"--location".to_owned()));
        assert!(args.windows(2).any(|w| w == ["--dump-header", "-"]));
        assert!(args.windows(2).any(|w| w == ["--write-out", "\n%{http_code}"]));
        assert!(args.windows(2).any(|w| w == ["--request", "GET"]));
        assert!(args.windows(2).any(|w| w == ["--header", "Accept: */*"]));
        assert!(args.windows(2).any(|w| w == ["--user-agent", "kura/0.1"]));
        assert!(!args.contains(&"--data-binary".to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.org/a?b=c"));
    }

    #[test]
    fn test_command_for_post_with_own_user_agent() {
        let transport = CurlTransport::new(CurlOptions {
            user_agent: Some("kura/0.1".into()),
            ..CurlOptions::default()
        });
        let request = WireRequest::get("https://example.org/api")
            .with_method("POST")
            .with_header("User-Agent", "custom")
            .with_body("{}");
        let args = args(&transport.build_command(&request));

        assert!(args.windows(2).any(|w| w == ["--request", "POST"]));
        assert!(args.windows(2).any(|w| w == ["--data-binary", "@-"]));
        assert!(!args.contains(&"--user-agent".to_owned()));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let transport = CurlTransport::new(CurlOptions {
            program: PathBuf::from("/nonexistent/kura-curl"),
            ..CurlOptions::default()
        });
        let err = transport
            .execute(&WireRequest::get("https://example.org"))
            .unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }

    #[cfg(unix)]
    mod fake_curl {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes an executable shell script standing in for curl.
        fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fake-curl");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        fn transport(program: PathBuf) -> CurlTransport {
            CurlTransport::new(CurlOptions {
                program,
                ..CurlOptions::default()
            })
        }

        #[test]
        fn test_text_response() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                &dir,
                r"printf 'HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello\n200'",
            );
            let response = transport(program)
                .execute(&WireRequest::get("https://example.org"))
                .unwrap();

            assert_eq!(response.status, 200);
            assert_eq!(response.headers["content-type"], "text/plain");
            assert_eq!(response.body, WireBody::Text("hello".into()));
            assert_eq!(response.error, None);
        }

        #[test]
        fn test_bytes_response_is_base64() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(&dir, r"printf 'HTTP/1.1 200 OK\r\n\r\nabc\n200'");
            let response = transport(program)
                .execute(&WireRequest::get("https://example.org/i.png").with_bytes())
                .unwrap();
            assert_eq!(response.body, WireBody::Base64("YWJj".into()));
        }

        #[test]
        fn test_http_error_status_is_not_a_failure() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(&dir, r"printf 'HTTP/1.1 404 Not Found\r\n\r\nmissing\n404'");
            let response = transport(program)
                .execute(&WireRequest::get("https://example.org/x"))
                .unwrap();
            assert_eq!(response.status, 404);
            assert_eq!(response.error.as_deref(), Some("HTTP 404 Not Found"));
            assert_eq!(response.body.as_str(), "missing");
        }

        #[test]
        fn test_nonzero_exit_with_output_is_reported_inline() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                &dir,
                r"printf 'HTTP/1.1 200 OK\r\n\r\npartial\n200'; echo 'transfer closed' >&2; exit 18",
            );
            let response = transport(program)
                .execute(&WireRequest::get("https://example.org"))
                .unwrap();
            assert_eq!(response.status, 200);
            let error = response.error.unwrap();
            assert!(error.contains("18"));
            assert!(error.contains("transfer closed"));
        }

        #[test]
        fn test_no_output_is_transport_error() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(&dir, "echo 'Could not resolve host' >&2; exit 6");
            let err = transport(program)
                .execute(&WireRequest::get("https://nowhere.invalid"))
                .unwrap_err();
            match err {
                TransportError::NoOutput { exit_code, stderr } => {
                    assert_eq!(exit_code, Some(6));
                    assert_eq!(stderr, "Could not resolve host");
                },
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn test_body_is_fed_through_stdin() {
            let dir = tempfile::tempdir().unwrap();
            // Echo stdin back as the body.
            let program = script(
                &dir,
                r#"body=$(cat); printf 'HTTP/1.1 200 OK\r\n\r\n%s\n200' "$body""#,
            );
            let response = transport(program)
                .execute(
                    &WireRequest::get("https://example.org")
                        .with_method("POST")
                        .with_body("q=kura"),
                )
                .unwrap();
            assert_eq!(response.body.as_str(), "q=kura");
        }

        #[test]
        fn test_unread_body_keeps_response() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                &dir,
                r"printf 'HTTP/1.1 413 Payload Too Large\r\n\r\ntoo big\n413'; exit 0",
            );
            let body = "x".repeat(4_194_304);
            let response = transport(program)
                .execute(
                    &WireRequest::get("https://example.org/upload")
                        .with_method("POST")
                        .with_body(body),
                )
                .unwrap();

            assert_eq!(response.status, 413);
            assert_eq!(response.body.as_str(), "too big");
            assert!(response.error.unwrap().starts_with("HTTP 413"));
        }
    }
}
