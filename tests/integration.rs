//! Integration tests for lambda-runtime-client.
//!
//! These tests run the full poll/invoke/respond loop against a fake runtime
//! API on a local TCP port. The fake hands out a fixed queue of invocations
//! and answers 500 once it is empty, which ends the loop with
//! `ExitReason::InvocationFailed`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::{stream, StreamExt};
use lambda_runtime_client::control::TRACE_ID_ENV;
use lambda_runtime_client::error::{
    ConfigError, InitError, HANDLER_NOT_FOUND, HANDLER_PANIC, MALFORMED_HANDLER,
};
use lambda_runtime_client::handler::FunctionMetadata;
use lambda_runtime_client::{
    Error, ExitReason, HandlerError, LambdaContext, RuntimeBuilder, RuntimeConfig,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Runtimes export the trace id to the process environment, so tests that
/// run the loop must not overlap.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// One queued invocation.
struct Event {
    request_id: &'static str,
    payload: &'static str,
    trace_id: Option<&'static str>,
}

fn event(request_id: &'static str, payload: &'static str) -> Event {
    Event {
        request_id,
        payload,
        trace_id: None,
    }
}

/// A request as seen by the fake runtime API.
#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

struct FakeRuntimeApi {
    addr: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeRuntimeApi {
    async fn start(events: Vec<Event>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        let mut queue: VecDeque<Event> = events.into();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };

                let reply = if request.method == "GET" && request.path.ends_with("/invocation/next") {
                    match queue.pop_front() {
                        Some(event) => invocation_reply(&event),
                        None => http_reply("500 Internal Server Error", &[], "no more events"),
                    }
                } else {
                    http_reply("202 Accepted", &[], "")
                };

                log.lock().unwrap().push(request);
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    fn config(&self, handler: &str) -> RuntimeConfig {
        RuntimeConfig::new(self.addr.clone(), handler)
    }

    /// Wait until at least `n` requests have been recorded.
    ///
    /// The response POST is fire-and-forget: the loop may return before the
    /// server task has read it.
    async fn wait_for(&self, n: usize) {
        let recorded = async {
            while self.requests.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        if tokio::time::timeout(Duration::from_secs(5), recorded).await.is_err() {
            panic!("expected {} requests, got {:?}", n, self.summary());
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Request lines as `METHOD path`, in arrival order.
    fn summary(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }

    fn find(&self, path_suffix: &str) -> Recorded {
        self.requests()
            .into_iter()
            .find(|r| r.path.ends_with(path_suffix))
            .unwrap_or_else(|| panic!("no request to {}", path_suffix))
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let mut body = buf[head_end..].to_vec();
    let chunked = headers
        .iter()
        .any(|(k, v)| k == "transfer-encoding" && v.eq_ignore_ascii_case("chunked"));

    if chunked {
        // The response writer closes its side after the last byte.
        stream.read_to_end(&mut body).await.ok()?;
    } else {
        let content_length: usize = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        while body.len() < content_length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    Some(Recorded {
        method,
        path,
        headers,
        body,
    })
}

fn http_reply(status: &str, headers: &[(&str, String)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for (k, v) in headers {
        out.push_str(&format!("{}: {}\r\n", k, v));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ));
    out
}

fn invocation_reply(event: &Event) -> String {
    let deadline = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis()
        + 60_000;

    let mut headers = vec![
        ("Lambda-Runtime-Aws-Request-Id", event.request_id.to_string()),
        ("Lambda-Runtime-Deadline-Ms", deadline.to_string()),
        (
            "Lambda-Runtime-Invoked-Function-Arn",
            "arn:aws:lambda:us-east-1:123456789012:function:demo".to_string(),
        ),
    ];
    if let Some(trace_id) = event.trace_id {
        headers.push(("Lambda-Runtime-Trace-Id", trace_id.to_string()));
    }

    http_reply("200 OK", &headers, event.payload)
}

fn builder() -> RuntimeBuilder {
    RuntimeBuilder::new().function_metadata(FunctionMetadata {
        function_name: "demo".into(),
        ..Default::default()
    })
}

#[derive(serde::Deserialize)]
struct Greeting {
    name: String,
}

#[tokio::test]
async fn test_buffered_response() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", r#"{"name":"world"}"#)]).await;

    let runtime = builder()
        .handle("app.greet", |input: Greeting, ctx: LambdaContext| async move {
            Ok::<_, std::io::Error>(serde_json::json!({
                "greeting": format!("hello {}", input.name),
                "function": ctx.function().function_name,
            }))
        })
        .start(api.config("app.greet"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::InvocationFailed);

    assert_eq!(
        api.summary(),
        vec![
            "GET /2018-06-01/runtime/invocation/next",
            "POST /2018-06-01/runtime/invocation/req-1/response",
            "GET /2018-06-01/runtime/invocation/next",
        ]
    );

    let response = api.find("/req-1/response");
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(
        response.header("lambda-runtime-function-response-mode"),
        Some("streaming")
    );
    assert_eq!(response.header("transfer-encoding"), Some("chunked"));

    let body = r#"{"function":"demo","greeting":"hello world"}"#;
    assert_eq!(
        response.body_str(),
        format!("{:x}\r\n{}\r\n0\r\n\r\n", body.len(), body)
    );
}

#[tokio::test]
async fn test_stream_response() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-s", "3")]).await;

    let runtime = builder()
        .handle_stream("app.Feed.tail", |n: usize, _ctx| async move {
            let letters = ["a", "b", "c", "d"];
            let chunks = letters
                .into_iter()
                .take(n)
                .map(Ok::<_, std::io::Error>)
                .collect::<Vec<_>>();
            Ok::<_, std::io::Error>(stream::iter(chunks))
        })
        .start(api.config("app.Feed.tail"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::InvocationFailed);

    let response = api.find("/req-s/response");
    assert_eq!(response.header("content-type"), Some("text/event-stream"));
    assert_eq!(
        response.body_str(),
        "1\r\na\r\n1\r\nb\r\n1\r\nc\r\n0\r\n\r\n"
    );
}

#[tokio::test]
async fn test_recoverable_error_then_continue() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![
        event("req-1", r#""fail""#),
        event("req-2", r#""ok""#),
    ])
    .await;

    let runtime = builder()
        .handle("app.check", |input: String, _ctx| async move {
            if input == "fail" {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "input rejected",
                ));
            }
            Ok(input)
        })
        .start(api.config("app.check"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::InvocationFailed);

    assert_eq!(
        api.summary(),
        vec![
            "GET /2018-06-01/runtime/invocation/next",
            "POST /2018-06-01/runtime/invocation/req-1/error",
            "GET /2018-06-01/runtime/invocation/next",
            "POST /2018-06-01/runtime/invocation/req-2/response",
            "GET /2018-06-01/runtime/invocation/next",
        ]
    );

    let report = api.find("/req-1/error");
    assert_eq!(
        report.header("lambda-runtime-function-error-type"),
        Some("Function<Error>")
    );
    assert!(report
        .header("lambda-runtime-function-xray-error-cause")
        .is_some());

    let body = report.json();
    assert_eq!(body["errorMessage"], "input rejected");
    assert_eq!(body["errorType"], "Function<Error>");
    assert!(body["stackTrace"].is_array());
}

#[tokio::test]
async fn test_unmarshal_error_is_recoverable() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", r#"{"wrong":1}"#)]).await;

    let runtime = builder()
        .handle("app.greet", |input: Greeting, _ctx| async move {
            Ok::<_, std::io::Error>(input.name)
        })
        .start(api.config("app.greet"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::InvocationFailed);

    let report = api.find("/req-1/error");
    assert_eq!(
        report.header("lambda-runtime-function-error-type"),
        Some("Runtime.UnmarshalError")
    );
}

#[tokio::test]
async fn test_panic_is_fatal() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", "{}"), event("req-2", "{}")]).await;

    let runtime = builder()
        .handle("app.crash", |_: serde_json::Value, _ctx| async move {
            if true {
                panic!("invariant broken");
            }
            Ok::<(), std::io::Error>(())
        })
        .start(api.config("app.crash"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::FatalHandlerError);

    // Reported once, and the second event is never polled.
    assert_eq!(
        api.summary(),
        vec![
            "GET /2018-06-01/runtime/invocation/next",
            "POST /2018-06-01/runtime/invocation/req-1/error",
        ]
    );

    let report = api.find("/req-1/error");
    assert_eq!(
        report.header("lambda-runtime-function-error-type"),
        Some(HANDLER_PANIC)
    );
    assert_eq!(report.json()["errorMessage"], "invariant broken");
}

#[tokio::test]
async fn test_lookup_fault_from_handler_is_fatal() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", "{}"), event("req-2", "{}")]).await;

    let runtime = builder()
        .handle("app.Router.dispatch", |_: serde_json::Value, _ctx| async move {
            Err::<(), _>(HandlerError::not_found("app.Router.unknown"))
        })
        .start(api.config("app.Router.dispatch"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::FatalHandlerError);
    assert_eq!(api.summary().len(), 2);
    assert_eq!(
        api.find("/req-1/error")
            .header("lambda-runtime-function-error-type"),
        Some(HANDLER_NOT_FOUND)
    );
}

#[derive(Debug, thiserror::Error)]
#[error("upstream closed")]
struct UpstreamClosed;

#[tokio::test]
async fn test_stream_fault_writes_trailer_and_continues() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", "{}")]).await;

    let runtime = builder()
        .handle_stream("app.Feed.tail", |_: serde_json::Value, _ctx| async move {
            let items: Vec<Result<Bytes, UpstreamClosed>> =
                vec![Ok(Bytes::from_static(b"a")), Err(UpstreamClosed)];
            Ok::<_, std::io::Error>(stream::iter(items))
        })
        .start(api.config("app.Feed.tail"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::InvocationFailed);

    // The trailer is the report; no separate error POST.
    assert_eq!(
        api.summary(),
        vec![
            "GET /2018-06-01/runtime/invocation/next",
            "POST /2018-06-01/runtime/invocation/req-1/response",
            "GET /2018-06-01/runtime/invocation/next",
        ]
    );

    let response = api.find("/req-1/response");
    assert_eq!(
        response.header("trailer"),
        Some("Lambda-Runtime-Function-Error-Type, Lambda-Runtime-Function-Error-Body")
    );
    assert_eq!(
        response.body_str(),
        "1\r\na\r\n0\r\n\
         Lambda-Runtime-Function-Error-Type: Function<UpstreamClosed>\r\n\
         Lambda-Runtime-Function-Error-Body: dXBzdHJlYW0gY2xvc2Vk\r\n\r\n"
    );
}

#[tokio::test]
async fn test_stream_panic_is_fatal_without_second_report() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", "{}"), event("req-2", "{}")]).await;

    let runtime = builder()
        .handle_stream("app.Feed.tail", |_: serde_json::Value, _ctx| async move {
            let chunks = stream::iter(0..2).map(|i| {
                if i == 1 {
                    panic!("producer died");
                }
                Ok::<_, std::io::Error>("x")
            });
            Ok::<_, std::io::Error>(chunks)
        })
        .start(api.config("app.Feed.tail"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::FatalHandlerError);

    // The loop ends right after the response POST; give the server time to
    // read it, then make sure nothing else arrives.
    api.wait_for(2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        api.summary(),
        vec![
            "GET /2018-06-01/runtime/invocation/next",
            "POST /2018-06-01/runtime/invocation/req-1/response",
        ]
    );

    let body = api.find("/req-1/response").body_str().to_string();
    assert!(body.starts_with("1\r\nx\r\n0\r\n"));
    assert!(body.contains("Lambda-Runtime-Function-Error-Type: Runtime.HandlerPanic\r\n"));
}

#[tokio::test]
async fn test_trace_id_is_exported() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![
        Event {
            request_id: "req-1",
            payload: "{}",
            trace_id: Some("Root=1-abc;Parent=def;Sampled=1"),
        },
        event("req-2", "{}"),
    ])
    .await;

    let runtime = builder()
        .handle("app.trace", |_: serde_json::Value, ctx: LambdaContext| async move {
            Ok::<_, std::io::Error>(serde_json::json!({
                "env": std::env::var(TRACE_ID_ENV).ok(),
                "ctx": ctx.trace_id(),
            }))
        })
        .start(api.config("app.trace"))
        .await
        .unwrap();

    assert_eq!(runtime.run().await, ExitReason::InvocationFailed);

    let first = api.find("/req-1/response").body_str().to_string();
    assert!(first.contains(r#""env":"Root=1-abc;Parent=def;Sampled=1""#));
    assert!(first.contains(r#""ctx":"Root=1-abc;Parent=def;Sampled=1""#));

    let second = api.find("/req-2/response").body_str().to_string();
    assert!(second.contains(r#""env":null"#));
    assert!(std::env::var(TRACE_ID_ENV).is_err());
}

#[tokio::test]
async fn test_missing_handler_reports_init_error() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", "{}")]).await;

    let err = builder()
        .handle("app.present", |_: serde_json::Value, _ctx| async move {
            Ok::<_, std::io::Error>(())
        })
        .start(api.config("app.absent"))
        .await
        .err()
        .unwrap();

    assert_eq!(err.exit_reason(), ExitReason::InitFailed);
    assert!(matches!(err, Error::Init(InitError::Failed(ref f)) if f.is_fatal()));

    // Nothing is polled after an init failure.
    assert_eq!(api.summary(), vec!["POST /2018-06-01/runtime/init/error"]);

    let report = api.find("/init/error");
    assert_eq!(
        report.header("lambda-runtime-function-error-type"),
        Some(HANDLER_NOT_FOUND)
    );
    let message = report.json()["errorMessage"].as_str().unwrap().to_string();
    assert!(message.contains("app.absent"));
    assert!(message.contains("app.present"));
}

#[tokio::test]
async fn test_malformed_handler_reports_init_error() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![]).await;

    let err = builder()
        .handle("app.run", |_: serde_json::Value, _ctx| async move {
            Ok::<_, std::io::Error>(())
        })
        .start(api.config("a.b.c.d"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::Config(ConfigError::InvalidHandler(_))));
    assert_eq!(err.exit_reason(), ExitReason::ConfigInvalid);
    assert_eq!(
        api.find("/init/error")
            .header("lambda-runtime-function-error-type"),
        Some(MALFORMED_HANDLER)
    );
}

#[derive(Debug, thiserror::Error)]
#[error("secrets unavailable")]
struct SecretsUnavailable;

#[tokio::test]
async fn test_init_hook_failure() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", "{}")]).await;

    let err = builder()
        .handle("app.run", |_: serde_json::Value, _ctx| async move {
            Ok::<_, std::io::Error>(())
        })
        .init(|| async { Err::<(), _>(SecretsUnavailable) })
        .start(api.config("app.run"))
        .await
        .err()
        .unwrap();

    assert_eq!(err.exit_reason(), ExitReason::InitFailed);
    assert_eq!(api.summary(), vec!["POST /2018-06-01/runtime/init/error"]);

    let report = api.find("/init/error");
    assert_eq!(
        report.header("lambda-runtime-function-error-type"),
        Some("Init<SecretsUnavailable>")
    );
    assert_eq!(report.json()["errorMessage"], "secrets unavailable");
}

#[tokio::test]
async fn test_init_hook_runs_before_first_poll() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![event("req-1", "{}")]).await;
    let warmed = Arc::new(Mutex::new(false));
    let flag = warmed.clone();

    let runtime = builder()
        .handle("app.run", |_: serde_json::Value, _ctx| async move {
            Ok::<_, std::io::Error>("done")
        })
        .init(move || async move {
            *flag.lock().unwrap() = true;
            Ok::<_, std::io::Error>(())
        })
        .start(api.config("app.run"))
        .await
        .unwrap();

    assert!(*warmed.lock().unwrap());
    assert!(api.summary().is_empty());
    assert_eq!(runtime.run().await, ExitReason::InvocationFailed);
}

#[tokio::test]
async fn test_poll_failure_ends_loop_without_retry() {
    let _guard = serial();
    let api = FakeRuntimeApi::start(vec![]).await;

    let runtime = builder()
        .handle("app.run", |_: serde_json::Value, _ctx| async move {
            Ok::<_, std::io::Error>(())
        })
        .start(api.config("app.run"))
        .await
        .unwrap();

    let err = runtime.run_once().await.unwrap_err();
    assert_eq!(err.exit_reason(), ExitReason::InvocationFailed);
    assert_eq!(api.summary().len(), 1);
}
