//! Transport tests — credential bootstrap over an in-memory pipe, and the
//! line-delimited serve loop driven through a `Connection`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mux_protocol::{HandshakeError, InitializeResult, MuxError, ServerInfo};
use mux_transport::bootstrap::{BootstrapConfig, read_encryption_initialization};
use mux_transport::{Connection, serve};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

// ─────────────────────────────────────────────────────────────────────────────
// Credential bootstrap
// ─────────────────────────────────────────────────────────────────────────────

mod bootstrap {
    use super::*;

    async fn read_from(input: &'static [u8]) -> Result<mux_protocol::EncryptionInitialization, HandshakeError> {
        let (mut host, stream) = duplex(1024);
        host.write_all(input).await.unwrap();
        let mut reader = BufReader::new(stream);
        read_encryption_initialization(&mut reader, &BootstrapConfig::default()).await
    }

    #[tokio::test]
    async fn resolves_valid_record() {
        let init = read_from(b"{\"version\":\"1.0\",\"mode\":\"JWT\",\"key\":\"abc\"}\n")
            .await
            .unwrap();
        assert_eq!(init.version, "1.0");
        assert_eq!(init.mode.as_str(), "JWT");
        assert_eq!(init.key.expose_secret(), "abc");
    }

    #[tokio::test]
    async fn accepts_crlf_delimiter() {
        let init = read_from(b"{\"version\":\"1.0\",\"mode\":\"JWT\",\"key\":\"abc\"}\r\n")
            .await
            .unwrap();
        assert_eq!(init.key.expose_secret(), "abc");
    }

    #[tokio::test]
    async fn rejects_bad_json() {
        let err = read_from(b"badJSON\n").await.unwrap_err();
        assert!(matches!(err, HandshakeError::Parse(_)));
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn rejects_unsupported_version() {
        let err = read_from(b"{\"version\":\"2.0\",\"mode\":\"JWT\",\"key\":\"k\"}\n")
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::UnsupportedVersion(ref v) if v == "2.0"));
    }

    #[tokio::test]
    async fn rejects_missing_key() {
        let err = read_from(b"{\"version\":\"1.0\",\"mode\":\"JWT\"}\n").await.unwrap_err();
        assert!(matches!(err, HandshakeError::MissingKey));
    }

    #[tokio::test]
    async fn rejects_unsupported_mode() {
        let err = read_from(b"{\"version\":\"1.0\",\"mode\":\"AES\",\"key\":\"k\"}\n")
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::UnsupportedMode(ref m) if m == "AES"));
    }

    #[tokio::test]
    async fn record_split_across_writes() {
        let (mut host, stream) = duplex(1024);
        let reader_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            read_encryption_initialization(&mut reader, &BootstrapConfig::default()).await
        });
        host.write_all(b"{\"version\":\"1.0\",").await.unwrap();
        tokio::task::yield_now().await;
        host.write_all(b"\"mode\":\"JWT\",\"key\":\"abc\"}\n").await.unwrap();

        let init = reader_task.await.unwrap().unwrap();
        assert_eq!(init.key.expose_secret(), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_input() {
        let (_host, stream) = duplex(1024);
        let mut reader = BufReader::new(stream);
        let config = BootstrapConfig {
            timeout_ms: 5000,
            ..BootstrapConfig::default()
        };

        let err = read_encryption_initialization(&mut reader, &config).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Timeout { timeout_ms: 5000 }));
        assert!(err.to_string().contains("followed by new line"));
        assert!(err.to_string().contains("5000ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_delimiter() {
        let (mut host, stream) = duplex(1024);
        host.write_all(b"{\"version\":\"1.0\"").await.unwrap();
        let mut reader = BufReader::new(stream);

        let err = read_encryption_initialization(&mut reader, &BootstrapConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_input_waits_for_timeout() {
        let (host, stream) = duplex(1024);
        drop(host);
        let mut reader = BufReader::new(stream);

        let err = read_encryption_initialization(&mut reader, &BootstrapConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_record_is_rejected_without_waiting() {
        let (mut host, stream) = duplex(4096);
        let config = BootstrapConfig {
            max_record_bytes: 16,
            ..BootstrapConfig::default()
        };
        // Keep streaming with no newline; the reader must stop at the limit.
        host.write_all(&[b'x'; 1024]).await.unwrap();
        let mut reader = BufReader::new(stream);

        let started = tokio::time::Instant::now();
        let err = read_encryption_initialization(&mut reader, &config).await.unwrap_err();
        assert!(matches!(err, HandshakeError::TooLarge { limit: 16 }));
        assert_eq!(err.to_string(), "Encryption details exceed 16 bytes");
        assert!(started.elapsed() < Duration::from_millis(config.timeout_ms));
    }

    #[tokio::test]
    async fn record_at_the_limit_is_accepted() {
        let record = b"{\"version\":\"1.0\",\"mode\":\"JWT\",\"key\":\"abc\"}";
        let (mut host, stream) = duplex(1024);
        host.write_all(record).await.unwrap();
        host.write_all(b"\n").await.unwrap();
        let config = BootstrapConfig {
            max_record_bytes: record.len(),
            ..BootstrapConfig::default()
        };
        let mut reader = BufReader::new(stream);

        let init = read_encryption_initialization(&mut reader, &config).await.unwrap();
        assert_eq!(init.key.expose_secret(), "abc");
    }

    #[tokio::test]
    async fn leaves_following_bytes_for_the_protocol() {
        let (mut host, stream) = duplex(1024);
        host.write_all(b"{\"version\":\"1.0\",\"mode\":\"JWT\",\"key\":\"abc\"}\n{\"jsonrpc\":\"2.0\"}\n")
            .await
            .unwrap();
        let mut reader = BufReader::new(stream);
        read_encryption_initialization(&mut reader, &BootstrapConfig::default())
            .await
            .unwrap();

        let mut next = String::new();
        reader.read_line(&mut next).await.unwrap();
        assert_eq!(next, "{\"jsonrpc\":\"2.0\"}\n");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serve loop
// ─────────────────────────────────────────────────────────────────────────────

mod serving {
    use super::*;

    struct Client {
        writer: DuplexStream,
        reader: BufReader<DuplexStream>,
    }

    impl Client {
        async fn send(&mut self, message: Value) {
            let mut line = serde_json::to_string(&message).unwrap();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn send_raw(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
                .await
                .expect("Timeout waiting for response")
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    fn start(connection: Connection) -> (Client, tokio::task::JoinHandle<std::io::Result<()>>) {
        let (client_writer, server_reader) = duplex(64 * 1024);
        let (server_writer, client_reader) = duplex(64 * 1024);
        let handle = tokio::spawn(serve(
            BufReader::new(server_reader),
            server_writer,
            Arc::new(connection),
        ));
        (
            Client {
                writer: client_writer,
                reader: BufReader::new(client_reader),
            },
            handle,
        )
    }

    fn test_connection() -> Connection {
        let mut connection = Connection::new();
        connection.on_initialize(|_params, _token| async {
            Ok(InitializeResult {
                capabilities: json!({ "hoverProvider": true }).as_object().unwrap().clone(),
                server_info: Some(ServerInfo { name: "test".into(), version: None }),
            })
        });
        connection.on_execute_command(|params, token| async move {
            match params.command.as_str() {
                "wait" => {
                    token.cancelled().await;
                    Ok(json!("unreachable"))
                }
                "fail" => Err(MuxError::server_error("boom")),
                "explode" => panic!("feature blew up"),
                _ => Ok(json!({ "ran": params.command, "args": params.arguments })),
            }
        });
        connection
    }

    #[tokio::test]
    async fn initialize_round_trip() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"processId": 1}}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["capabilities"]["hoverProvider"], true);
        assert_eq!(resp["result"]["serverInfo"]["name"], "test");
    }

    #[tokio::test]
    async fn execute_command_round_trip() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({
                "jsonrpc": "2.0", "id": "x", "method": "workspace/executeCommand",
                "params": {"command": "echo", "arguments": [1, 2]}
            }))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], "x");
        assert_eq!(resp["result"]["ran"], "echo");
        assert_eq!(resp["result"]["args"], json!([1, 2]));
    }

    #[tokio::test]
    async fn handler_error_becomes_error_response() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({
                "jsonrpc": "2.0", "id": 2, "method": "workspace/executeCommand",
                "params": {"command": "fail"}
            }))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["error"]["code"], -32000);
        assert_eq!(resp["error"]["message"], "boom");
    }

    #[tokio::test]
    async fn invalid_params_are_rejected() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({
                "jsonrpc": "2.0", "id": 3, "method": "workspace/executeCommand",
                "params": {"arguments": []}
            }))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({"jsonrpc": "2.0", "id": 4, "method": "textDocument/hover"}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn unbound_initialize_is_not_found() {
        let (mut client, _server) = start(Connection::new());
        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn parse_error_has_null_id() {
        let (mut client, _server) = start(test_connection());
        client.send_raw("not json\n").await;
        let resp = client.recv().await;
        assert!(resp["id"].is_null());
        assert_eq!(resp["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn shutdown_answers_null() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({"jsonrpc": "2.0", "id": 9, "method": "shutdown"}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 9);
        assert!(resp["result"].is_null());
    }

    #[tokio::test]
    async fn cancel_request_cancels_in_flight_request() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({
                "jsonrpc": "2.0", "id": 7, "method": "workspace/executeCommand",
                "params": {"command": "wait"}
            }))
            .await;
        client
            .send(json!({"jsonrpc": "2.0", "method": "$/cancelRequest", "params": {"id": 7}}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 7);
        assert_eq!(resp["error"]["code"], -32800);
    }

    #[tokio::test]
    async fn notifications_reach_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut connection = test_connection();
        {
            let seen = seen.clone();
            connection.on_notification(move |method, _params| {
                let seen = seen.clone();
                async move {
                    if method == "initialized" {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
        let (mut client, server) = start(connection);
        client
            .send(json!({"jsonrpc": "2.0", "method": "initialized", "params": {}}))
            .await;
        client.send(json!({"jsonrpc": "2.0", "method": "exit"})).await;

        server.await.unwrap().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_handler_answers_internal_error_and_serving_continues() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({
                "jsonrpc": "2.0", "id": 1, "method": "workspace/executeCommand",
                "params": {"command": "explode"}
            }))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["error"]["code"], -32603);

        client
            .send(json!({
                "jsonrpc": "2.0", "id": 2, "method": "workspace/executeCommand",
                "params": {"command": "after"}
            }))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 2);
        assert_eq!(resp["result"]["ran"], "after");
    }

    #[tokio::test]
    async fn panicking_initialize_does_not_stop_the_loop() {
        let mut connection = Connection::new();
        connection.on_initialize(|_params, _token| async {
            if true {
                panic!("initialize blew up");
            }
            Ok(InitializeResult::default())
        });
        let (mut client, _server) = start(connection);

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["error"]["code"], -32603);

        client
            .send(json!({"jsonrpc": "2.0", "id": 2, "method": "shutdown"}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 2);
        assert!(resp["result"].is_null());
    }

    #[tokio::test]
    async fn dollar_notifications_are_not_forwarded() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut connection = test_connection();
        {
            let seen = seen.clone();
            connection.on_notification(move |method, _params| {
                let seen = seen.clone();
                async move { seen.lock().push(method) }
            });
        }
        let (mut client, server) = start(connection);
        client
            .send(json!({"jsonrpc": "2.0", "method": "$/setTrace", "params": {"value": "off"}}))
            .await;
        client
            .send(json!({"jsonrpc": "2.0", "method": "initialized", "params": {}}))
            .await;
        client.send(json!({"jsonrpc": "2.0", "method": "exit"})).await;

        server.await.unwrap().unwrap();
        assert_eq!(*seen.lock(), vec!["initialized".to_string()]);
    }

    #[tokio::test]
    async fn invalid_request_keeps_its_id() {
        let (mut client, _server) = start(test_connection());
        client
            .send(json!({"jsonrpc": "1.0", "id": 12, "method": "shutdown"}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 12);
        assert_eq!(resp["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn client_responses_are_ignored() {
        let (mut client, _server) = start(test_connection());
        client.send(json!({"jsonrpc": "2.0", "id": 99, "result": null})).await;
        client
            .send(json!({"jsonrpc": "2.0", "id": 3, "method": "shutdown"}))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 3);
    }

    #[tokio::test]
    async fn closed_input_stops_serving() {
        let (client, server) = start(test_connection());
        drop(client);
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("serve did not stop")
            .unwrap()
            .unwrap();
    }
}
