//! Line-delimited JSON-RPC server loop.
//!
//! Reads one JSON-RPC message per line, routes requests to a
//! [`RequestHandler`], and writes one response per line. `initialize` and
//! `shutdown` run inline so lifecycle ordering is preserved; every other
//! request runs on its own task so that a slow feature cannot hold up
//! `$/cancelRequest` or unrelated requests. A handler that panics answers
//! its own request with an internal error; serving continues.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use mux_protocol::{
    HandlerResult, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Methods,
    MuxError, RequestId, is_implementation_dependent,
};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::cancel::CancellationToken;
use crate::panic::catch_panic;

/// Trait implemented by whatever answers protocol traffic.
/// The transport calls this for every request and notification.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a JSON-RPC request and return its result.
    fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
        token: CancellationToken,
    ) -> impl Future<Output = HandlerResult> + Send;

    /// Handle a JSON-RPC notification (optional).
    fn handle_notification(
        &self,
        _method: &str,
        _params: Option<Value>,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Requests currently executing, keyed by id.
type InFlight = Arc<DashMap<RequestId, CancellationToken>>;

enum Flow {
    Continue,
    Exit,
}

/// Serve `handler` over a line-delimited reader/writer pair until the client
/// sends `exit` or closes its end.
///
/// On end of input, requests still running are allowed to finish and their
/// responses are written. On `exit`, they are cancelled first.
pub async fn serve<R, W, H>(reader: R, mut writer: W, handler: Arc<H>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    H: RequestHandler,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let in_flight: InFlight = Arc::new(DashMap::new());
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Input closed");
                    break;
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if let Flow::Exit = handle_line(text, &handler, &in_flight, &out_tx).await {
                    debug!("Exit received");
                    for entry in in_flight.iter() {
                        entry.value().cancel();
                    }
                    break;
                }
            }
            Some(message) = out_rx.recv() => {
                write_message(&mut writer, &message).await?;
            }
        }
    }

    // Drain responses from requests still in flight.
    drop(out_tx);
    while let Some(message) = out_rx.recv().await {
        write_message(&mut writer, &message).await?;
    }
    Ok(())
}

async fn handle_line<H: RequestHandler>(
    text: &str,
    handler: &Arc<H>,
    in_flight: &InFlight,
    out_tx: &mpsc::UnboundedSender<String>,
) -> Flow {
    let parsed: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable message: {e}");
            send(out_tx, &JsonRpcResponse::error(None, MuxError::parse_error("Failed to parse JSON")));
            return Flow::Continue;
        }
    };

    match IncomingMessage::from_value(parsed) {
        Ok(IncomingMessage::Request(request)) => {
            dispatch_request(request, handler, in_flight, out_tx).await;
            Flow::Continue
        }
        Ok(IncomingMessage::Notification(notification)) => {
            handle_notification(notification, handler, in_flight).await
        }
        Ok(IncomingMessage::Response(id)) => {
            debug!("Ignoring client response for id {id:?}");
            Flow::Continue
        }
        Err(id) => {
            send(out_tx, &JsonRpcResponse::error(id, MuxError::invalid_request("Invalid JSON-RPC 2.0 message")));
            Flow::Continue
        }
    }
}

async fn handle_notification<H: RequestHandler>(
    notification: JsonRpcNotification,
    handler: &Arc<H>,
    in_flight: &InFlight,
) -> Flow {
    let JsonRpcNotification { method, params, .. } = notification;
    match method.as_str() {
        Methods::EXIT => return Flow::Exit,
        Methods::CANCEL_REQUEST => cancel_request(in_flight, params),
        m if is_implementation_dependent(m) => debug!("Ignoring {m}"),
        m => {
            if let Err(panic) = catch_panic(handler.handle_notification(m, params)).await {
                error!("Notification handler for {m} panicked: {panic}");
            }
        }
    }
    Flow::Continue
}

async fn dispatch_request<H: RequestHandler>(
    request: JsonRpcRequest,
    handler: &Arc<H>,
    in_flight: &InFlight,
    out_tx: &mpsc::UnboundedSender<String>,
) {
    let JsonRpcRequest { id, method, params, .. } = request;
    let token = CancellationToken::new();

    if method == Methods::INITIALIZE || method == Methods::SHUTDOWN {
        let result = run_handler(handler.as_ref(), &method, params, token).await;
        send(out_tx, &JsonRpcResponse::from_result(id, result));
        return;
    }

    in_flight.insert(id.clone(), token.clone());
    let handler = Arc::clone(handler);
    let in_flight = Arc::clone(in_flight);
    let out_tx = out_tx.clone();
    tokio::spawn(async move {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Request {id:?} ({method}) cancelled");
                Err(MuxError::cancelled())
            }
            result = run_handler(handler.as_ref(), &method, params, token.clone()) => result,
        };
        in_flight.remove(&id);
        send(&out_tx, &JsonRpcResponse::from_result(id, result));
    });
}

/// Call the handler; a panic becomes an internal error for this request only.
async fn run_handler<H: RequestHandler>(
    handler: &H,
    method: &str,
    params: Option<Value>,
    token: CancellationToken,
) -> HandlerResult {
    match catch_panic(handler.handle_request(method, params, token)).await {
        Ok(result) => result,
        Err(panic) => {
            error!("Handler for {method} panicked: {panic}");
            Err(MuxError::internal(format!("Handler for {method} panicked")))
        }
    }
}

fn cancel_request(in_flight: &InFlight, params: Option<Value>) {
    let id: Option<RequestId> = params
        .and_then(|p| p.get("id").cloned())
        .and_then(|v| serde_json::from_value(v).ok());
    match id.as_ref().and_then(|id| in_flight.get(id)) {
        Some(entry) => entry.value().cancel(),
        None => debug!("Cancel for unknown request {id:?}"),
    }
}

fn send(out_tx: &mpsc::UnboundedSender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(json) => {
            // The receiver only goes away once serving has stopped.
            let _ = out_tx.send(json);
        }
        Err(e) => error!("Failed to encode response: {e}"),
    }
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> std::io::Result<()> {
    writer.write_all(message.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
