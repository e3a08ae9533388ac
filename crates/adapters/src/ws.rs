// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket client leg used by cross-node proxying.

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::forward::ForwardError;

/// Client-side duplex to a peer node.
pub type WsDuplex = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect to `url`, propagating the given headers (notably
/// `Authorization`) verbatim.
pub async fn connect_with_headers(
    url: &str,
    headers: &[(String, String)],
) -> Result<WsDuplex, ForwardError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ForwardError::Transport(format!("bad ws url {url:?}: {e}")))?;
    for (name, value) in headers {
        let header_name: tokio_tungstenite::tungstenite::http::header::HeaderName = name
            .parse()
            .map_err(|_| ForwardError::Transport(format!("bad header name {name:?}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ForwardError::Transport(format!("bad header value for {name:?}")))?;
        request.headers_mut().insert(header_name, header_value);
    }
    let (stream, _resp) = connect_async(request)
        .await
        .map_err(|e| ForwardError::Transport(format!("ws connect to {url}: {e}")))?;
    Ok(stream)
}
