//! Native WebSocket transport: `tokio-tungstenite`.
//!
//! Adapts a tungstenite stream to the sync's [`Connection`]:
//! - outbound text and a normal close frame
//! - inbound text (and UTF-8 binary) frames, close frames with code/reason
//! - ping/pong left to tungstenite, which answers pings on the next write

use futures_util::future::BoxFuture;
use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::error::WsError;
use crate::ws::transport::{Connection, Connector, Inbound, Outbound};

/// [`Connector`] backed by `tokio-tungstenite` (TLS via `native-tls`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, WsError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _) = connect_async(url.as_str()).await.map_err(WsError::from)?;
            let (sink, stream) = ws_stream.split();

            let sink = sink
                .sink_map_err(WsError::from)
                .with(|frame: Outbound| future::ready(Ok::<_, WsError>(to_message(frame))));
            let stream = stream.filter_map(|msg| future::ready(from_message(msg)));

            Ok(Connection::new(sink, stream))
        })
    }
}

fn to_message(frame: Outbound) -> Message {
    match frame {
        Outbound::Text(text) => Message::Text(text.into()),
        Outbound::Close => Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "Client disconnect".into(),
        })),
    }
}

fn from_message(
    msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Inbound, WsError>> {
    match msg {
        Ok(Message::Text(text)) => {
            let text_str: &str = text.as_ref();
            Some(Ok(Inbound::Text(text_str.to_string())))
        }
        Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
            Ok(text) => Some(Ok(Inbound::Text(text.to_string()))),
            Err(_) => {
                tracing::debug!("Dropping non-UTF-8 binary frame ({} bytes)", data.len());
                None
            }
        },
        Ok(Message::Close(frame)) => {
            let (code, reason) = extract_close(frame.as_ref());
            Some(Ok(Inbound::Close { code, reason }))
        }
        Ok(_) => None, // Ping, Pong, Frame
        Err(e) => Some(Err(WsError::from(e))),
    }
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_close_with_frame() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "goodbye".into(),
        };
        let (code, reason) = extract_close(Some(&frame));
        assert_eq!(code, 1000);
        assert_eq!(reason, "goodbye");
    }

    #[test]
    fn test_extract_close_no_frame() {
        let (code, reason) = extract_close(None);
        assert_eq!(code, 1006);
        assert_eq!(reason, "No close frame");
    }

    #[test]
    fn test_outbound_close_is_normal() {
        match to_message(Outbound::Close) {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inbound_text_and_control_frames() {
        assert_eq!(
            from_message(Ok(Message::Text("{}".into()))),
            Some(Ok(Inbound::Text("{}".to_string())))
        );
        assert_eq!(
            from_message(Ok(Message::Binary(b"{\"a\":1}".to_vec().into()))),
            Some(Ok(Inbound::Text("{\"a\":1}".to_string())))
        );
        assert_eq!(from_message(Ok(Message::Ping(Vec::new().into()))), None);
        assert_eq!(
            from_message(Ok(Message::Close(None))),
            Some(Ok(Inbound::Close {
                code: 1006,
                reason: "No close frame".to_string()
            }))
        );
    }

    #[test]
    fn test_inbound_error_maps_to_closed() {
        assert_eq!(
            from_message(Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)),
            Some(Err(WsError::Closed {
                code: None,
                reason: "Connection closed".to_string()
            }))
        );
    }
}
