//! Transport seam between the sync task and a concrete WebSocket library.
//!
//! A [`Connector`] turns a URL into a [`Connection`]: a boxed sink of
//! [`Outbound`] frames and a boxed stream of [`Inbound`] frames. Control
//! frames (ping/pong) are the connector's business and never surface here.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream};

use crate::error::WsError;

/// A frame the sync sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Normal-closure close frame.
    Close,
}

/// A frame the sync receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close { code: u16, reason: String },
}

pub type FrameSink = Pin<Box<dyn Sink<Outbound, Error = WsError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Inbound, WsError>> + Send>>;

/// An open connection, split into its two halves.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Connection {
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Outbound, Error = WsError> + Send + 'static,
        R: Stream<Item = Result<Inbound, WsError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Opens connections for the sync task.
///
/// Called once per connect attempt. The task bounds each call with
/// `WsConfig::connect_timeout`.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, WsError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{sink, stream, SinkExt, StreamExt};

    #[test]
    fn test_connection_boxes_any_sink_and_stream() {
        let frames = vec![
            Ok(Inbound::Text("{}".to_string())),
            Ok(Inbound::Close {
                code: 1000,
                reason: String::new(),
            }),
        ];
        let mut conn = Connection::new(
            sink::drain().sink_map_err(|never| match never {}),
            stream::iter(frames),
        );

        tokio_test::block_on(async {
            conn.sink
                .send(Outbound::Text("ping".to_string()))
                .await
                .unwrap();
            assert_eq!(
                conn.stream.next().await,
                Some(Ok(Inbound::Text("{}".to_string())))
            );
            assert!(matches!(
                conn.stream.next().await,
                Some(Ok(Inbound::Close { code: 1000, .. }))
            ));
            assert!(conn.stream.next().await.is_none());
        });
    }
}
