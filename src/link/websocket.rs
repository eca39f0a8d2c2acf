use std::sync::Arc;
use std::time::Duration;

use bevy::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{LinkHandler, Transport, TransportError};
use crate::dispatch::StageFlags;

/// Hands frames to the link thread's writer.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
    flags: Arc<StageFlags>,
}

impl WsTransport {
    pub fn new(flags: Arc<StageFlags>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { outbound, flags }, rx)
    }
}

impl Transport for WsTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.flags.connected() {
            return Err(TransportError::NotConnected);
        }
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }
}

/// Runs the websocket client on its own thread. With `reconnect` set, a
/// dropped or refused connection is retried after that delay.
pub fn spawn_link(
    url: String,
    reconnect: Option<Duration>,
    handler: LinkHandler,
    outbound: mpsc::UnboundedReceiver<String>,
) {
    let spawned = std::thread::Builder::new()
        .name("stage-link".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("[Stage link] Failed to start runtime, running unlinked: {err}");
                    return;
                }
            };
            runtime.block_on(run_link(url, reconnect, handler, outbound));
        });
    if let Err(err) = spawned {
        error!("[Stage link] Failed to spawn link thread, running unlinked: {err}");
    }
}

async fn run_link(
    url: String,
    reconnect: Option<Duration>,
    handler: LinkHandler,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    loop {
        info!("[Stage link] Connecting to {url}");
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!("[Stage link] Connected to {url}");
                // Frames queued for an earlier connection are stale.
                while outbound.try_recv().is_ok() {}
                handler.on_open();

                let (mut write, mut read) = stream.split();
                loop {
                    tokio::select! {
                        inbound = read.next() => match inbound {
                            Some(Ok(Message::Text(text))) => handler.on_frame(&text),
                            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                                Ok(text) => handler.on_frame(text),
                                Err(err) => warn!("[Stage link] Dropping non-UTF-8 frame: {err}"),
                            },
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                handler.on_error(&TransportError::from(err));
                                break;
                            }
                        },
                        Some(frame) = outbound.recv() => {
                            if let Err(err) = write.send(Message::Text(frame)).await {
                                handler.on_error(&TransportError::from(err));
                                break;
                            }
                        }
                    }
                }
                handler.on_close();
            }
            Err(err) => handler.on_error(&TransportError::from(err)),
        }

        let Some(delay) = reconnect else {
            info!("[Stage link] Link is down and reconnect is off");
            return;
        };
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_only_while_connected() {
        let flags = Arc::new(StageFlags::default());
        let (transport, mut rx) = WsTransport::new(flags.clone());
        assert!(matches!(
            transport.send("early".to_string()),
            Err(TransportError::NotConnected)
        ));

        flags.set_connected(true);
        transport.send("hello".to_string()).expect("send");
        assert_eq!(rx.try_recv().ok().as_deref(), Some("hello"));

        drop(rx);
        assert!(matches!(
            transport.send("gone".to_string()),
            Err(TransportError::Closed)
        ));
    }
}
