mod websocket;

use std::sync::Arc;
use std::time::Duration;

use bevy::prelude::*;
use thiserror::Error;

use crate::config::{StageConfig, Topics};
use crate::dispatch::{CommandDispatcher, SharedFlags, StageFlags};
use crate::protocol::{decode, handshake, GOT_MESSAGE};
use crate::queue::{action_queue, StageAction};
use crate::scene::AssetCatalog;
use crate::telemetry::TelemetryEmitter;

pub use websocket::{spawn_link, WsTransport};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link is not connected")]
    NotConnected,
    #[error("link writer has shut down")]
    Closed,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Outbound half of the connection. Implementations must not block.
pub trait Transport: Send + Sync {
    fn send(&self, frame: String) -> Result<(), TransportError>;
}

/// Receives connection lifecycle and inbound frames from the adapter, on the
/// adapter's thread.
pub struct LinkHandler {
    dispatcher: CommandDispatcher,
    transport: Arc<dyn Transport>,
    topics: Topics,
}

impl LinkHandler {
    pub fn new(
        dispatcher: CommandDispatcher,
        transport: Arc<dyn Transport>,
        topics: Topics,
    ) -> Self {
        Self {
            dispatcher,
            transport,
            topics,
        }
    }

    pub fn on_open(&self) {
        self.dispatcher.flags().set_connected(true);
        for frame in handshake(&self.topics) {
            if let Err(err) = self.transport.send(frame) {
                warn!("[Stage link] Handshake frame not sent: {err}");
            }
        }
    }

    /// A frame that fails to decode is dropped; the link stays up.
    pub fn on_frame(&self, frame: &str) {
        let command = match decode(frame) {
            Ok(command) => command,
            Err(err) => {
                warn!("[Stage link] Dropping frame: {err}");
                return;
            }
        };
        if let Some(kind) = command.kind() {
            debug!("[Stage link] Received {kind}");
            self.dispatcher
                .queue()
                .enqueue(StageAction::Report(GOT_MESSAGE.to_string()));
        }
        self.dispatcher.dispatch(command);
    }

    pub fn on_error(&self, err: &TransportError) {
        warn!("[Stage link] {err}");
    }

    /// Already queued actions still run after a close.
    pub fn on_close(&self) {
        self.dispatcher.flags().set_connected(false);
        info!("[Stage link] Disconnected");
    }
}

/// Wires the receive side to the presentation loop: action queue, shared
/// flags, telemetry and the websocket thread. Reads [`StageConfig`] from the
/// app, so insert it first.
pub struct LinkPlugin;

impl Plugin for LinkPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<StageConfig>()
            .cloned()
            .unwrap_or_default();

        let flags = Arc::new(StageFlags::default());
        let (sender, receiver) = action_queue();
        let (transport, outbound) = WsTransport::new(flags.clone());
        let transport: Arc<dyn Transport> = Arc::new(transport);

        let handler = LinkHandler::new(
            CommandDispatcher::new(sender, flags.clone()),
            transport.clone(),
            config.topics.clone(),
        );
        let emitter = TelemetryEmitter::new(transport, config.topics.clone());

        crate::runtime::install(
            app,
            receiver,
            SharedFlags(flags),
            emitter,
            AssetCatalog::from_dir(&config.assets_dir),
            config.sidekick,
        );

        spawn_link(
            config.websocket_url(),
            config.reconnect_delay_secs.map(Duration::from_secs),
            handler,
            outbound,
        );
    }
}

/// Captures outbound frames instead of sending them. Refuses frames while
/// the link is flagged down, like the real adapter.
#[cfg(test)]
pub(crate) struct RecordingTransport {
    frames: Arc<std::sync::Mutex<Vec<String>>>,
    flags: Arc<StageFlags>,
}

#[cfg(test)]
impl RecordingTransport {
    pub(crate) fn new(flags: Arc<StageFlags>) -> Self {
        Self {
            frames: Arc::default(),
            flags,
        }
    }

    pub(crate) fn frames(&self) -> Arc<std::sync::Mutex<Vec<String>>> {
        self.frames.clone()
    }
}

#[cfg(test)]
impl Transport for RecordingTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.flags.connected() {
            return Err(TransportError::NotConnected);
        }
        self.frames.lock().expect("frames lock").push(frame);
        Ok(())
    }
}
