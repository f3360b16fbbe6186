//! Websocket client for the simulation's world-state feed
//!
//! Browser callbacks cannot touch the ECS, so every callback only pushes
//! into the scene's `SnapshotInbox`. Parsing happens here, at the boundary.

use bevy::prelude::*;
use droneshield_scene::SnapshotInbox;

use crate::config::ViewerConfig;

pub struct FeedPlugin;

/// Bookkeeping for the current feed connection
#[derive(Resource, Debug, Default)]
pub struct FeedConnection {
    pub url: String,
    /// Connections opened so far, including the first
    pub attempts: u32,
}

/// Message asking the client to drop the current socket and connect again
#[derive(Message)]
pub struct ReconnectFeed;

impl Plugin for FeedPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FeedConnection>()
            .add_message::<ReconnectFeed>()
            .add_systems(Startup, open_feed)
            .add_systems(Update, handle_reconnect);
    }
}

fn open_feed(
    config: Res<ViewerConfig>,
    inbox: Res<SnapshotInbox>,
    mut connection: ResMut<FeedConnection>,
) {
    connect(&config.feed_url, &inbox, &mut connection);
}

fn handle_reconnect(
    mut requests: MessageReader<ReconnectFeed>,
    config: Res<ViewerConfig>,
    inbox: Res<SnapshotInbox>,
    mut connection: ResMut<FeedConnection>,
) {
    // Several clicks in one frame still mean one reconnect
    if requests.read().count() == 0 {
        return;
    }
    tracing::info!("Reconnecting to feed: {}", config.feed_url);
    connect(&config.feed_url, &inbox, &mut connection);
}

fn connect(url: &str, inbox: &SnapshotInbox, connection: &mut FeedConnection) {
    connection.url = url.to_string();
    connection.attempts += 1;

    #[cfg(target_arch = "wasm32")]
    browser::open_socket(url, inbox);

    #[cfg(not(target_arch = "wasm32"))]
    {
        tracing::info!("WebSocket not available in native mode ({})", url);
        let _ = inbox;
    }
}

/// Turn one feed message into an inbox event
pub fn ingest_text(inbox: &SnapshotInbox, text: &str) {
    if let Err(e) = inbox.push_json(text) {
        tracing::warn!("Dropping feed message: {}", e);
    }
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::cell::RefCell;

    use droneshield_scene::{FeedEvent, SnapshotInbox};
    use wasm_bindgen::prelude::*;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    thread_local! {
        static ACTIVE: RefCell<Option<WebSocket>> = const { RefCell::new(None) };
    }

    /// Detach and close the previous socket so its late events are not reported
    fn close_active() {
        ACTIVE.with(|active| {
            if let Some(ws) = active.borrow_mut().take() {
                ws.set_onopen(None);
                ws.set_onmessage(None);
                ws.set_onerror(None);
                ws.set_onclose(None);
                let _ = ws.close();
            }
        });
    }

    pub fn open_socket(url: &str, inbox: &SnapshotInbox) {
        close_active();
        tracing::info!("Connecting to feed: {}", url);

        let ws = match WebSocket::new(url) {
            Ok(ws) => ws,
            Err(e) => {
                tracing::error!("Failed to create WebSocket: {:?}", e);
                inbox.push(FeedEvent::Error(format!("Cannot open {}: {:?}", url, e)));
                return;
            }
        };
        ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

        let open_inbox = inbox.clone();
        let onopen = Closure::wrap(Box::new(move |_| {
            tracing::info!("Feed connected");
            open_inbox.push(FeedEvent::Connected);
        }) as Box<dyn FnMut(JsValue)>);
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let message_inbox = inbox.clone();
        let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
            let data = e.data();
            if let Some(text) = data.as_string() {
                super::ingest_text(&message_inbox, &text);
            } else if let Ok(buffer) = data.dyn_into::<js_sys::ArrayBuffer>() {
                let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
                match String::from_utf8(bytes) {
                    Ok(text) => super::ingest_text(&message_inbox, &text),
                    Err(e) => message_inbox.push(FeedEvent::Rejected(format!(
                        "Binary feed message is not UTF-8: {}",
                        e
                    ))),
                }
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();

        let error_inbox = inbox.clone();
        let onerror = Closure::wrap(Box::new(move |e: ErrorEvent| {
            let message = e.message();
            let reason = if message.is_empty() {
                "WebSocket error".to_string()
            } else {
                message
            };
            error_inbox.push(FeedEvent::Error(reason));
        }) as Box<dyn FnMut(ErrorEvent)>);
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        let close_inbox = inbox.clone();
        let onclose = Closure::wrap(Box::new(move |e: CloseEvent| {
            let reason = if e.reason().is_empty() {
                format!("Connection closed ({})", e.code())
            } else {
                format!("Connection closed ({}): {}", e.code(), e.reason())
            };
            close_inbox.push(FeedEvent::Disconnected(reason));
        }) as Box<dyn FnMut(CloseEvent)>);
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();

        ACTIVE.with(|active| *active.borrow_mut() = Some(ws));
    }
}
