//! Websocket implementation of [`ChangeFeed`].
//!
//! One connection per listener group. After the subscribe frames are sent,
//! a reader task decodes change frames into [`ChangeEvent`]s and forwards
//! them on a bounded channel. Any transport failure ends the task and closes
//! the channel, which is the signal consumers use to start recovery.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::dao::backend::{BackendError, BackendResult, ChangeFeed, FeedSubscription};
use crate::dao::models::{ChangeEvent, ChangeKind, FeedGroup, FeedTable};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_BUFFER: usize = 64;
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(25);

/// Change-feed client for the arena data service's websocket endpoint.
#[derive(Clone)]
pub struct WebsocketFeed {
    url: String,
    api_key: Option<String>,
}

impl WebsocketFeed {
    pub fn new(url: &str, api_key: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }
}

impl ChangeFeed for WebsocketFeed {
    fn subscribe(
        &self,
        group: FeedGroup,
    ) -> BoxFuture<'static, BackendResult<FeedSubscription>> {
        let feed = self.clone();
        Box::pin(async move {
            let request_url = match &feed.api_key {
                Some(key) => format!("{}?apikey={key}", feed.url),
                None => feed.url.clone(),
            };

            let (stream, _response) = connect_async(&request_url).await.map_err(|err| {
                BackendError::feed(
                    format!("failed to connect to change feed at {}", feed.url),
                    err,
                )
            })?;
            let (mut writer, reader) = stream.split();

            for table in group.tables() {
                let frame = json!({ "action": "subscribe", "table": table.as_str() });
                writer
                    .send(Message::Text(frame.to_string()))
                    .await
                    .map_err(|err| {
                        BackendError::feed(
                            format!("failed to subscribe to table '{}'", table.as_str()),
                            err,
                        )
                    })?;
            }

            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            let guard = tokio::spawn(feed_reader(group, writer, reader, tx));
            info!(group = group.label(), "change feed subscription established");
            Ok(FeedSubscription::new(rx, Some(guard)))
        })
    }
}

/// Pump frames from the socket into the event channel until either side
/// goes away.
async fn feed_reader(
    group: FeedGroup,
    mut writer: SplitSink<WsStream, Message>,
    mut reader: SplitStream<WsStream>,
    tx: mpsc::Sender<ChangeEvent>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_PERIOD);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if writer.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!(group = group.label(), "change feed heartbeat failed");
                    break;
                }
            }
            message = reader.next() => match message {
                Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            // Subscription dropped, nobody listens anymore.
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(group = group.label(), error = %err, "discarding undecodable change frame");
                    }
                },
                Some(Ok(Message::Close(_))) => {
                    info!(group = group.label(), "change feed closed by remote");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(group = group.label(), error = %err, "change feed transport error");
                    break;
                }
                None => {
                    info!(group = group.label(), "change feed stream ended");
                    break;
                }
            }
        }
    }
    // Dropping `tx` closes the channel and signals the consumer.
}

/// Change frame as the feed endpoint serializes it.
#[derive(Debug, Deserialize)]
struct FeedFrame {
    #[serde(rename = "event")]
    kind: ChangeKind,
    table: String,
    #[serde(default)]
    old: Option<Value>,
    #[serde(default)]
    new: Option<Value>,
}

/// Decode one text frame. Unknown tables yield `Ok(None)` and are skipped;
/// undecodable frames are an error the caller logs and drops.
fn decode_frame(text: &str) -> Result<Option<ChangeEvent>, serde_json::Error> {
    let frame: FeedFrame = serde_json::from_str(text)?;
    let Some(table) = FeedTable::from_wire(&frame.table) else {
        return Ok(None);
    };
    Ok(Some(ChangeEvent {
        kind: frame.kind,
        table,
        before: frame.old.filter(|value| !value.is_null()),
        after: frame.new.filter(|value| !value.is_null()),
    }))
}
