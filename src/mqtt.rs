// MQTT v5 subscription feeding the message ingestor.
// Persistent session (clean_start = false plus a session expiry) so the broker queues QoS 2
// messages while we are away. Messages are handled one at a time and acked only after the
// handler returns.
//
// The event loop is polled by its own task. Acks and subscribes go through the client's
// bounded request channel, which only the event loop drains, so they must never be issued
// from the task that polls it.

use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::mqttbytes::v5::{ConnectProperties, Packet, Publish};
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, info, warn};

use crate::config::MqttConfig;
use crate::ingestor::{InboundMessage, MessageIngestor};
use crate::stat_repo::StatSink;

const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// What the polling task hands to the handler loop.
#[derive(Debug)]
enum Delivery {
    Connected,
    Subscribed,
    Message(Publish),
}

pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut opts = MqttOptions::new(&config.client_id, &config.host, config.port);
    opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    opts.set_clean_start(false);
    opts.set_connect_properties(ConnectProperties {
        session_expiry_interval: Some(config.session_expiry_interval_secs),
        ..Default::default()
    });
    opts.set_manual_acks(true);
    opts
}

/// Detach a publish packet from the client library.
pub fn to_inbound(publish: &Publish) -> InboundMessage {
    InboundMessage {
        topic: String::from_utf8_lossy(&publish.topic).into_owned(),
        payload: publish.payload.clone(),
        retain: publish.retain,
        user_properties: publish
            .properties
            .as_ref()
            .map(|p| p.user_properties.clone())
            .unwrap_or_default(),
    }
}

/// Drive the connection until `shutdown_rx` fires. Connection errors are logged and retried
/// after `reconnect_delay_secs`; the subscription is renewed on every ConnAck.
pub async fn run<S: StatSink>(
    config: &MqttConfig,
    ingestor: &MessageIngestor<S>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CHANNEL_CAPACITY);
    // Unbounded so polling never waits on the handler.
    let (delivery_tx, mut delivery_rx) = mpsc::unbounded_channel();
    let reconnect_delay = Duration::from_secs(config.reconnect_delay_secs);
    let poller = tokio::spawn(
        poll_events(eventloop, delivery_tx, reconnect_delay)
            .instrument(tracing::debug_span!("mqtt_poll", host = %config.host)),
    );

    loop {
        let delivery = tokio::select! {
            delivery = delivery_rx.recv() => delivery,
            _ = &mut shutdown_rx => break,
        };
        let Some(delivery) = delivery else {
            break;
        };

        match delivery {
            Delivery::Connected => {
                info!(host = %config.host, port = config.port, "MQTT connected");
                if let Err(e) = client
                    .subscribe(config.topic.clone(), QoS::ExactlyOnce)
                    .await
                {
                    warn!(error = %e, operation = "subscribe", "MQTT subscribe request failed");
                }
            }
            Delivery::Subscribed => {
                info!(topic = %config.topic, "MQTT subscribed");
            }
            Delivery::Message(publish) => {
                let msg = to_inbound(&publish);
                let outcome = ingestor.handle_message(&msg).await;
                debug!(?outcome, "message handled");
                if let Err(e) = client.ack(&publish).await {
                    warn!(error = %e, operation = "ack", "MQTT ack failed");
                }
            }
        }
    }

    poller.abort();
    debug!("MQTT loop shutting down");
}

/// Poll the event loop until the handler side goes away.
async fn poll_events(
    mut eventloop: EventLoop,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
    reconnect_delay: Duration,
) {
    loop {
        let delivery = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => Delivery::Connected,
            Ok(Event::Incoming(Packet::SubAck(_))) => Delivery::Subscribed,
            Ok(Event::Incoming(Packet::Publish(publish))) => Delivery::Message(publish),
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, delay_secs = reconnect_delay.as_secs(), "MQTT connection error, reconnecting");
                tokio::time::sleep(reconnect_delay).await;
                continue;
            }
        };
        if delivery_tx.send(delivery).is_err() {
            break;
        }
    }
}
