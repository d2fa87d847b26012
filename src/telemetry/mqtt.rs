//! MQTT telemetry with Home Assistant discovery.

use super::{TelemetryPublisher, TelemetryValue};
use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Numeric sensors announced to Home Assistant: id, display name, unit, device class.
const SENSORS: &[(&str, &str, &str, Option<&str>)] = &[
    ("temperature", "Temperature", "°C", Some("temperature")),
    ("humidity", "Humidity", "%", Some("humidity")),
    ("pressure", "Pressure", "hPa", Some("pressure")),
    ("gas_resistance", "Gas Resistance", "Ω", None),
    ("air_quality", "Air Quality", "%", None),
    ("distance", "Distance", "mm", Some("distance")),
    ("lux", "Ambient Light", "lx", Some("illuminance")),
    ("display_brightness", "Display Brightness", "%", None),
];

/// Topic layout derived from the MQTT configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    pub topic_prefix: String,
    pub discovery_prefix: String,
    pub device_id: String,
}

impl TopicScheme {
    pub fn from_config(config: &MqttConfig) -> Self {
        Self {
            topic_prefix: config.topic_prefix.clone(),
            discovery_prefix: config.discovery_prefix.clone(),
            device_id: config.device_id.clone(),
        }
    }

    /// State topic for a reading.
    pub fn state_topic(&self, name: &str, value: &TelemetryValue) -> String {
        if value.is_bool() {
            format!("{}/{}/state", self.topic_prefix, name)
        } else {
            format!("{}/sensor/{}", self.topic_prefix, name)
        }
    }

    pub fn availability_topic(&self) -> String {
        format!("{}/availability", self.topic_prefix)
    }

    fn device(&self) -> Value {
        json!({
            "identifiers": [self.device_id],
            "name": "Proximity Display",
            "model": "Multi-zone ToF proximity display controller",
            "manufacturer": "proximity-display",
        })
    }

    /// Retained discovery documents as `(topic, payload)` pairs.
    pub fn discovery_messages(&self) -> Vec<(String, String)> {
        let mut messages = Vec::with_capacity(SENSORS.len() + 1);

        for (id, name, unit, device_class) in SENSORS {
            let mut document = json!({
                "name": name,
                "unique_id": format!("{}_{}", self.device_id, id),
                "state_topic": format!("{}/sensor/{}", self.topic_prefix, id),
                "availability_topic": self.availability_topic(),
                "unit_of_measurement": unit,
                "device": self.device(),
            });
            if let Some(class) = device_class {
                document["device_class"] = json!(class);
            }
            messages.push((
                format!(
                    "{}/sensor/{}_{}/config",
                    self.discovery_prefix, self.device_id, id
                ),
                document.to_string(),
            ));
        }

        let proximity = json!({
            "name": "Proximity",
            "unique_id": format!("{}_proximity", self.device_id),
            "state_topic": format!("{}/proximity/state", self.topic_prefix),
            "availability_topic": self.availability_topic(),
            "device_class": "occupancy",
            "payload_on": "ON",
            "payload_off": "OFF",
            "device": self.device(),
        });
        messages.push((
            format!(
                "{}/binary_sensor/{}_proximity/config",
                self.discovery_prefix, self.device_id
            ),
            proximity.to_string(),
        ));

        messages
    }
}

/// [`TelemetryPublisher`] backed by an MQTT broker.
///
/// Publishes are queued with `try_publish`; when the request queue is full the
/// reading is dropped rather than stalling the caller.
pub struct MqttTelemetry {
    client: AsyncClient,
    topics: TopicScheme,
    stop: CancellationToken,
    event_task: JoinHandle<()>,
}

impl MqttTelemetry {
    /// Connect to the broker and start the event loop task.
    ///
    /// Must be called from within a tokio runtime. The connection itself is
    /// established (and re-established) by the event loop in the background.
    pub fn start(config: &MqttConfig) -> Self {
        let stop = CancellationToken::new();
        let topics = TopicScheme::from_config(config);

        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_last_will(LastWill::new(
            topics.availability_topic(),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        info!(
            "[MQTT] Publishing to {}:{} under {}/",
            config.broker_host, config.broker_port, topics.topic_prefix
        );

        let event_task = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            topics.clone(),
            stop.clone(),
        ));

        Self {
            client,
            topics,
            stop,
            event_task,
        }
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    /// Mark the device offline and disconnect.
    pub async fn shutdown(mut self) {
        if let Err(e) = self
            .client
            .publish(
                self.topics.availability_topic(),
                QoS::AtLeastOnce,
                true,
                "offline",
            )
            .await
        {
            debug!("[MQTT] Could not publish offline state: {}", e);
        }
        if let Err(e) = self.client.disconnect().await {
            debug!("[MQTT] Disconnect failed: {}", e);
        }
        // Give the event loop a moment to flush before it is torn down
        if tokio::time::timeout(Duration::from_secs(1), &mut self.event_task)
            .await
            .is_err()
        {
            debug!("[MQTT] Broker did not acknowledge shutdown in time");
        }
    }
}

impl Drop for MqttTelemetry {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl TelemetryPublisher for MqttTelemetry {
    fn publish(&self, name: &str, value: TelemetryValue) {
        let topic = self.topics.state_topic(name, &value);
        let payload = value.payload();
        debug!("[MQTT] {} = {}", topic, payload);
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.into_bytes())
        {
            warn!("[MQTT] Dropping {} reading: {}", name, e);
        }
    }
}

/// Drive the connection. Discovery and availability are republished on every (re)connect.
async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topics: TopicScheme,
    stop: CancellationToken,
) {
    info!("[MQTT] Starting event loop");

    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("[MQTT] Connected to broker");
                announce(&client, &topics);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                error!("[MQTT] Connection error: {:?}", e);
                // Wait before reconnecting
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                }
            }
        }
    }

    info!("[MQTT] Event loop stopped");
}

fn announce(client: &AsyncClient, topics: &TopicScheme) {
    for (topic, payload) in topics.discovery_messages() {
        if let Err(e) = client.try_publish(topic.as_str(), QoS::AtLeastOnce, true, payload) {
            warn!("[MQTT] Failed to queue discovery for {}: {}", topic, e);
        }
    }
    if let Err(e) = client.try_publish(topics.availability_topic(), QoS::AtLeastOnce, true, "online")
    {
        warn!("[MQTT] Failed to queue availability: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> TopicScheme {
        TopicScheme {
            topic_prefix: "homedash".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            device_id: "hall".to_string(),
        }
    }

    #[test]
    fn test_state_topics() {
        let topics = topics();
        assert_eq!(
            topics.state_topic("lux", &TelemetryValue::Float(12.0)),
            "homedash/sensor/lux"
        );
        assert_eq!(
            topics.state_topic("proximity", &TelemetryValue::Bool(true)),
            "homedash/proximity/state"
        );
        assert_eq!(topics.availability_topic(), "homedash/availability");
    }

    #[test]
    fn test_discovery_documents() {
        let messages = topics().discovery_messages();
        assert_eq!(messages.len(), SENSORS.len() + 1);

        let (topic, payload) = &messages[0];
        assert_eq!(topic, "homeassistant/sensor/hall_temperature/config");
        let doc: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(doc["unique_id"], "hall_temperature");
        assert_eq!(doc["state_topic"], "homedash/sensor/temperature");
        assert_eq!(doc["device_class"], "temperature");
        assert_eq!(doc["device"]["identifiers"][0], "hall");

        let gas = messages
            .iter()
            .find(|(t, _)| t.contains("gas_resistance"))
            .map(|(_, p)| serde_json::from_str::<Value>(p).unwrap())
            .unwrap();
        assert!(gas.get("device_class").is_none());

        let (topic, payload) = messages.last().unwrap();
        assert_eq!(topic, "homeassistant/binary_sensor/hall_proximity/config");
        let doc: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(doc["state_topic"], "homedash/proximity/state");
        assert_eq!(doc["payload_on"], "ON");
    }
}
