use std::fmt::Display;

use domain::device::Tunables;

use crate::state::DeviceSnapshot;

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone, Copy)]
enum Kind {
    Counter,
    Gauge,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Gauge => "gauge",
        }
    }
}

struct Exposition {
    out: String,
    device_id: String,
}

impl Exposition {
    fn new(device_id: &str) -> Self {
        Self {
            out: String::with_capacity(4096),
            device_id: device_id.replace('\\', "\\\\").replace('"', "\\\""),
        }
    }

    fn metric(&mut self, name: &str, kind: Kind, help: &str, value: impl Display) {
        self.out.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} {}\n{name}{{device=\"{}\"}} {value}\n",
            kind.as_str(),
            self.device_id,
        ));
    }

    fn counter(&mut self, name: &str, help: &str, value: u64) {
        self.metric(name, Kind::Counter, help, value);
    }

    fn gauge(&mut self, name: &str, help: &str, value: impl Display) {
        self.metric(name, Kind::Gauge, help, value);
    }

    fn flag(&mut self, name: &str, help: &str, value: bool) {
        self.gauge(name, help, u8::from(value));
    }
}

/// Renders the snapshot in the text exposition format. Every metric of the
/// device class is emitted, with zero values before the first acquisition.
pub fn render_metrics(snapshot: &DeviceSnapshot) -> String {
    let mut exp = Exposition::new(&snapshot.identity.device_id);

    match &snapshot.config.tunables {
        Tunables::Co2Sensor(co2) => {
            co2_metrics(&mut exp, snapshot, co2.detection_range.ppm(), co2.abc_enabled)
        }
        Tunables::Camera(cam) => camera_metrics(&mut exp, snapshot, cam.quality, cam.brightness),
    }
    shared_metrics(&mut exp, snapshot);

    exp.out
}

fn co2_metrics(exp: &mut Exposition, snapshot: &DeviceSnapshot, range_ppm: u16, abc: bool) {
    let m = &snapshot.metrics;
    exp.gauge("co2_ppm", "Last CO2 concentration in ppm", m.last_co2_ppm);
    exp.gauge(
        "co2_temperature_celsius",
        "Last sensor temperature in degrees Celsius",
        m.last_temperature_c,
    );
    exp.counter("co2_readings_total", "Successful sensor readings", m.acquisitions_total);
    exp.counter(
        "co2_reading_errors_total",
        "Failed sensor readings",
        m.acquisition_errors_total,
    );
    exp.gauge(
        "co2_publish_interval_ms",
        "Configured publish interval in milliseconds",
        snapshot.config.interval_ms,
    );
    exp.gauge("co2_detection_range_ppm", "Configured detection range in ppm", range_ppm);
    exp.flag("co2_abc_enabled", "Automatic baseline correction enabled", abc);
    exp.flag(
        "co2_sensor_warmed_up",
        "Sensor finished its warm-up period",
        m.sensor_ready,
    );
}

fn camera_metrics(exp: &mut Exposition, snapshot: &DeviceSnapshot, quality: u8, brightness: i8) {
    let m = &snapshot.metrics;
    exp.counter(
        "camera_frames_captured_total",
        "Frames captured",
        m.acquisitions_total,
    );
    exp.counter(
        "camera_frames_sent_total",
        "Frames published",
        m.acquisitions_sent_total,
    );
    exp.counter(
        "camera_frames_error_total",
        "Failed frame captures",
        m.acquisition_errors_total,
    );
    exp.counter("camera_bytes_total", "Payload bytes published", m.bytes_sent_total);
    exp.gauge(
        "camera_last_frame_bytes",
        "Size of the last captured frame",
        m.last_frame_bytes,
    );
    exp.gauge(
        "camera_last_capture_duration_ms",
        "Duration of the last capture in milliseconds",
        m.last_capture_duration_ms,
    );
    exp.gauge(
        "camera_fps",
        "Frames captured per second",
        format!("{:.2}", m.acquisition_rate),
    );
    exp.gauge("camera_quality", "JPEG quality (0-63, lower is better)", quality);
    exp.gauge("camera_brightness", "Brightness level (-2 to 2)", brightness);
    exp.gauge(
        "camera_capture_interval_ms",
        "Configured capture interval in milliseconds",
        snapshot.config.interval_ms,
    );
    exp.flag("camera_enabled", "Capture enabled", snapshot.config.enabled);
}

fn shared_metrics(exp: &mut Exposition, snapshot: &DeviceSnapshot) {
    let m = &snapshot.metrics;
    exp.counter(
        "mqtt_messages_published_total",
        "Messages accepted by the MQTT client",
        m.published_total,
    );
    exp.counter(
        "mqtt_publish_errors_total",
        "Messages the MQTT client refused",
        m.publish_errors_total,
    );
    exp.gauge("mqtt_qos_level", "Configured MQTT QoS level", snapshot.config.qos.as_u8());
    exp.flag("mqtt_connected", "MQTT session is up", m.broker_connected);
    exp.counter(
        "mqtt_reconnects_total",
        "MQTT (re)connections",
        m.broker_reconnects_total,
    );
    exp.counter("wifi_reconnects_total", "Network link reconnections", m.link_reconnects_total);
    exp.gauge("wifi_rssi_dbm", "Link signal strength in dBm", m.rssi_dbm);
    exp.flag("device_online", "Node is running", true);
    exp.gauge(
        "device_uptime_seconds",
        "Seconds since start",
        snapshot.uptime.as_secs(),
    );
    exp.gauge(
        "device_last_error_timestamp_seconds",
        "Unix time of the last acquisition error, 0 if none",
        m.last_error_at.map_or(0, |at| at.timestamp()),
    );
}
