use axum::{
    Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
};
use std::sync::Arc;

use application::DeviceState;
use application::telemetry::{CONTENT_TYPE, render_metrics};

pub fn create_router(state: Arc<DeviceState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn metrics(State(state): State<Arc<DeviceState>>) -> impl IntoResponse {
    let body = render_metrics(&state.get_snapshot());
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

async fn index(State(state): State<Arc<DeviceState>>) -> Html<String> {
    let snapshot = state.get_snapshot();
    let identity = &snapshot.identity;
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{id}</title></head><body>\n\
         <h1>{id}</h1>\n\
         <p>Type: {class} &middot; Firmware: {firmware}</p>\n\
         <p>Sensor: {status} &middot; Uptime: {uptime} s</p>\n\
         <p><a href=\"/metrics\">Metrics</a></p>\n\
         </body></html>\n",
        id = escape(&identity.device_id),
        class = identity.class.as_str(),
        firmware = escape(&identity.firmware_version),
        status = snapshot.sensor_status(),
        uptime = snapshot.uptime.as_secs(),
    ))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
