//! Live dashboard bridge: collects telemetry + serves it over local HTTP.
//!
//! Two parallel threads:
//! - **Collector:** drains the telemetry channel into a capped history (last 1000 ticks).
//! - **Web server:** HTTP listener serving the HTML page, JSON status/history, an SVG trace,
//!   and a POST endpoint that injects reference-input events (on-screen joystick pad).
//!
//! Both threads exit when the shared `running` flag clears.

use plotters::{coord::Shift, prelude::*};

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info};
use parking_lot::RwLock;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::balancer::reference::{Direction, InputEvent};
use crate::runtime::{
    input::{InputHandle, SendOutcome},
    telemetry::TelemetrySnapshot,
};

pub const HISTORY_POINTS: usize = 1_000;
const POLL_MS: u64 = 200;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("failed to bind dashboard on port {port}: {reason}")]
    Bind { port: u16, reason: String },
    #[error("failed to spawn dashboard thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What the web side sees: latest record + bounded history.
#[derive(Default)]
pub struct DashboardState {
    pub latest: Option<TelemetrySnapshot>,
    pub history: VecDeque<TelemetrySnapshot>,
    pub received: u64,
}

impl DashboardState {
    pub fn push(&mut self, snapshot: TelemetrySnapshot) {
        if self.history.len() >= HISTORY_POINTS {
            self.history.pop_front();
        }
        self.history.push_back(snapshot);
        self.latest = Some(snapshot);
        self.received += 1;
    }
}

pub type SharedDashboard = Arc<RwLock<DashboardState>>;

pub struct DashboardHandle {
    pub state: SharedDashboard,
    pub port: u16,
    collector: thread::JoinHandle<()>,
    web: thread::JoinHandle<()>,
}

impl DashboardHandle {
    /// Waits for both threads; call after clearing `running`.
    pub fn join(self) {
        match self.collector.join() {
            Ok(_) => info!("[Dashboard] collector joined"),
            Err(_) => error!("[Dashboard] collector join failed"),
        }
        match self.web.join() {
            Ok(_) => info!("[Dashboard] web server joined"),
            Err(_) => error!("[Dashboard] web server join failed"),
        }
    }
}

/// Starts collector + web server. Binding happens before any thread is spawned so a busy
/// port is reported to the caller.
pub fn start_dashboard(
    port: u16,
    rx: Receiver<TelemetrySnapshot>,
    input: InputHandle,
    running: Arc<AtomicBool>,
) -> Result<DashboardHandle, DashboardError> {
    let server = Server::http(("127.0.0.1", port)).map_err(|e| DashboardError::Bind {
        port,
        reason: e.to_string(),
    })?;
    // port 0 binds an ephemeral port; report the real one
    let port = server.server_addr().to_ip().map_or(port, |addr| addr.port());
    info!("[Dashboard] available at http://127.0.0.1:{}", port);

    let state: SharedDashboard = Arc::new(RwLock::new(DashboardState::default()));

    let collector = {
        let state = state.clone();
        let running = running.clone();
        thread::Builder::new()
            .name("dashboard_collector".into())
            .spawn(move || collect(rx, state, running))?
    };

    let web = {
        let state = state.clone();
        thread::Builder::new()
            .name("dashboard_web".into())
            .spawn(move || serve(server, state, input, running))?
    };

    Ok(DashboardHandle {
        state,
        port,
        collector,
        web,
    })
}

fn collect(rx: Receiver<TelemetrySnapshot>, state: SharedDashboard, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(POLL_MS)) {
            Ok(snapshot) => state.write().push(snapshot),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("[Dashboard] collector exiting");
}

fn serve(server: Server, state: SharedDashboard, input: InputHandle, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(POLL_MS)) {
            Ok(Some(request)) => handle_request(request, &state, &input),
            Ok(None) => continue,
            Err(e) => {
                error!("[Dashboard] accept error: {}", e);
                break;
            }
        }
    }
    info!("[Dashboard] web server exiting accept loop");
}

fn handle_request(request: Request, state: &SharedDashboard, input: &InputHandle) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let (status, content_type, body) = route(&method, &url, state, input);

    let mut response = Response::from_string(body).with_status_code(StatusCode(status));
    if let Ok(header) = Header::from_bytes("Content-Type", content_type) {
        response = response.with_header(header);
    }

    if let Err(e) = request.respond(response) {
        debug!("[Dashboard] respond failed for {}: {}", url, e);
    }
}

/// Maps a request to `(status, content type, body)`.
pub fn route(
    method: &Method,
    url: &str,
    state: &SharedDashboard,
    input: &InputHandle,
) -> (u16, &'static str, String) {
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        (Method::Get, "/") => (200, "text/html; charset=utf-8", DASHBOARD_HTML.to_string()),
        (Method::Get, "/status.json") => match state.read().latest {
            Some(snapshot) => match snapshot.to_json() {
                Ok(json) => (200, "application/json", json),
                Err(e) => (500, "text/plain", e.to_string()),
            },
            None => (503, "text/plain", "no telemetry yet".into()),
        },
        (Method::Get, "/history.json") => {
            let guard = state.read();
            match serde_json::to_string(&guard.history) {
                Ok(json) => (200, "application/json", json),
                Err(e) => (500, "text/plain", e.to_string()),
            }
        }
        (Method::Get, "/dashboard.svg") => {
            let history: Vec<TelemetrySnapshot> = state.read().history.iter().copied().collect();
            match render_svg(&history) {
                Ok(svg) => (200, "image/svg+xml", svg),
                Err(e) => (500, "text/plain", e),
            }
        }
        (Method::Post, p) if p.starts_with("/input/") => match parse_input_path(p) {
            Some(event) => match input.send(event) {
                SendOutcome::Queued => (202, "text/plain", event.to_string()),
                SendOutcome::Dropped => (429, "text/plain", "input queue full".into()),
                SendOutcome::Closed => (503, "text/plain", "simulation stopped".into()),
            },
            // malformed events are ignored, reference stays as it was
            None => (400, "text/plain", "expected /input/<press|release>/<direction>".into()),
        },
        _ => (404, "text/plain", "not found".into()),
    }
}

/// `/input/press/up`, `/input/release/left`, `/input/press/space`.
pub fn parse_input_path(path: &str) -> Option<InputEvent> {
    let mut parts = path.trim_start_matches("/input/").split('/');
    let action = parts.next()?;
    let direction: Direction = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    match action {
        "press" => Some(InputEvent::Press(direction)),
        "release" => Some(InputEvent::Release(direction)),
        _ => None,
    }
}

/// SVG trace: ball position, position error and platform tilt over the history window.
pub fn render_svg(history: &[TelemetrySnapshot]) -> Result<String, String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (1200, 900)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;
        let areas = root.split_evenly((3, 1));

        plot_pair(&areas[0], "Ball position [m] (x blue, y red)", history, |s| {
            (s.real_pose.x, s.real_pose.y)
        })?;
        plot_pair(&areas[1], "Position error [m] (x blue, y red)", history, |s| {
            (s.error.x, s.error.y)
        })?;
        plot_pair(&areas[2], "Platform tilt [deg] (roll blue, pitch red)", history, |s| {
            (s.platform_pose.roll, s.platform_pose.pitch)
        })?;

        root.present().map_err(|e| e.to_string())?;
    }
    Ok(svg)
}

fn plot_pair<F>(
    area: &DrawingArea<SVGBackend, Shift>,
    title: &str,
    history: &[TelemetrySnapshot],
    pick: F,
) -> Result<(), String>
where
    F: Fn(&TelemetrySnapshot) -> (f64, f64),
{
    let points: Vec<(f64, f64)> = history.iter().map(&pick).collect();
    let (min_y, max_y) = if points.is_empty() {
        (-1.0, 1.0)
    } else {
        let min = points.iter().map(|p| p.0.min(p.1)).fold(f64::INFINITY, f64::min);
        let max = points.iter().map(|p| p.0.max(p.1)).fold(f64::NEG_INFINITY, f64::max);
        (min, max.max(min + 1e-6))
    };

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(20)
        .y_label_area_size(50)
        .build_cartesian_2d(0..HISTORY_POINTS, min_y..max_y)
        .map_err(|e| e.to_string())?;
    chart
        .configure_mesh()
        .disable_mesh()
        .draw()
        .map_err(|e| e.to_string())?;
    chart
        .draw_series(LineSeries::new(points.iter().enumerate().map(|(i, p)| (i, p.0)), &BLUE))
        .map_err(|e| e.to_string())?;
    chart
        .draw_series(LineSeries::new(points.iter().enumerate().map(|(i, p)| (i, p.1)), &RED))
        .map_err(|e| e.to_string())?;
    Ok(())
}

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Ball Balancer</title>
<style>
 body { font-family: sans-serif; margin: 20px; }
 table { border-collapse: collapse; }
 td { padding: 4px 12px; }
 .pad button { width: 70px; height: 40px; margin: 2px; }
</style>
</head>
<body>
<h2>Ball Balancer</h2>
<table>
 <tr><td>time [s]</td><td id="time">-</td></tr>
 <tr><td>roll / pitch [deg]</td><td id="pose">-</td></tr>
 <tr><td>joystick x / y</td><td id="joy">-</td></tr>
 <tr><td>ball x / y [m]</td><td id="ball">-</td></tr>
 <tr><td>error x / y [m]</td><td id="err">-</td></tr>
</table>
<div class="pad">
 <div><button data-dir="up">up</button></div>
 <div><button data-dir="left">left</button><button data-dir="space">reset</button><button data-dir="right">right</button></div>
 <div><button data-dir="down">down</button></div>
</div>
<img id="trace" src="/dashboard.svg" width="1200" height="900">
<script>
function send(action, dir) { fetch('/input/' + action + '/' + dir, { method: 'POST' }); }
document.querySelectorAll('.pad button').forEach(function (b) {
  b.addEventListener('mousedown', function () { send('press', b.dataset.dir); });
  b.addEventListener('mouseup', function () { send('release', b.dataset.dir); });
});
var keys = { ArrowUp: 'up', ArrowDown: 'down', ArrowLeft: 'left', ArrowRight: 'right', ' ': 'space' };
document.addEventListener('keydown', function (e) { if (keys[e.key]) { send('press', keys[e.key]); e.preventDefault(); } });
document.addEventListener('keyup', function (e) { if (keys[e.key]) { send('release', keys[e.key]); } });
function pair(p, a, b) { return p[a] + ' / ' + p[b]; }
setInterval(function () {
  fetch('/status.json').then(function (r) { return r.ok ? r.json() : null; }).then(function (s) {
    if (!s) return;
    document.getElementById('time').textContent = s.time.toFixed(3);
    document.getElementById('pose').textContent = pair(s.platform_pose, 'roll', 'pitch');
    document.getElementById('joy').textContent = pair(s.joystick_val, 'x', 'y');
    document.getElementById('ball').textContent = pair(s.real_pose, 'x', 'y');
    document.getElementById('err').textContent = pair(s.error, 'x', 'y');
  });
}, 100);
setInterval(function () { document.getElementById('trace').src = '/dashboard.svg?t=' + Date.now(); }, 1000);
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::state::{SimulationState, Vec2};
    use crate::runtime::input::input_channel;

    fn snapshot(t: f64) -> TelemetrySnapshot {
        let mut s = SimulationState::new();
        s.sim_time = t;
        TelemetrySnapshot::from_state(&s, Vec2::ZERO)
    }

    #[test]
    fn history_is_capped() {
        let mut st = DashboardState::default();
        for i in 0..(HISTORY_POINTS + 5) {
            st.push(snapshot(i as f64));
        }
        assert_eq!(st.history.len(), HISTORY_POINTS);
        assert_eq!(st.received, (HISTORY_POINTS + 5) as u64);
        assert_eq!(st.latest.map(|s| s.time), Some((HISTORY_POINTS + 4) as f64));
    }

    #[test]
    fn status_is_unavailable_before_first_tick() {
        let state: SharedDashboard = Arc::new(RwLock::new(DashboardState::default()));
        let (handle, _queue) = input_channel(4);
        let (status, _, _) = route(&Method::Get, "/status.json", &state, &handle);
        assert_eq!(status, 503);

        state.write().push(snapshot(0.005));
        let (status, ctype, body) = route(&Method::Get, "/status.json", &state, &handle);
        assert_eq!(status, 200);
        assert_eq!(ctype, "application/json");
        assert!(body.contains("\"time\":0.005"));
    }

    #[test]
    fn input_endpoint_forwards_events() {
        let state: SharedDashboard = Arc::new(RwLock::new(DashboardState::default()));
        let (handle, queue) = input_channel(4);

        let (status, _, _) = route(&Method::Post, "/input/press/left", &state, &handle);
        assert_eq!(status, 202);
        let (status, _, _) = route(&Method::Post, "/input/hold/left", &state, &handle);
        assert_eq!(status, 400);

        let got: Vec<_> = queue.drain().collect();
        assert_eq!(got, vec![InputEvent::Press(Direction::Left)]);

        drop(queue);
        let (status, _, _) = route(&Method::Post, "/input/release/left", &state, &handle);
        assert_eq!(status, 503);
    }

    #[test]
    fn parses_input_paths() {
        assert_eq!(
            parse_input_path("/input/press/space"),
            Some(InputEvent::Press(Direction::Reset))
        );
        assert_eq!(
            parse_input_path("/input/release/up"),
            Some(InputEvent::Release(Direction::Up))
        );
        assert_eq!(parse_input_path("/input/press"), None);
        assert_eq!(parse_input_path("/input/press/up/extra"), None);
    }

    #[test]
    fn svg_renders_with_and_without_data() {
        let empty = render_svg(&[]).unwrap();
        assert!(empty.contains("<svg"));

        let history: Vec<_> = (0..50).map(|i| snapshot(i as f64 * 0.005)).collect();
        let svg = render_svg(&history).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("polyline") || svg.contains("path"));
    }

    #[test]
    fn unknown_routes_are_404() {
        let state: SharedDashboard = Arc::new(RwLock::new(DashboardState::default()));
        let (handle, _queue) = input_channel(1);
        let (status, _, _) = route(&Method::Get, "/nope", &state, &handle);
        assert_eq!(status, 404);
    }
}
