//! Unix Socket Server
//!
//! Async server for the JSON-lines control protocol.
//!
//! # Security Features
//! - **Socket permissions**: world read/write socket, symlinks refused on bind
//! - **Peer credentials**: UID/PID audit logging for every state change
//! - **Connection limits**: maximum concurrent connections enforced
//! - **Rate limiting**: per-UID request rate limiting
//! - **Timeouts**: read/write timeouts on every message
//! - **Message limits**: bounded line reads, validated parameters

use std::collections::HashMap;
use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use ucc_core::{
    ChannelRole, ControlSettings, FanControlHandle, FanCurve, PresetLibrary, Profile,
};
use ucc_protocol::{
    CurvePoint, HardwareInfo, ProfileInfo, Request, RequestEnvelope, Response, ResponseData,
    ResponseEnvelope,
};

// ============================================================================
// Limits
// ============================================================================

/// Maximum concurrent client connections
const MAX_CONNECTIONS: usize = 64;

/// Maximum message size in bytes
const MAX_MESSAGE_SIZE: usize = ucc_protocol::MAX_MESSAGE_SIZE;

/// Read timeout per message
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Write timeout per message
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests allowed per client and window
const RATE_LIMIT_REQUESTS: u32 = 1500;

/// Rate limit window duration
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(10);

/// Socket permissions (0666 = world read/write); state changes are audited
const SOCKET_MODE: u32 = 0o666;

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// State shared by all connections
pub struct DaemonState {
    pub settings: Arc<ControlSettings>,
    pub fan_control: FanControlHandle,
}

impl DaemonState {
    pub fn new(settings: Arc<ControlSettings>, fan_control: FanControlHandle) -> Self {
        Self {
            settings,
            fan_control,
        }
    }
}

/// Outcome of reading one request line
enum LineRead {
    /// A newline-terminated line of this many bytes
    Line(usize),
    Eof,
    TooLarge,
}

/// Read up to and including the next newline without buffering past `limit`
async fn read_request_line<R>(
    reader: &mut R,
    line: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(LineRead::Eof);
        }

        let newline = chunk.iter().position(|&b| b == b'\n');
        let end = newline.map_or(chunk.len(), |pos| pos + 1);
        if line.len() + end > limit {
            return Ok(LineRead::TooLarge);
        }

        line.extend_from_slice(&chunk[..end]);
        reader.consume(end);
        if newline.is_some() {
            return Ok(LineRead::Line(line.len()));
        }
    }
}

/// Fixed request budget per UID and window
struct RateLimiter {
    budget: u32,
    window: Duration,
    usage: HashMap<u32, WindowUsage>,
}

struct WindowUsage {
    opened: Instant,
    used: u32,
}

impl RateLimiter {
    fn new(budget: u32, window: Duration) -> Self {
        Self {
            budget,
            window,
            usage: HashMap::new(),
        }
    }

    /// Count a request against `uid`, false once its budget is spent
    fn admit(&mut self, uid: u32) -> bool {
        let now = Instant::now();
        let usage = self.usage.entry(uid).or_insert(WindowUsage { opened: now, used: 0 });
        if now.duration_since(usage.opened) > self.window {
            *usage = WindowUsage { opened: now, used: 0 };
        }

        let admitted = usage.used < self.budget;
        if admitted {
            usage.used += 1;
        }
        admitted
    }

    /// Forget clients idle for two windows
    fn prune(&mut self) {
        let now = Instant::now();
        let horizon = self.window * 2;
        self.usage.retain(|_, usage| now.duration_since(usage.opened) < horizon);
    }
}

// ============================================================================
// Server
// ============================================================================

/// Bind the control socket, replacing a stale socket file
pub fn bind(socket_path: &Path) -> anyhow::Result<UnixListener> {
    if let Ok(metadata) = socket_path.symlink_metadata() {
        if metadata.file_type().is_symlink() {
            bail!("Socket path {:?} is a symlink - refusing", socket_path);
        }
        std::fs::remove_file(socket_path)
            .with_context(|| format!("removing stale socket {:?}", socket_path))?;
        debug!("Removed existing socket file");
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("binding {:?}", socket_path))?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;

    info!("Listening on {:?} (mode {:o})", socket_path, SOCKET_MODE);
    Ok(listener)
}

/// Accept clients until `shutdown` resolves
pub async fn serve<F>(listener: UnixListener, state: Arc<DaemonState>, shutdown: F)
where
    F: Future<Output = ()>,
{
    info!(
        "Limits: max_conn={}, max_msg={}, rate_limit={}/{:?}",
        MAX_CONNECTIONS, MAX_MESSAGE_SIZE, RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW
    );

    let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
        RATE_LIMIT_REQUESTS,
        RATE_LIMIT_WINDOW,
    )));

    let rate_limiter_cleanup = rate_limiter.clone();
    let cleanup_task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(RATE_LIMIT_WINDOW).await;
            rate_limiter_cleanup.lock().await.prune();
        }
    });

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let current = ACTIVE_CONNECTIONS.load(Ordering::SeqCst);
                        if current >= MAX_CONNECTIONS {
                            warn!("Connection limit reached ({}), rejecting new connection", current);
                            drop(stream);
                            continue;
                        }

                        ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
                        let rate_limiter = rate_limiter.clone();
                        let state = state.clone();

                        tokio::spawn(async move {
                            handle_client(stream, rate_limiter, state).await;
                            ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    cleanup_task.abort();
    info!(
        "Server stopped ({} connections still open)",
        ACTIVE_CONNECTIONS.load(Ordering::SeqCst)
    );
}

/// Client credentials from Unix socket peer
#[derive(Debug, Clone, Copy)]
struct PeerCredentials {
    uid: u32,
    gid: u32,
    pid: i32,
}

impl PeerCredentials {
    fn of(stream: &UnixStream) -> std::io::Result<Self> {
        let cred = stream.peer_cred()?;
        Ok(Self {
            uid: cred.uid(),
            gid: cred.gid(),
            pid: cred.pid().unwrap_or(0),
        })
    }
}

/// Error envelope for failures that happen before a request id is known
fn unaddressed_error(message: &str) -> ResponseEnvelope {
    ResponseEnvelope::new(0, Response::error(message))
}

const SERIALIZATION_FALLBACK: &[u8] = br#"{"id":0,"status":"error","message":"Serialization error"}"#;

async fn handle_client(
    stream: UnixStream,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    state: Arc<DaemonState>,
) {
    let cred = match PeerCredentials::of(&stream) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to get peer credentials ({}), rejecting connection", e);
            return;
        }
    };
    debug!("Connection from uid={}, gid={}, pid={}", cred.uid, cred.gid, cred.pid);

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::with_capacity(1024);
    let mut served: u64 = 0;
    let connected_at = Instant::now();

    loop {
        let next = read_request_line(&mut reader, &mut line, MAX_MESSAGE_SIZE);
        let read = match timeout(READ_TIMEOUT, next).await {
            Ok(Ok(read)) => read,
            Ok(Err(e)) => {
                error!("Read error from uid={}, pid={}: {}", cred.uid, cred.pid, e);
                break;
            }
            Err(_) => {
                debug!("Read timeout for uid={}, pid={}", cred.uid, cred.pid);
                reject(&mut writer, "Read timeout").await;
                break;
            }
        };

        let len = match read {
            LineRead::Line(len) => len,
            LineRead::Eof => {
                debug!(
                    "Client disconnected: uid={}, pid={}, requests={}, duration={:?}",
                    cred.uid,
                    cred.pid,
                    served,
                    connected_at.elapsed()
                );
                break;
            }
            LineRead::TooLarge => {
                warn!(
                    "Message too large (>{} bytes) from uid={}, pid={}",
                    MAX_MESSAGE_SIZE, cred.uid, cred.pid
                );
                reject(&mut writer, "Message too large").await;
                break;
            }
        };

        if !rate_limiter.lock().await.admit(cred.uid) {
            warn!("Rate limit exceeded for uid={}, pid={}", cred.uid, cred.pid);
            reject(&mut writer, "Rate limit exceeded").await;
            continue;
        }
        served += 1;
        trace!("Request #{} from uid={}: {} bytes", served, cred.uid, len);

        let Ok(text) = std::str::from_utf8(&line) else {
            debug!("Non-UTF8 request from uid={}", cred.uid);
            reject(&mut writer, "Invalid request encoding").await;
            break;
        };

        let envelope = process_request(text, &cred, &state);
        if let Err(e) = write_envelope(&mut writer, &envelope).await {
            error!("Failed to answer uid={}: {}", cred.uid, e);
            break;
        }
    }
}

/// Best-effort error reply on a connection that is being dropped or throttled
async fn reject(writer: &mut OwnedWriteHalf, message: &str) {
    if let Err(e) = write_envelope(writer, &unaddressed_error(message)).await {
        debug!("Could not report '{}' to client: {}", message, e);
    }
}

async fn write_envelope(
    writer: &mut OwnedWriteHalf,
    envelope: &ResponseEnvelope,
) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(envelope).unwrap_or_else(|e| {
        error!("Failed to serialize response id={}: {}", envelope.id, e);
        SERIALIZATION_FALLBACK.to_vec()
    });
    bytes.push(b'\n');

    timeout(WRITE_TIMEOUT, writer.write_all(&bytes))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "write timed out"))?
}

// ============================================================================
// Request handling
// ============================================================================

/// Parse, validate and execute one request line
fn process_request(line: &str, cred: &PeerCredentials, state: &DaemonState) -> ResponseEnvelope {
    let envelope: RequestEnvelope = match serde_json::from_str(line.trim()) {
        Ok(e) => e,
        Err(e) => {
            debug!("Invalid JSON from uid={}: {}", cred.uid, e);
            return unaddressed_error("Invalid request format");
        }
    };

    let request_id = envelope.id;
    let request = envelope.request;

    if let Err(e) = request.validate() {
        warn!("Request validation failed from uid={}: {}", cred.uid, e);
        return ResponseEnvelope::new(request_id, Response::error(e));
    }

    let request_type = request.type_name();
    if request.is_mutating() {
        info!(
            "AUDIT: {} (id={}) by uid={}, pid={}",
            request_type, request_id, cred.uid, cred.pid
        );
    } else {
        debug!(
            "Processing {} (id={}) from uid={}, pid={}",
            request_type, request_id, cred.uid, cred.pid
        );
    }

    let response = match request {
        Request::Ping => Response::ok_string("pong"),

        Request::Version => Response::ok_string(env!("CARGO_PKG_VERSION")),

        Request::GetFanData { channel } => {
            match state.fan_control.telemetry().fan_reading(channel as usize) {
                Some(reading) => {
                    Response::ok_data(ResponseData::fan_data(reading.to_fan_data(channel as usize)))
                }
                None => Response::error(format!("Fan {} not available", channel)),
            }
        }

        Request::GetAllFanData => {
            let fans = state
                .fan_control
                .telemetry()
                .all()
                .iter()
                .enumerate()
                .map(|(channel, reading)| reading.to_fan_data(channel))
                .collect();
            Response::ok_data(ResponseData::fan_list(fans))
        }

        Request::GetHardwareInfo => Response::ok_data(ResponseData::hw(hardware_info(state))),

        Request::GetFanControlEnabled => {
            Response::ok_data(ResponseData::flag(state.settings.is_enabled()))
        }

        Request::SetFanControlEnabled { enabled } => {
            info!("AUDIT: fan control enabled={} by uid={}", enabled, cred.uid);
            state.settings.set_enabled(enabled);
            Response::ok()
        }

        Request::GetActiveProfile => {
            let profile = state.settings.profile();
            Response::ok_data(ResponseData::active_profile(ProfileInfo::from(&*profile)))
        }

        Request::SetActiveProfile { profile } => {
            info!(
                "AUDIT: profile id={} preset={} by uid={}",
                profile.id, profile.fan_profile, cred.uid
            );
            match Profile::try_from(profile).and_then(|p| state.settings.set_profile(p)) {
                Ok(()) => Response::ok(),
                Err(e) => Response::error(e.to_string()),
            }
        }

        Request::SetSameSpeed { same_speed } => {
            info!("AUDIT: same_speed={} by uid={}", same_speed, cred.uid);
            state.settings.set_same_speed(same_speed);
            Response::ok()
        }

        Request::ListPresets => {
            Response::ok_data(ResponseData::preset_names(PresetLibrary::builtin().names()))
        }

        Request::PreviewCurve {
            preset,
            gpu,
            temperatures,
        } => preview_curve(&preset, gpu, &temperatures),

        Request::SetTemporaryCurves { cpu, gpu } => match (to_curve(cpu), to_curve(gpu)) {
            (Ok(cpu), Ok(gpu)) => {
                state.fan_control.apply_temporary_curves(cpu, gpu);
                Response::ok()
            }
            (Err(e), _) | (_, Err(e)) => Response::error(e.to_string()),
        },

        Request::ClearTemporaryCurves => {
            state.fan_control.clear_temporary_curves();
            Response::ok()
        }
    };

    if let Response::Error { ref message } = response {
        warn!(
            "Request {} (id={}) failed for uid={}: {}",
            request_type, request_id, cred.uid, message
        );
    }

    ResponseEnvelope::new(request_id, response)
}

fn hardware_info(state: &DaemonState) -> HardwareInfo {
    let summary = state.fan_control.hardware_info();
    HardwareInfo {
        fan_count: summary.fan_count as u32,
        min_speed_floor: summary.floor.min_speed_floor,
        off_available: summary.floor.off_available,
        temporary_curves_active: state.fan_control.has_temporary_curves(),
    }
}

fn preview_curve(preset: &str, gpu: bool, temperatures: &[i32]) -> Response {
    let Some(preset) = PresetLibrary::builtin().get(preset) else {
        return Response::error(format!("Unknown preset: {}", preset));
    };
    let role = if gpu { ChannelRole::Gpu } else { ChannelRole::Cpu };
    let curve = preset.curve(role);
    let speeds = temperatures.iter().map(|t| curve.lookup(*t)).collect();
    Response::ok_data(ResponseData::speed_list(speeds))
}

fn to_curve(points: Option<Vec<CurvePoint>>) -> ucc_error::Result<Option<FanCurve>> {
    points.map(FanCurve::from_curve_points).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucc_core::{Breakpoint, DaemonClient, Reading};

    const ROOT: PeerCredentials = PeerCredentials {
        uid: 0,
        gid: 0,
        pid: 1,
    };

    fn state() -> DaemonState {
        DaemonState::new(Arc::new(ControlSettings::default()), FanControlHandle::default())
    }

    fn send(state: &DaemonState, request: Request) -> ResponseEnvelope {
        let line = serde_json::to_string(&RequestEnvelope::with_id(request, 7)).unwrap();
        process_request(&line, &ROOT, state)
    }

    fn ok_data(envelope: ResponseEnvelope) -> ResponseData {
        assert_eq!(envelope.id, 7);
        match envelope.response {
            Response::Ok(data) => data,
            Response::Error { message } => panic!("request failed: {}", message),
        }
    }

    fn error_message(envelope: ResponseEnvelope) -> String {
        match envelope.response {
            Response::Error { message } => message,
            Response::Ok(data) => panic!("expected error, got {:?}", data),
        }
    }

    #[test]
    fn test_ping_and_version() {
        let state = state();
        assert_eq!(ok_data(send(&state, Request::Ping)).value.as_deref(), Some("pong"));
        assert_eq!(
            ok_data(send(&state, Request::Version)).value.as_deref(),
            Some(env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_invalid_json() {
        let envelope = process_request("{nope", &ROOT, &state());
        assert_eq!(envelope.id, 0);
        assert_eq!(error_message(envelope), "Invalid request format");
    }

    #[test]
    fn test_validation_error_keeps_id() {
        let envelope = send(&state(), Request::GetFanData { channel: 99 });
        assert_eq!(envelope.id, 7);
        assert!(!envelope.response.is_ok());
    }

    #[test]
    fn test_fan_data_from_telemetry() {
        let state = state();
        assert!(!send(&state, Request::GetFanData { channel: 0 }).response.is_ok());

        let telemetry = state.fan_control.telemetry();
        telemetry.reset(2);
        telemetry.publish(1, Reading::new(1_000, 64), Reading::new(1_000, 45));

        let fan = ok_data(send(&state, Request::GetFanData { channel: 1 })).fan.unwrap();
        assert_eq!(fan.channel, 1);
        assert_eq!(fan.temp.data, 64);
        assert_eq!(fan.speed.data, 45);
        assert_eq!(fan.speed.timestamp, 1_000);

        let fans = ok_data(send(&state, Request::GetAllFanData)).fans.unwrap();
        assert_eq!(fans.len(), 2);
        assert_eq!(fans[0].speed.data, -1);
        assert_eq!(fans[1].channel, 1);
    }

    #[test]
    fn test_enable_toggle() {
        let state = state();
        ok_data(send(&state, Request::SetFanControlEnabled { enabled: false }));
        assert!(!state.settings.is_enabled());
        let data = ok_data(send(&state, Request::GetFanControlEnabled));
        assert_eq!(data.enabled, Some(false));
    }

    #[test]
    fn test_set_active_profile() {
        let state = state();
        let mut info = ok_data(send(&state, Request::GetActiveProfile)).profile.unwrap();
        assert_eq!(info.fan_profile, "Balanced");

        info.id = "gaming".into();
        info.fan_profile = "Cool".into();
        info.minimum_fanspeed = 30;
        ok_data(send(&state, Request::SetActiveProfile { profile: info }));

        let profile = state.settings.profile();
        assert_eq!(profile.id, "gaming");
        assert_eq!(profile.curve_preset, "Cool");
        assert_eq!(profile.policy.min_speed, 30);
    }

    #[test]
    fn test_set_active_profile_rejects_inverted_limits() {
        let state = state();
        let mut info = ProfileInfo::from(&Profile::default());
        info.minimum_fanspeed = 90;
        info.maximum_fanspeed = 10;
        assert!(!send(&state, Request::SetActiveProfile { profile: info }).response.is_ok());
        assert_eq!(state.settings.profile().policy.max_speed, 100);
    }

    #[test]
    fn test_same_speed() {
        let state = state();
        ok_data(send(&state, Request::SetSameSpeed { same_speed: false }));
        assert!(!state.settings.profile().policy.same_speed);
    }

    #[test]
    fn test_presets_and_preview() {
        let state = state();
        let names = ok_data(send(&state, Request::ListPresets)).presets.unwrap();
        assert!(names.iter().any(|n| n == "Balanced"));

        let speeds = ok_data(send(
            &state,
            Request::PreviewCurve {
                preset: "Balanced".into(),
                gpu: false,
                temperatures: vec![0, 100],
            },
        ))
        .speeds
        .unwrap();
        let curve = PresetLibrary::builtin().resolve("Balanced").curve(ChannelRole::Cpu);
        assert_eq!(speeds, vec![curve.lookup(0), curve.lookup(100)]);

        let message = error_message(send(
            &state,
            Request::PreviewCurve {
                preset: "Turbo".into(),
                gpu: true,
                temperatures: vec![50],
            },
        ));
        assert!(message.contains("Turbo"));
    }

    #[test]
    fn test_temporary_curves() {
        let state = state();
        ok_data(send(
            &state,
            Request::SetTemporaryCurves {
                cpu: Some(vec![CurvePoint { temp: 0, speed: 70 }]),
                gpu: None,
            },
        ));
        assert!(state.fan_control.has_temporary_curves());
        assert!(ok_data(send(&state, Request::GetHardwareInfo))
            .hardware
            .unwrap()
            .temporary_curves_active);

        let curves = state.fan_control.temporary_curves().unwrap();
        assert_eq!(
            curves.cpu.unwrap().breakpoints(),
            &[Breakpoint::new(0, 70)][..]
        );
        assert!(curves.gpu.is_none());

        ok_data(send(&state, Request::ClearTemporaryCurves));
        assert!(!state.fan_control.has_temporary_curves());
    }

    #[test]
    fn test_rate_limiter() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.admit(1000));
        assert!(limiter.admit(1000));
        assert!(!limiter.admit(1000));
        // other users have their own budget
        assert!(limiter.admit(1001));

        let mut limiter = RateLimiter::new(1, Duration::from_millis(1));
        assert!(limiter.admit(1000));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.admit(1000));

        std::thread::sleep(Duration::from_millis(5));
        limiter.prune();
        assert!(limiter.usage.is_empty());
    }

    #[tokio::test]
    async fn test_read_request_line() {
        let input: &[u8] = b"{\"id\":1}\nrest";
        let mut reader = BufReader::new(input);
        let mut line = Vec::new();
        let read = read_request_line(&mut reader, &mut line, 64).await.unwrap();
        assert!(matches!(read, LineRead::Line(9)));
        assert_eq!(line, b"{\"id\":1}\n");

        // unterminated tail is dropped at end of stream
        let read = read_request_line(&mut reader, &mut line, 64).await.unwrap();
        assert!(matches!(read, LineRead::Eof));

        let long = vec![b'x'; 100];
        let mut reader = BufReader::new(&long[..]);
        let read = read_request_line(&mut reader, &mut line, 64).await.unwrap();
        assert!(matches!(read, LineRead::TooLarge));
    }

    #[test]
    fn test_unaddressed_errors() {
        let envelope = unaddressed_error("Rate limit exceeded");
        assert_eq!(envelope.id, 0);
        assert_eq!(error_message(envelope), "Rate limit exceeded");

        let fallback: ResponseEnvelope = serde_json::from_slice(SERIALIZATION_FALLBACK).unwrap();
        assert_eq!(fallback.id, 0);
        assert_eq!(error_message(fallback), "Serialization error");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_client_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("uccd.sock");
        let listener = bind(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SOCKET_MODE);

        let state = Arc::new(state());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state.clone(), async {
            let _ = stop_rx.await;
        }));

        let client_path = path.clone();
        let presets = tokio::task::spawn_blocking(move || {
            let mut client = DaemonClient::connect(&client_path).unwrap();
            client.ping().unwrap();
            client.set_same_speed(false).unwrap();
            client.list_presets().unwrap()
        })
        .await
        .unwrap();

        assert!(presets.contains(&"Quiet".to_string()));
        assert!(!state.settings.profile().policy.same_speed);

        stop_tx.send(()).unwrap();
        server.await.unwrap();
    }
}
