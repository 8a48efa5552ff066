//! Daemon Client
//!
//! Blocking client for the uccd Unix socket. Requests are validated before
//! they are sent; responses are checked for a matching id and payload.

use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use crate::constants::ipc;
use crate::engine::FanCurve;
use crate::error::{Result, UccError};
use ucc_protocol::{
    FanData, HardwareInfo, ProfileInfo, Request, RequestEnvelope, Response, ResponseData,
    ResponseEnvelope, MAX_MESSAGE_SIZE,
};

/// Initial buffer size for responses
const INITIAL_BUFFER_SIZE: usize = 1024;

/// Check if the daemon socket exists
pub fn is_daemon_available(socket_path: &Path) -> bool {
    socket_path.exists()
}

/// Connection to the daemon
pub struct DaemonClient {
    socket_path: PathBuf,
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

impl DaemonClient {
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&socket_path).map_err(|e| {
            UccError::DaemonConnection(format!(
                "failed to connect to {}: {}",
                socket_path.display(),
                e
            ))
        })?;

        stream.set_read_timeout(Some(ipc::READ_TIMEOUT))?;
        stream.set_write_timeout(Some(ipc::WRITE_TIMEOUT))?;
        let reader_stream = stream.try_clone()?;

        Ok(Self {
            socket_path,
            writer: stream,
            reader: BufReader::new(reader_stream),
        })
    }

    /// Send a request and return the payload of an `ok` response
    ///
    /// A broken connection is re-established once.
    pub fn request(&mut self, req: Request) -> Result<ResponseData> {
        self.request_with_retry(req, true)
    }

    fn request_with_retry(&mut self, req: Request, allow_retry: bool) -> Result<ResponseData> {
        req.validate()
            .map_err(|e| UccError::DaemonRequest(format!("request validation failed: {}", e)))?;

        let envelope = RequestEnvelope::new(req);
        let request_id = envelope.id;

        let mut json = serde_json::to_vec(&envelope)?;
        json.push(b'\n');
        if json.len() > MAX_MESSAGE_SIZE {
            return Err(UccError::MessageTooLarge {
                size: json.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        // one byte past the limit is enough to detect an oversized line
        let read_limit = (MAX_MESSAGE_SIZE + 1) as u64;
        let mut response_buf: Vec<u8> = Vec::with_capacity(INITIAL_BUFFER_SIZE);
        let io_result = self.writer.write_all(&json).and_then(|_| {
            (&mut self.reader)
                .take(read_limit)
                .read_until(b'\n', &mut response_buf)
        });

        if let Err(e) = io_result {
            if allow_retry {
                tracing::debug!(error = %e, "Daemon connection broken, reconnecting");
                let socket_path = self.socket_path.clone();
                *self = Self::connect(socket_path)?;
                return self.request_with_retry(envelope.request, false);
            }
            return Err(UccError::DaemonConnection(format!("request failed: {}", e)));
        }

        if response_buf.is_empty() {
            return Err(UccError::DaemonConnection("daemon closed connection".to_string()));
        }
        if response_buf.len() > MAX_MESSAGE_SIZE {
            return Err(UccError::MessageTooLarge {
                size: response_buf.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }
        if response_buf.last() == Some(&b'\n') {
            response_buf.pop();
        }

        let response: ResponseEnvelope = serde_json::from_slice(&response_buf)?;
        if response.id != request_id {
            return Err(UccError::IpcProtocol(format!(
                "response id mismatch: expected {}, got {}",
                request_id, response.id
            )));
        }

        match response.response {
            Response::Error { message } => Err(UccError::DaemonRequest(message)),
            Response::Ok(data) => {
                verify_response_type(&envelope.request, &data)?;
                Ok(data)
            }
        }
    }

    pub fn ping(&mut self) -> Result<()> {
        self.request(Request::Ping).map(|_| ())
    }

    pub fn version(&mut self) -> Result<String> {
        self.request(Request::Version)?.value.ok_or_else(unexpected)
    }

    pub fn fan_data(&mut self, channel: u32) -> Result<FanData> {
        self.request(Request::GetFanData { channel })?.fan.ok_or_else(unexpected)
    }

    pub fn all_fan_data(&mut self) -> Result<Vec<FanData>> {
        self.request(Request::GetAllFanData)?.fans.ok_or_else(unexpected)
    }

    pub fn hardware_info(&mut self) -> Result<HardwareInfo> {
        self.request(Request::GetHardwareInfo)?.hardware.ok_or_else(unexpected)
    }

    pub fn fan_control_enabled(&mut self) -> Result<bool> {
        self.request(Request::GetFanControlEnabled)?.enabled.ok_or_else(unexpected)
    }

    pub fn set_fan_control_enabled(&mut self, enabled: bool) -> Result<()> {
        self.request(Request::SetFanControlEnabled { enabled }).map(|_| ())
    }

    pub fn active_profile(&mut self) -> Result<ProfileInfo> {
        self.request(Request::GetActiveProfile)?.profile.ok_or_else(unexpected)
    }

    pub fn set_active_profile(&mut self, profile: ProfileInfo) -> Result<()> {
        self.request(Request::SetActiveProfile { profile }).map(|_| ())
    }

    pub fn set_same_speed(&mut self, same_speed: bool) -> Result<()> {
        self.request(Request::SetSameSpeed { same_speed }).map(|_| ())
    }

    pub fn list_presets(&mut self) -> Result<Vec<String>> {
        self.request(Request::ListPresets)?.presets.ok_or_else(unexpected)
    }

    /// Speeds of a preset's CPU or GPU curve at the given temperatures
    pub fn preview_curve(&mut self, preset: &str, gpu: bool, temperatures: Vec<i32>) -> Result<Vec<i32>> {
        self.request(Request::PreviewCurve {
            preset: preset.to_string(),
            gpu,
            temperatures,
        })?
        .speeds
        .ok_or_else(unexpected)
    }

    pub fn set_temporary_curves(&mut self, cpu: Option<&FanCurve>, gpu: Option<&FanCurve>) -> Result<()> {
        self.request(Request::SetTemporaryCurves {
            cpu: cpu.map(FanCurve::to_curve_points),
            gpu: gpu.map(FanCurve::to_curve_points),
        })
        .map(|_| ())
    }

    pub fn clear_temporary_curves(&mut self) -> Result<()> {
        self.request(Request::ClearTemporaryCurves).map(|_| ())
    }
}

fn unexpected() -> UccError {
    UccError::IpcProtocol("unexpected response type".to_string())
}

/// Verify that the response payload matches the request
fn verify_response_type(req: &Request, data: &ResponseData) -> Result<()> {
    let valid = match req {
        Request::Ping | Request::Version => data.value.is_some(),
        Request::GetFanData { .. } => data.fan.is_some(),
        Request::GetAllFanData => data.fans.is_some(),
        Request::GetHardwareInfo => data.hardware.is_some(),
        Request::GetFanControlEnabled => data.enabled.is_some(),
        Request::GetActiveProfile => data.profile.is_some(),
        Request::ListPresets => data.presets.is_some(),
        Request::PreviewCurve { .. } => data.speeds.is_some(),
        // Commands that return empty response
        _ => true,
    };

    if !valid {
        return Err(UccError::IpcProtocol(format!(
            "response type mismatch: got {:?} for request {}",
            data,
            req.type_name()
        )));
    }
    Ok(())
}
