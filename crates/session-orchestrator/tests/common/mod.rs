//! Scripted authority for driving the orchestrator without a network.

use async_trait::async_trait;
use authority_client::{
    Authority, AuthorityError, AuthorityResult, ChallengeResponse, DeviceListResponse,
    EventsResponse, IssueChallengeRequest, RealtimeResponse, StatusResponse, VerifyRequest,
    VerifyResponse,
};
use guard_protocol_types::{SecurityEvent, UsbDevice};
use session_orchestrator::GuardEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// In-memory authority whose answers the tests script directly.
pub struct MockAuthority {
    pub probe_ok: AtomicBool,
    pub monitoring: AtomicBool,
    pub fail_issue: AtomicBool,
    pub devices: Mutex<Vec<UsbDevice>>,
    /// Drained by each `list_new_events` call, like the real incremental
    /// endpoint.
    pub pending_events: Mutex<Vec<SecurityEvent>>,
    pub next_otp: Mutex<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self {
            probe_ok: AtomicBool::new(true),
            monitoring: AtomicBool::new(false),
            fail_issue: AtomicBool::new(false),
            devices: Mutex::new(Vec::new()),
            pending_events: Mutex::new(Vec::new()),
            next_otp: Mutex::new("483920".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_devices(&self, devices: Vec<UsbDevice>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn push_event(&self, event: SecurityEvent) {
        self.pending_events.lock().unwrap().push(event);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn unavailable() -> AuthorityError {
        AuthorityError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl Authority for MockAuthority {
    async fn probe(&self) -> AuthorityResult<StatusResponse> {
        if self.probe_ok.load(Ordering::SeqCst) {
            Ok(StatusResponse::default())
        } else {
            Err(Self::unavailable())
        }
    }

    async fn list_devices(&self) -> AuthorityResult<DeviceListResponse> {
        Ok(DeviceListResponse {
            devices: self.devices.lock().unwrap().clone(),
            monitoring: self.monitoring.load(Ordering::SeqCst),
        })
    }

    async fn realtime_devices(&self) -> AuthorityResult<RealtimeResponse> {
        self.record("realtime_devices");
        Ok(RealtimeResponse {
            devices: self.devices.lock().unwrap().clone(),
        })
    }

    async fn list_new_events(&self) -> AuthorityResult<EventsResponse> {
        Ok(EventsResponse {
            new_events: self.pending_events.lock().unwrap().drain(..).collect(),
            events: Vec::new(),
        })
    }

    async fn start_monitoring(&self, _block_auto_mount: bool) -> AuthorityResult<()> {
        self.record("start_monitoring");
        self.monitoring.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_monitoring(&self) -> AuthorityResult<()> {
        self.record("stop_monitoring");
        self.monitoring.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn enable_protection(&self) -> AuthorityResult<()> {
        self.record("enable_protection");
        Ok(())
    }

    async fn issue_challenge(
        &self,
        _request: IssueChallengeRequest,
    ) -> AuthorityResult<ChallengeResponse> {
        self.record("issue_challenge");
        if self.fail_issue.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(ChallengeResponse {
            otp: self.next_otp.lock().unwrap().clone(),
            qr_code_url: Some("http://127.0.0.1:5000/qr/latest.png".to_string()),
        })
    }

    async fn verify_challenge(&self, request: VerifyRequest) -> AuthorityResult<VerifyResponse> {
        self.record("verify_challenge");
        Ok(VerifyResponse {
            success: request.otp == *self.next_otp.lock().unwrap(),
            message: None,
        })
    }

    async fn set_blocking(&self, block_auto_mount: bool, _system_wide: bool) -> AuthorityResult<()> {
        self.record(if block_auto_mount {
            "set_blocking:true"
        } else {
            "set_blocking:false"
        });
        Ok(())
    }

    async fn block_device_mount(&self, device_id: &str) -> AuthorityResult<()> {
        self.record(&format!("block_device_mount:{}", device_id));
        Ok(())
    }
}

/// Build a device with the given name and serial.
pub fn device(name: &str, serial: &str) -> UsbDevice {
    UsbDevice {
        name: name.to_string(),
        vendor: "0781".to_string(),
        product: "5567".to_string(),
        serial: Some(serial.to_string()),
        mount_path: None,
        blocked: true,
    }
}

/// Collect everything currently buffered on the event stream.
pub fn drain(rx: &mut broadcast::Receiver<GuardEvent>) -> Vec<GuardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
