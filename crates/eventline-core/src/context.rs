//! Session and device context shared by every event builder
//!
//! One [`SdkContext`] exists per tracker. It is created at initialization,
//! mutated when the app returns to the foreground (new session), and read each
//! time an event is built.

use chrono::{Local, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::profile::UserProfile;

/// Library version reported with every event
pub const LIB_VERSION: &str = concat!("rust_", env!("CARGO_PKG_VERSION"));

/// Device and locale facts supplied by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub os: Option<String>,
    pub manufacturer: Option<String>,
    pub os_release: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    /// IANA timezone id, e.g. "Europe/Ljubljana"
    pub timezone: Option<String>,
    pub device_uuid: Option<String>,
    pub ref_domain: Option<String>,
}

impl DeviceInfo {
    /// Best-effort detection from the running process
    ///
    /// Environment variables:
    /// - `TZ`: timezone id
    /// - `LANG`: locale, the language part is kept (`en_US.UTF-8` -> `en`)
    pub fn detect() -> Self {
        let language = std::env::var("LANG").ok().and_then(|lang| {
            lang.split(['_', '.'])
                .next()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
        });

        Self {
            os: Some(std::env::consts::OS.to_string()),
            language,
            timezone: std::env::var("TZ").ok().filter(|tz| !tz.is_empty()),
            ..Default::default()
        }
    }
}

/// Current session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub started_at_millis: i64,
}

impl Session {
    fn start() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at_millis: Utc::now().timestamp_millis(),
        }
    }
}

/// Process-wide SDK state, passed explicitly to whoever needs it
#[derive(Debug)]
pub struct SdkContext {
    token: String,
    lib_version: String,
    device: DeviceInfo,
    session: RwLock<Session>,
    profile: RwLock<UserProfile>,
}

impl SdkContext {
    /// Create the context and open the first session
    pub fn new(token: impl Into<String>, device: DeviceInfo, profile: UserProfile) -> Self {
        Self {
            token: token.into(),
            lib_version: LIB_VERSION.to_string(),
            device,
            session: RwLock::new(Session::start()),
            profile: RwLock::new(profile),
        }
    }

    /// Client token issued by the collector
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn lib_version(&self) -> &str {
        &self.lib_version
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Replace the current session with a fresh one
    pub fn start_session(&self) -> Session {
        let session = Session::start();
        *self.session.write() = session.clone();
        info!(session_id = %session.id, "Started new session");
        session
    }

    pub fn profile(&self) -> UserProfile {
        self.profile.read().clone()
    }

    pub fn set_profile(&self, profile: UserProfile) {
        *self.profile.write() = profile;
    }
}

/// Local UTC offset in minutes
pub fn local_tz_offset_minutes() -> i32 {
    Local::now().offset().local_minus_utc() / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_session_replaces_id() {
        let ctx = SdkContext::new("token", DeviceInfo::default(), UserProfile::new());
        let first = ctx.session();
        let second = ctx.start_session();

        assert_ne!(first.id, second.id);
        assert_eq!(ctx.session(), second);
        assert!(second.started_at_millis >= first.started_at_millis);
    }

    #[test]
    fn test_lib_version_prefix() {
        let ctx = SdkContext::new("token", DeviceInfo::default(), UserProfile::new());
        assert!(ctx.lib_version().starts_with("rust_"));
        assert_eq!(ctx.token(), "token");
    }

    #[test]
    fn test_detect_reports_os() {
        let device = DeviceInfo::detect();
        assert_eq!(device.os.as_deref(), Some(std::env::consts::OS));
    }
}
