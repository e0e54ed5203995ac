// User profile
//
// Only populated fields are sent, so a profile can be filled in piece by piece
// across sessions without clearing values set earlier.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::event::Properties;

/// Birthday wire format
const BIRTHDAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The user's profile as known to the SDK
///
/// Obtain the current profile from the tracker, change the public fields, then
/// hand it back through a profile update. Identity fields (user id, client id,
/// device UUID, timezone offset) are managed by the SDK.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    /// Host application's own user id
    pub remote_user_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub birthday: Option<NaiveDateTime>,
    pub custom_values: Option<Properties>,
    /// Push notification token
    pub push_token: Option<String>,

    business_name: Option<String>,
    is_business: Option<bool>,
    client_id: Option<String>,
    user_id: Option<String>,
    tz_offset_minutes: Option<i32>,
    device_uuid: Option<String>,
}

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile generated at startup for a known (or freshly generated) user id
    pub fn generated(
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        device_uuid: Option<String>,
        tz_offset_minutes: i32,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            client_id: Some(client_id.into()),
            device_uuid,
            tz_offset_minutes: Some(tz_offset_minutes),
            ..Default::default()
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn device_uuid(&self) -> Option<&str> {
        self.device_uuid.as_deref()
    }

    pub fn tz_offset_minutes(&self) -> Option<i32> {
        self.tz_offset_minutes
    }

    pub fn business_name(&self) -> Option<&str> {
        self.business_name.as_deref()
    }

    pub fn is_business(&self) -> Option<bool> {
        self.is_business
    }

    /// Set the business name; `is_business` follows whether one is set
    pub fn set_business_name(&mut self, name: Option<String>) {
        self.is_business = Some(name.is_some());
        self.business_name = name;
    }

    /// Fill in identity fields the caller left empty
    pub fn fill_identity(&mut self, user_id: &str, client_id: &str) {
        if self.user_id.is_none() {
            self.user_id = Some(user_id.to_string());
        }
        if self.client_id.is_none() {
            self.client_id = Some(client_id.to_string());
        }
    }

    /// Merge extra custom values, overriding existing keys
    pub fn merge_custom_values(&mut self, values: Properties) {
        if values.is_empty() {
            return;
        }
        self.custom_values
            .get_or_insert_with(Properties::new)
            .extend(values);
    }

    /// JSON body for the profile endpoint
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        let birthday = self
            .birthday
            .map(|b| b.format(BIRTHDAY_FORMAT).to_string());

        serde_json::to_value(ProfilePayload {
            client_id: self.client_id.as_deref(),
            user_id: self.user_id.as_deref(),
            remote_user_id: self.remote_user_id.as_deref(),
            email: self.email.as_deref(),
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            tz_offset: self.tz_offset_minutes,
            push_token: self.push_token.as_deref(),
            device_uuid: self.device_uuid.as_deref(),
            gender: self.gender.as_deref(),
            is_business: self.is_business,
            business_name: self.business_name.as_deref(),
            birthday,
            custom_values: self.custom_values.as_ref(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfilePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tz_offset: Option<i32>,
    #[serde(rename = "androidPushToken", skip_serializing_if = "Option::is_none")]
    push_token: Option<&'a str>,
    #[serde(rename = "deviceUUID", skip_serializing_if = "Option::is_none")]
    device_uuid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_business: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    business_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    birthday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_values: Option<&'a Properties>,
}
