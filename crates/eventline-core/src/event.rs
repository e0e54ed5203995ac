// Event model
//
// An Event is built once with a snapshot of the ambient context. After that only
// two things change: the previous-event linkage (set while pairing) and the
// `sent` flag (set after a successful delivery). Once `sent` is true nothing
// else is touched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved name of the event that starts a new session chain
pub const LAUNCH_EVENT: &str = "launch";

/// Event name used by `register`
pub const REGISTER_EVENT: &str = "register";

/// Event name used by `purchase`
pub const PURCHASE_EVENT: &str = "purchase";

/// Custom event properties
pub type Properties = BTreeMap<String, String>;

/// A purchased item attached to a purchase event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Caller-defined item id
    pub id: String,

    /// Product name
    #[serde(rename = "n", alias = "name")]
    pub name: String,

    /// Unit price
    #[serde(rename = "pr", alias = "price")]
    pub price: f64,

    /// Quantity purchased
    #[serde(rename = "q", alias = "quantity")]
    pub quantity: i32,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64, quantity: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
        }
    }
}

/// Ambient context captured when the event was built
///
/// Every field is optional so that logs written by older builds still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    /// Whole seconds since the session started
    pub session_duration_secs: Option<f64>,
    pub timezone: Option<String>,
    pub tz_offset_minutes: Option<i32>,
    pub lib_version: Option<String>,
    pub os: Option<String>,
    /// Device manufacturer
    pub browser: Option<String>,
    /// OS release
    pub browser_version: Option<String>,
    pub device: Option<String>,
    pub language: Option<String>,
    pub ref_domain: Option<String>,
}

/// A single tracked occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_name: String,
    #[serde(default)]
    previous_event_name: Option<String>,
    timestamp_millis: i64,
    #[serde(default)]
    previous_timestamp_millis: Option<i64>,
    #[serde(default)]
    properties: Option<Properties>,
    #[serde(default)]
    purchased_items: Option<Vec<Item>>,
    #[serde(default)]
    sent: bool,
    #[serde(default)]
    context: EventContext,
}

impl Event {
    /// Create an unsent event with no previous-event linkage
    pub fn new(name: impl Into<String>, timestamp_millis: i64, context: EventContext) -> Self {
        Self {
            event_name: name.into(),
            previous_event_name: None,
            timestamp_millis,
            previous_timestamp_millis: None,
            properties: None,
            purchased_items: None,
            sent: false,
            context,
        }
    }

    /// Attach custom properties
    pub fn with_properties(mut self, properties: Option<Properties>) -> Self {
        self.properties = properties;
        self
    }

    /// Append purchased items, creating the list if needed
    pub fn with_items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        self.purchased_items
            .get_or_insert_with(Vec::new)
            .extend(items);
        self
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn previous_event_name(&self) -> Option<&str> {
        self.previous_event_name.as_deref()
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub fn previous_timestamp_millis(&self) -> Option<i64> {
        self.previous_timestamp_millis
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    pub fn purchased_items(&self) -> Option<&[Item]> {
        self.purchased_items.as_deref()
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Whether this is the reserved launch event
    pub fn is_launch(&self) -> bool {
        self.event_name == LAUNCH_EVENT
    }

    /// Whether every float in the event is finite
    ///
    /// JSON has no representation for NaN or infinity.
    pub fn has_finite_numbers(&self) -> bool {
        let items_finite = self
            .purchased_items
            .iter()
            .flatten()
            .all(|item| item.price.is_finite());
        let duration_finite = self
            .context
            .session_duration_secs
            .map_or(true, f64::is_finite);
        items_finite && duration_finite
    }

    /// Record a successful delivery
    pub fn mark_sent(&mut self) {
        self.sent = true;
    }

    /// Forget any previous delivery, used when an event is first admitted to the log
    pub fn reset_sent(&mut self) {
        self.sent = false;
    }

    /// Link this event to its predecessor
    ///
    /// Launch events never inherit a predecessor and sent events are frozen.
    /// Returns whether the linkage was written.
    pub fn link_previous(&mut self, previous: &Event) -> bool {
        if self.sent || self.is_launch() {
            return false;
        }
        self.previous_event_name = Some(previous.event_name.clone());
        self.previous_timestamp_millis = Some(previous.timestamp_millis);
        true
    }

    /// JSON body for the event endpoint
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(EventPayload::from(self))
    }
}

/// Wire format expected by the collector
#[derive(Serialize)]
struct EventPayload<'a> {
    #[serde(rename = "e")]
    event_name: &'a str,
    #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
    previous_event_name: Option<&'a str>,
    #[serde(rename = "ts")]
    timestamp: i64,
    #[serde(rename = "pTs", skip_serializing_if = "Option::is_none")]
    previous_timestamp: Option<i64>,
    #[serde(rename = "uId", skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(rename = "cId", skip_serializing_if = "Option::is_none")]
    client_id: Option<&'a str>,
    #[serde(rename = "sId", skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(rename = "sessDuration", skip_serializing_if = "Option::is_none")]
    session_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<&'a str>,
    #[serde(rename = "tzOffset", skip_serializing_if = "Option::is_none")]
    tz_offset: Option<i32>,
    #[serde(rename = "libVer", skip_serializing_if = "Option::is_none")]
    lib_version: Option<&'a str>,
    #[serde(rename = "refDomain", skip_serializing_if = "Option::is_none")]
    ref_domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    browser: Option<&'a str>,
    #[serde(rename = "browserVersion", skip_serializing_if = "Option::is_none")]
    browser_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    os: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
    #[serde(rename = "lang", skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
    #[serde(rename = "customValues", skip_serializing_if = "Option::is_none")]
    custom_values: Option<&'a Properties>,
    #[serde(rename = "pItems", skip_serializing_if = "Option::is_none")]
    purchased_items: Option<&'a [Item]>,
}

impl<'a> From<&'a Event> for EventPayload<'a> {
    fn from(event: &'a Event) -> Self {
        let ctx = &event.context;
        Self {
            event_name: &event.event_name,
            previous_event_name: event.previous_event_name.as_deref(),
            timestamp: event.timestamp_millis,
            previous_timestamp: event.previous_timestamp_millis,
            user_id: ctx.user_id.as_deref(),
            client_id: ctx.client_id.as_deref(),
            session_id: ctx.session_id.as_deref(),
            session_duration: ctx.session_duration_secs,
            timezone: ctx.timezone.as_deref(),
            tz_offset: ctx.tz_offset_minutes,
            lib_version: ctx.lib_version.as_deref(),
            ref_domain: ctx.ref_domain.as_deref(),
            browser: ctx.browser.as_deref(),
            browser_version: ctx.browser_version.as_deref(),
            os: ctx.os.as_deref(),
            device: ctx.device.as_deref(),
            language: ctx.language.as_deref(),
            custom_values: event.properties.as_ref(),
            purchased_items: event.purchased_items.as_deref(),
        }
    }
}
