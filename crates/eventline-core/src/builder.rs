// Event builder
//
// Turns a name and optional properties into an Event, stamping it with a
// snapshot of the session and device context at the moment of the call.

use chrono::Utc;

use crate::context::{local_tz_offset_minutes, SdkContext};
use crate::error::{CoreError, Result};
use crate::event::{Event, EventContext, Item, Properties, PURCHASE_EVENT};

/// Builds events against a shared context
#[derive(Debug, Clone, Copy)]
pub struct EventBuilder<'a> {
    context: &'a SdkContext,
}

impl<'a> EventBuilder<'a> {
    pub fn new(context: &'a SdkContext) -> Self {
        Self { context }
    }

    /// Build a plain event
    pub fn event(&self, name: impl Into<String>, properties: Option<Properties>) -> Result<Event> {
        let now = Utc::now().timestamp_millis();
        let snapshot = self.snapshot(now)?;
        Ok(Event::new(name, now, snapshot).with_properties(properties))
    }

    /// Build a purchase event carrying the given items
    ///
    /// Fails if an item price is NaN or infinite.
    pub fn purchase(&self, items: Vec<Item>, properties: Option<Properties>) -> Result<Event> {
        if let Some(item) = items.iter().find(|item| !item.price.is_finite()) {
            return Err(CoreError::InvalidItem {
                id: item.id.clone(),
                reason: format!("price {} is not a finite number", item.price),
            });
        }
        Ok(self.event(PURCHASE_EVENT, properties)?.with_items(items))
    }

    fn snapshot(&self, now_millis: i64) -> Result<EventContext> {
        let profile = self.context.profile();
        let user_id = profile
            .user_id()
            .ok_or_else(|| CoreError::config("user profile not initialized"))?
            .to_string();

        let session = self.context.session();
        // Whole seconds, reported as a float
        let session_duration_secs = ((now_millis - session.started_at_millis).max(0) / 1000) as f64;
        let device = self.context.device();

        Ok(EventContext {
            user_id: Some(user_id),
            session_id: Some(session.id),
            client_id: Some(self.context.token().to_string()),
            session_duration_secs: Some(session_duration_secs),
            timezone: device.timezone.clone(),
            tz_offset_minutes: Some(local_tz_offset_minutes()),
            lib_version: Some(self.context.lib_version().to_string()),
            os: device.os.clone(),
            browser: device.manufacturer.clone(),
            browser_version: device.os_release.clone(),
            device: device.model.clone(),
            language: device.language.clone(),
            ref_domain: device.ref_domain.clone(),
        })
    }
}
