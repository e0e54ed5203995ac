// Eventline core model
//
// Events, purchased items, the user profile, the shared session context and
// the event builder. Nothing here performs I/O; persistence lives in
// eventline-storage and transport in eventline-delivery.

pub mod builder;
pub mod context;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod profile;

pub use builder::EventBuilder;
pub use context::{local_tz_offset_minutes, DeviceInfo, SdkContext, Session, LIB_VERSION};
pub use error::{CoreError, Result};
pub use event::{
    Event, EventContext, Item, Properties, LAUNCH_EVENT, PURCHASE_EVENT, REGISTER_EVENT,
};
pub use lifecycle::{AppLifecycleSource, ForegroundListener, ManualLifecycle};
pub use profile::UserProfile;
