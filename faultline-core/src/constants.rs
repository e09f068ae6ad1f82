use crate::protocol::Notifier;

/// The version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The breadcrumb capacity used when none is configured.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 25;

/// The largest breadcrumb capacity a client accepts.
pub const MAX_BREADCRUMBS_LIMIT: usize = 100;

/// How many nested causes are turned into error descriptors.
pub const MAX_CAUSE_DEPTH: usize = 10;

/// The default endpoint for event payloads.
pub const DEFAULT_NOTIFY_ENDPOINT: &str = "https://notify.bugsnag.com/";

/// The default endpoint for session payloads.
pub const DEFAULT_SESSIONS_ENDPOINT: &str = "https://sessions.bugsnag.com/";

/// The release stage assumed when none is configured.
pub const DEFAULT_RELEASE_STAGE: &str = "production";

lazy_static::lazy_static! {
    pub static ref USER_AGENT: String = format!("faultline.rust/{}", VERSION);
    pub static ref NOTIFIER: Notifier = Notifier {
        name: "faultline.rust".into(),
        version: VERSION.into(),
        url: "https://github.com/faultline-rs/faultline".into(),
    };
}
