use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::callbacks::{OnBreadcrumbCallback, OnErrorCallback, OnSessionCallback};
use crate::constants::{
    DEFAULT_MAX_BREADCRUMBS, DEFAULT_NOTIFY_ENDPOINT, DEFAULT_SESSIONS_ENDPOINT, VERSION,
};
use crate::delivery::DeliveryOutcome;
use crate::event::{Fault, SourceProvider};
use crate::logger::{LogLogger, Logger};
use crate::protocol::{App, Breadcrumb, BreadcrumbType, Device, Event, Metadata, Session, User};
use crate::{Plugin, TransportFactory};

/// Type alias for the handler invoked after an uncaught fault was processed.
///
/// It receives the original fault and the outcome of its delivery, whether
/// or not delivery succeeded.
pub type OnUncaughtCallback = Arc<dyn Fn(&dyn Fault, &DeliveryOutcome) + Send + Sync>;

/// The collection endpoints payloads are sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Where event payloads go.
    pub notify: String,
    /// Where session payloads go.
    pub sessions: String,
}

impl Default for Endpoints {
    fn default() -> Endpoints {
        Endpoints {
            notify: DEFAULT_NOTIFY_ENDPOINT.into(),
            sessions: DEFAULT_SESSIONS_ENDPOINT.into(),
        }
    }
}

/// Configuration settings for the client.
///
/// # Examples
///
/// ```
/// let _options = faultline_core::ClientOptions {
///     api_key: Some("0123456789abcdef0123456789abcdef".into()),
///     debug: true,
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    // Common options
    /// The API key events are reported for.
    pub api_key: Option<String>,
    /// Enables internal diagnostics on the `faultline` log target.
    pub debug: bool,
    /// The application descriptor attached to every event.
    pub app: App,
    /// The device descriptor attached to every event.
    pub device: Device,
    /// Only report events for these release stages.  `None` reports all.
    pub enabled_release_stages: Option<Vec<String>>,
    /// Maximum number of breadcrumbs. (defaults to 25, at most 100)
    pub max_breadcrumbs: usize,
    /// Only record breadcrumbs of these types.  `None` records all.
    pub enabled_breadcrumb_types: Option<Vec<BreadcrumbType>>,
    /// The initial context of the client.
    pub context: Option<String>,
    /// The initial user of the client.
    pub user: User,
    /// The initial metadata of the client.
    pub metadata: Metadata,
    /// Start a session as soon as the client is created.
    pub auto_track_sessions: bool,
    // Hooks
    /// Hooks run against every event before delivery.
    pub on_error: Vec<OnErrorCallback>,
    /// Hooks run against every breadcrumb before it is stored.
    pub on_breadcrumb: Vec<OnBreadcrumbCallback>,
    /// Hooks run against every session before it starts.
    pub on_session: Vec<OnSessionCallback>,
    /// Called once an uncaught fault has been processed.
    pub on_uncaught: Option<OnUncaughtCallback>,
    // Plugins
    /// Plugins loaded into the client.
    pub plugins: Vec<Arc<dyn Plugin>>,
    // Transport options
    /// The transport to use.
    ///
    /// This is typically either a boxed function taking the client options by
    /// reference and returning a `Transport`, or an `Arc<Transport>`.
    pub transport: Option<Arc<dyn TransportFactory>>,
    /// The collection endpoints.
    pub endpoints: Endpoints,
    /// The timeout on client drop for draining events on shutdown.
    pub shutdown_timeout: Duration,
    // Other options
    /// Receives diagnostics about swallowed failures.
    pub logger: Arc<dyn Logger>,
    /// Provides source for frameless faults that know their origin.
    pub source_provider: Option<Arc<dyn SourceProvider>>,
}

impl ClientOptions {
    /// Creates new Options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options from the environment.
    ///
    /// Reads `FAULTLINE_API_KEY`, `FAULTLINE_RELEASE_STAGE` and
    /// `FAULTLINE_APP_VERSION`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.api_key = env::var("FAULTLINE_API_KEY").ok();
        options.app.release_stage = env::var("FAULTLINE_RELEASE_STAGE").ok();
        options.app.version = env::var("FAULTLINE_APP_VERSION").ok();
        options
    }

    /// Adds a plugin to the options.
    ///
    /// # Examples
    ///
    /// ```
    /// struct MyPlugin;
    ///
    /// impl faultline_core::Plugin for MyPlugin {}
    ///
    /// let options = faultline_core::ClientOptions::new().add_plugin(MyPlugin);
    /// assert_eq!(options.plugins.len(), 1);
    /// ```
    pub fn add_plugin<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Adds an `on_error` hook.
    pub fn add_on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Event) -> bool + Send + Sync + 'static,
    {
        self.on_error.push(Arc::new(f));
        self
    }

    /// Adds an `on_breadcrumb` hook.
    pub fn add_on_breadcrumb<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Breadcrumb) -> bool + Send + Sync + 'static,
    {
        self.on_breadcrumb.push(Arc::new(f));
        self
    }

    /// Adds an `on_session` hook.
    pub fn add_on_session<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Session) -> bool + Send + Sync + 'static,
    {
        self.on_session.push(Arc::new(f));
        self
    }

    /// Sets the handler called after uncaught faults.
    pub fn set_on_uncaught<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Fault, &DeliveryOutcome) + Send + Sync + 'static,
    {
        self.on_uncaught = Some(Arc::new(f));
        self
    }

    /// Sets the transport factory.
    pub fn set_transport<F>(mut self, transport: F) -> Self
    where
        F: TransportFactory + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the logger.
    pub fn set_logger<L: Logger + 'static>(mut self, logger: L) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Sets the source provider.
    pub fn set_source_provider<S: SourceProvider + 'static>(mut self, provider: S) -> Self {
        self.source_provider = Some(Arc::new(provider));
        self
    }

    /// The release stage events are reported with.
    pub fn release_stage(&self) -> &str {
        self.app
            .release_stage
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_RELEASE_STAGE)
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct TransportFactory;
        let transport = self.transport.as_ref().map(|_| TransportFactory);
        #[derive(Debug)]
        struct OnUncaught;
        let on_uncaught = self.on_uncaught.as_ref().map(|_| OnUncaught);

        let plugins: Vec<_> = self.plugins.iter().map(|p| p.name()).collect();

        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key)
            .field("debug", &self.debug)
            .field("app", &self.app)
            .field("device", &self.device)
            .field("enabled_release_stages", &self.enabled_release_stages)
            .field("max_breadcrumbs", &self.max_breadcrumbs)
            .field("enabled_breadcrumb_types", &self.enabled_breadcrumb_types)
            .field("context", &self.context)
            .field("user", &self.user)
            .field("metadata", &self.metadata)
            .field("auto_track_sessions", &self.auto_track_sessions)
            .field("on_error", &self.on_error.len())
            .field("on_breadcrumb", &self.on_breadcrumb.len())
            .field("on_session", &self.on_session.len())
            .field("on_uncaught", &on_uncaught)
            .field("plugins", &plugins)
            .field("transport", &transport)
            .field("endpoints", &self.endpoints)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("source_provider", &self.source_provider.is_some())
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> ClientOptions {
        ClientOptions {
            api_key: None,
            debug: false,
            app: App::default(),
            device: default_device(),
            enabled_release_stages: None,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
            enabled_breadcrumb_types: None,
            context: None,
            user: User::default(),
            metadata: Metadata::default(),
            auto_track_sessions: false,
            on_error: vec![],
            on_breadcrumb: vec![],
            on_session: vec![],
            on_uncaught: None,
            plugins: vec![],
            transport: None,
            endpoints: Endpoints::default(),
            shutdown_timeout: Duration::from_secs(2),
            logger: Arc::new(LogLogger),
            source_provider: None,
        }
    }
}

impl From<&str> for ClientOptions {
    fn from(api_key: &str) -> ClientOptions {
        ClientOptions::from(api_key.to_owned())
    }
}

impl From<String> for ClientOptions {
    fn from(api_key: String) -> ClientOptions {
        ClientOptions {
            api_key: Some(api_key),
            ..Default::default()
        }
    }
}

fn default_device() -> Device {
    let mut device = Device {
        os_name: Some(env::consts::OS.into()),
        arch: Some(env::consts::ARCH.into()),
        ..Default::default()
    };
    device
        .runtime_versions
        .insert("faultline".into(), VERSION.into());
    #[cfg(feature = "device-info")]
    {
        device.hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok());
    }
    device
}
