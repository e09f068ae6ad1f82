use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, RefUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::breadcrumbs::{flatten_metadata, BreadcrumbStore};
use crate::callbacks::{run_hook, CallbackChain, Hook, HookId, HookKind, OnErrorCallback};
use crate::constants::{MAX_BREADCRUMBS_LIMIT, NOTIFIER};
use crate::delivery::{Delivery, DeliveryCallback, DeliveryOutcome};
use crate::error::ConfigError;
use crate::event::{build_event, ErrorFault, Fault};
use crate::logger::{DisplayPanic, Logger};
use crate::plugin::PluginRegistry;
use crate::protocol::{
    App, Breadcrumb, BreadcrumbType, Event, EventPayload, Map, Metadata, MetadataTab, Session,
    SessionPayload, SessionStart, Severity, SeverityReason, SeverityReasonType, User, Value,
};
use crate::session::{new_session, SessionTracker};
use crate::types::Utc;
use crate::{ClientOptions, Plugin};

/// Receives the final outcome of a single `notify` call.
pub type CompletionCallback = Box<dyn FnOnce(DeliveryOutcome) + Send>;

/// How an uncaught fault reached the client.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UncaughtKind {
    /// An exception nobody caught.
    Exception,
    /// A rejected promise or future nobody awaited.
    PromiseRejection,
    /// A panic.
    Panic,
}

impl UncaughtKind {
    fn reason(self) -> SeverityReasonType {
        match self {
            UncaughtKind::Exception => SeverityReasonType::UnhandledException,
            UncaughtKind::PromiseRejection => SeverityReasonType::UnhandledPromiseRejection,
            UncaughtKind::Panic => SeverityReasonType::UnhandledPanic,
        }
    }
}

impl TryFrom<ClientOptions> for Client {
    type Error = ConfigError;

    fn try_from(options: ClientOptions) -> Result<Client, ConfigError> {
        Client::with_options(options)
    }
}

#[derive(Debug, Default)]
struct ClientState {
    context: Option<String>,
    user: User,
    metadata: Metadata,
}

/// The faultline client.
///
/// The client turns faults into events, enriches them with its state, runs
/// the registered hooks and hands kept events to the configured
/// [`Transport`](crate::Transport).  It is `Send + Sync` and meant to be
/// shared, usually behind an `Arc`.
///
/// # Examples
///
/// ```
/// use faultline_core::{Client, ClientOptions, RawFault};
///
/// let client = Client::with_options("0123456789abcdef0123456789abcdef".into()).unwrap();
/// client.set_context(Some("checkout".into()));
/// client.notify(&RawFault::new("PaymentError", "card declined"));
/// ```
pub struct Client {
    options: ClientOptions,
    api_key: String,
    delivery: Delivery,
    breadcrumbs: BreadcrumbStore,
    sessions: SessionTracker,
    on_error: CallbackChain<Event>,
    on_breadcrumb: CallbackChain<Breadcrumb>,
    on_session: CallbackChain<Session>,
    state: RwLock<ClientState>,
    plugins: PluginRegistry,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .field("delivery", &self.delivery)
            .field("plugins", &self.plugins)
            .finish()
    }
}

fn is_valid_api_key(api_key: &str) -> bool {
    api_key.len() == 32 && api_key.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_valid_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with("https://") || endpoint.starts_with("http://")
}

impl Client {
    /// Creates a new client for the given options.
    ///
    /// Fails if the options carry no API key or an endpoint that is not an
    /// http(s) URL.  A breadcrumb limit above 100 is clamped and an API key
    /// that does not look like one is only warned about.
    pub fn with_options(mut options: ClientOptions) -> Result<Client, ConfigError> {
        faultline_debug!(
            options.debug,
            "[Client] Creating new client with options: debug={}, release_stage={}",
            options.debug,
            options.release_stage()
        );

        let api_key = match options.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_owned(),
            _ => return Err(ConfigError::MissingApiKey),
        };
        if !is_valid_api_key(&api_key) {
            options
                .logger
                .warn(&format!("API key `{}` is not a 32 character hex string", api_key));
        }

        for endpoint in [&options.endpoints.notify, &options.endpoints.sessions] {
            if !is_valid_endpoint(endpoint) {
                return Err(ConfigError::InvalidEndpoint(endpoint.clone()));
            }
        }

        if options.max_breadcrumbs > MAX_BREADCRUMBS_LIMIT {
            options.logger.warn(&format!(
                "max_breadcrumbs of {} is above the limit, using {}",
                options.max_breadcrumbs, MAX_BREADCRUMBS_LIMIT
            ));
            options.max_breadcrumbs = MAX_BREADCRUMBS_LIMIT;
        }

        let transport = options
            .transport
            .as_ref()
            .map(|factory| factory.create_transport(&options));
        if transport.is_some() {
            faultline_debug!(options.debug, "[Client] Transport created successfully");
        } else {
            faultline_debug!(
                options.debug,
                "[Client] No transport available (deliveries will fail)"
            );
        }

        let on_error = CallbackChain::new(HookKind::OnError);
        for hook in options.on_error.iter() {
            on_error.register(hook.clone());
        }
        let on_breadcrumb = CallbackChain::new(HookKind::OnBreadcrumb);
        for hook in options.on_breadcrumb.iter() {
            on_breadcrumb.register(hook.clone());
        }
        let on_session = CallbackChain::new(HookKind::OnSession);
        for hook in options.on_session.iter() {
            on_session.register(hook.clone());
        }

        let state = ClientState {
            context: options.context.clone(),
            user: options.user.clone(),
            metadata: options.metadata.clone(),
        };

        let client = Client {
            api_key,
            delivery: Delivery::new(transport, options.logger.clone(), options.debug),
            breadcrumbs: BreadcrumbStore::new(options.max_breadcrumbs),
            sessions: SessionTracker::new(),
            on_error,
            on_breadcrumb,
            on_session,
            state: RwLock::new(state),
            plugins: PluginRegistry::new(&options.plugins),
            options,
        };

        faultline_debug!(
            client.options.debug,
            "[Client] Loading {} plugins",
            client.plugins.names().len()
        );
        for plugin in client.plugins.iter() {
            faultline_debug!(
                client.options.debug,
                "[Client] Loading plugin: {}",
                plugin.name()
            );
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| plugin.load(&client))) {
                client.logger().error(&format!(
                    "plugin `{}` panicked while loading: {}",
                    plugin.name(),
                    DisplayPanic(&*payload)
                ));
            }
        }

        if client.options.auto_track_sessions {
            client.start_session();
        }

        faultline_debug!(client.options.debug, "[Client] Client initialization complete");
        Ok(client)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ClientState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ClientState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the options of this client.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the logger swallowed failures are reported to.
    pub fn logger(&self) -> &dyn Logger {
        &*self.options.logger
    }

    /// Quick check to see if the client has a transport.
    pub fn is_enabled(&self) -> bool {
        self.delivery.is_enabled()
    }

    /// Reports a handled fault.
    ///
    /// Returns `true` if the event was handed to the transport and `false`
    /// if it was discarded.
    pub fn notify(&self, fault: &dyn Fault) -> bool {
        self.notify_with(fault, None, None)
    }

    /// Reports a handled `std::error::Error`, including its sources.
    pub fn notify_error<E: Error + ?Sized>(&self, error: &E) -> bool {
        self.notify(&ErrorFault::new(error))
    }

    /// Reports a handled fault with a severity other than `warning`.
    pub fn notify_with_severity(&self, fault: &dyn Fault, severity: Severity) -> bool {
        let reason = SeverityReason::new(SeverityReasonType::UserSpecifiedSeverity);
        self.notify_inner(fault, severity, reason, None, None)
    }

    /// Reports a handled fault with an extra hook and a completion handler.
    ///
    /// `on_error` runs after the client's own `on_error` hooks and only
    /// affects this event.  `on_complete` is called exactly once with the
    /// outcome, including [`DeliveryOutcome::Discarded`] when the event was
    /// vetoed.
    pub fn notify_with(
        &self,
        fault: &dyn Fault,
        on_error: Option<OnErrorCallback>,
        on_complete: Option<CompletionCallback>,
    ) -> bool {
        let reason = SeverityReason::new(SeverityReasonType::HandledException);
        self.notify_inner(fault, Severity::Warning, reason, on_error, on_complete)
    }

    fn notify_inner(
        &self,
        fault: &dyn Fault,
        severity: Severity,
        reason: SeverityReason,
        on_error: Option<OnErrorCallback>,
        on_complete: Option<CompletionCallback>,
    ) -> bool {
        match self.prepare_event(fault, severity, reason, on_error.as_deref()) {
            Some(event) => {
                self.send_event(
                    event,
                    Box::new(move |result| {
                        if let Some(on_complete) = on_complete {
                            on_complete(DeliveryOutcome::from(result));
                        }
                    }),
                );
                true
            }
            None => {
                if let Some(on_complete) = on_complete {
                    self.complete_discarded(on_complete);
                }
                false
            }
        }
    }

    fn complete_discarded(&self, on_complete: CompletionCallback) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            on_complete(DeliveryOutcome::Discarded)
        }));
        if let Err(payload) = result {
            self.logger().error(&format!(
                "event completion handler panicked: {}",
                DisplayPanic(&*payload)
            ));
        }
    }

    /// Reports a fault nobody handled.
    ///
    /// The event has severity `error` and is flagged unhandled.  Once the
    /// outcome is known the `on_uncaught` handler of the options receives the
    /// fault and the outcome.
    pub fn notify_uncaught(&self, fault: Box<dyn Fault + Send>, kind: UncaughtKind) -> bool {
        faultline_debug!(self.options.debug, "[Client] Notifying uncaught fault ({:?})", kind);
        let reason = SeverityReason::new(kind.reason());
        let event = self.prepare_event(&*fault, Severity::Error, reason, None);
        let handler = self.options.on_uncaught.clone();

        match event {
            Some(event) => {
                self.send_event(
                    event,
                    Box::new(move |result| {
                        if let Some(handler) = handler {
                            handler(&*fault, &DeliveryOutcome::from(result));
                        }
                    }),
                );
                true
            }
            None => {
                if let Some(handler) = handler {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        handler(&*fault, &DeliveryOutcome::Discarded)
                    }));
                    if let Err(payload) = result {
                        self.logger().error(&format!(
                            "uncaught fault handler panicked: {}",
                            DisplayPanic(&*payload)
                        ));
                    }
                }
                false
            }
        }
    }

    /// Builds, enriches and filters an event.
    ///
    /// Returns `None` if the event was discarded by the release stage filter
    /// or vetoed by a hook.
    pub fn prepare_event(
        &self,
        fault: &dyn Fault,
        severity: Severity,
        reason: SeverityReason,
        on_error: Option<&(dyn Fn(&mut Event) -> bool + Send + Sync)>,
    ) -> Option<Event> {
        let mut event = build_event(
            fault,
            severity,
            reason,
            self.options.source_provider.as_deref(),
            self.options.debug,
        );
        faultline_debug!(
            self.options.debug,
            "[Client] Captured {}",
            event
                .errors
                .first()
                .map_or("<no error>", |e| e.error_class.as_str())
        );

        self.apply_to_event(&mut event);

        if !self.release_stage_enabled() {
            faultline_debug!(
                self.options.debug,
                "[Client] Release stage `{}` is not enabled, discarding event",
                self.options.release_stage()
            );
            return None;
        }

        let original_severity = event.severity;
        if self.on_error.run(&mut event, self.logger()).vetoed {
            faultline_debug!(self.options.debug, "[Client] on_error hook discarded event");
            return None;
        }
        if let Some(hook) = on_error {
            if !run_hook(HookKind::OnError, hook, &mut event, self.logger()) {
                faultline_debug!(
                    self.options.debug,
                    "[Client] per-call on_error hook discarded event"
                );
                return None;
            }
        }
        if event.severity != original_severity {
            event.severity_reason = SeverityReason::new(SeverityReasonType::UserCallbackSetSeverity);
        }

        Some(event)
    }

    fn apply_to_event(&self, event: &mut Event) {
        event.app = self.app();
        event.device = self.options.device.clone();
        event.device.time = Some(Utc::now());

        {
            let state = self.read_state();
            if event.context.is_none() {
                event.context.clone_from(&state.context);
            }
            if event.user.is_empty() {
                event.user = state.user.clone();
            }
            let mut metadata = state.metadata.clone();
            metadata.merge(&event.metadata);
            event.metadata = metadata;
        }

        event.breadcrumbs = self.breadcrumbs.snapshot();
    }

    fn app(&self) -> App {
        let mut app = self.options.app.clone();
        if app.release_stage.is_none() {
            app.release_stage = Some(self.options.release_stage().to_owned());
        }
        app
    }

    fn release_stage_enabled(&self) -> bool {
        match self.options.enabled_release_stages {
            Some(ref stages) => {
                let stage = self.options.release_stage();
                stages.iter().any(|s| s == stage)
            }
            None => true,
        }
    }

    fn send_event(&self, mut event: Event, report: DeliveryCallback) {
        event.session = self.sessions.count(event.unhandled);
        let breadcrumb = error_breadcrumb(&event);

        let payload = EventPayload::new(self.api_key.clone(), NOTIFIER.clone(), event);
        faultline_debug!(self.options.debug, "[Client] Delivering event");
        self.delivery.deliver_event(payload, report);

        if let Some(breadcrumb) = breadcrumb {
            self.add_breadcrumb(breadcrumb);
        }
    }

    /// Records a breadcrumb.
    ///
    /// `ty` defaults to [`BreadcrumbType::Manual`].  Nested metadata values
    /// are flattened to JSON strings.
    pub fn leave_breadcrumb<S: Into<String>>(
        &self,
        message: S,
        metadata: Option<Map<String, Value>>,
        ty: Option<BreadcrumbType>,
    ) {
        let mut breadcrumb = Breadcrumb::new(message, ty.unwrap_or_default());
        if let Some(metadata) = metadata {
            breadcrumb.metadata = metadata;
        }
        self.add_breadcrumb(breadcrumb);
    }

    /// Records a fully built breadcrumb, running the `on_breadcrumb` hooks.
    pub fn add_breadcrumb(&self, mut breadcrumb: Breadcrumb) {
        if let Some(ref enabled) = self.options.enabled_breadcrumb_types {
            if !enabled.contains(&breadcrumb.ty) {
                faultline_debug!(
                    self.options.debug,
                    "[Client] Breadcrumb type `{}` is not enabled",
                    breadcrumb.ty
                );
                return;
            }
        }
        flatten_metadata(&mut breadcrumb.metadata);
        if self.on_breadcrumb.run(&mut breadcrumb, self.logger()).vetoed {
            faultline_debug!(
                self.options.debug,
                "[Client] on_breadcrumb hook discarded breadcrumb"
            );
            return;
        }
        flatten_metadata(&mut breadcrumb.metadata);
        self.breadcrumbs.append(breadcrumb);
    }

    /// Returns a copy of the recorded breadcrumbs, oldest first.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.breadcrumbs.snapshot()
    }

    /// Removes all recorded breadcrumbs.
    pub fn clear_breadcrumbs(&self) {
        self.breadcrumbs.clear();
    }

    /// Starts a new session, replacing the current one.
    ///
    /// Returns `None` if an `on_session` hook vetoed the session.
    pub fn start_session(&self) -> Option<Session> {
        let mut session = new_session();
        if self.on_session.run(&mut session, self.logger()).vetoed {
            faultline_debug!(self.options.debug, "[Client] on_session hook discarded session");
            return None;
        }
        let session = self.sessions.install(session);
        faultline_debug!(self.options.debug, "[Client] Started session {}", session.id);

        let payload = SessionPayload {
            notifier: NOTIFIER.clone(),
            app: self.app(),
            device: self.options.device.clone(),
            sessions: vec![SessionStart {
                id: session.id,
                started_at: session.started_at,
                user: self.user(),
            }],
        };
        self.delivery.deliver_session(payload, Box::new(|_| {}));
        Some(session)
    }

    /// Stops counting events without discarding the session.
    pub fn pause_session(&self) {
        self.sessions.pause_session();
    }

    /// Resumes the paused session, or starts a new one if there is none.
    pub fn resume_session(&self) -> Option<Session> {
        match self.sessions.resume_session() {
            Some(session) => Some(session),
            None => self.start_session(),
        }
    }

    /// The session events are currently counted in.
    pub fn current_session(&self) -> Option<Session> {
        self.sessions.current_session()
    }

    /// Sets the default context of events.
    pub fn set_context(&self, context: Option<String>) {
        self.write_state().context = context;
    }

    /// The default context of events.
    pub fn context(&self) -> Option<String> {
        self.read_state().context.clone()
    }

    /// Sets the user events are attributed to.
    pub fn set_user(&self, user: User) {
        self.write_state().user = user;
    }

    /// The user events are attributed to.
    pub fn user(&self) -> User {
        self.read_state().user.clone()
    }

    /// Adds a value to the client metadata.
    pub fn add_metadata<T, K, V>(&self, tab: T, key: K, value: V)
    where
        T: Into<String>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.write_state().metadata.add(tab, key, value);
    }

    /// Merges values into a tab of the client metadata.
    pub fn add_metadata_tab<T: Into<String>>(&self, tab: T, values: MetadataTab) {
        self.write_state().metadata.add_tab(tab, values);
    }

    /// Returns a value of the client metadata.
    pub fn get_metadata(&self, tab: &str, key: &str) -> Option<Value> {
        self.read_state().metadata.get(tab, key).cloned()
    }

    /// Returns a tab of the client metadata.
    pub fn get_metadata_tab(&self, tab: &str) -> Option<MetadataTab> {
        self.read_state().metadata.tab(tab).cloned()
    }

    /// Removes a whole tab, or a single key of it, from the client metadata.
    pub fn clear_metadata(&self, tab: &str, key: Option<&str>) {
        let mut state = self.write_state();
        match key {
            Some(key) => state.metadata.clear(tab, key),
            None => state.metadata.clear_tab(tab),
        }
    }

    /// Registers a hook.  The returned id removes it again.
    pub fn add_hook(&self, hook: Hook) -> HookId {
        match hook {
            Hook::OnError(f) => self.on_error.register(f),
            Hook::OnBreadcrumb(f) => self.on_breadcrumb.register(f),
            Hook::OnSession(f) => self.on_session.register(f),
        }
    }

    /// Removes a hook.  Returns `false` if it was not registered.
    pub fn remove_hook(&self, id: HookId) -> bool {
        match id.kind() {
            HookKind::OnError => self.on_error.remove(id),
            HookKind::OnBreadcrumb => self.on_breadcrumb.remove(id),
            HookKind::OnSession => self.on_session.remove(id),
        }
    }

    /// Registers an `on_error` hook.
    pub fn add_on_error<F>(&self, f: F) -> HookId
    where
        F: Fn(&mut Event) -> bool + Send + Sync + 'static,
    {
        self.on_error.register(Arc::new(f))
    }

    /// Registers an `on_breadcrumb` hook.
    pub fn add_on_breadcrumb<F>(&self, f: F) -> HookId
    where
        F: Fn(&mut Breadcrumb) -> bool + Send + Sync + 'static,
    {
        self.on_breadcrumb.register(Arc::new(f))
    }

    /// Registers an `on_session` hook.
    pub fn add_on_session<F>(&self, f: F) -> HookId
    where
        F: Fn(&mut Session) -> bool + Send + Sync + 'static,
    {
        self.on_session.register(Arc::new(f))
    }

    /// Looks up a loaded plugin by name.
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    /// Looks up a loaded plugin by type.
    pub fn get_plugin_as<P: Plugin>(&self) -> Option<&P> {
        self.plugins.get_as()
    }

    /// Drains all pending deliveries without shutting down.
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(self.options.shutdown_timeout);
        faultline_debug!(
            self.options.debug,
            "[Client] Flushing (timeout: {}ms)",
            timeout.as_millis()
        );
        self.delivery.flush(timeout)
    }

    /// Drains all pending deliveries and shuts down the transport behind the
    /// client.  After shutting down the transport is removed.
    ///
    /// This returns `true` if the queue was successfully drained in the
    /// given time or `false` if not (for instance because of a timeout).
    /// If no timeout is provided the client will wait for as long a
    /// `shutdown_timeout` in the client options.
    pub fn close(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(self.options.shutdown_timeout);
        faultline_debug!(
            self.options.debug,
            "[Client] Closing client (timeout: {}ms)",
            timeout.as_millis()
        );
        self.delivery.shutdown(timeout)
    }
}

fn error_breadcrumb(event: &Event) -> Option<Breadcrumb> {
    let error = event.errors.first()?;
    let mut breadcrumb = Breadcrumb::new(error.error_class.clone(), BreadcrumbType::Error);
    breadcrumb
        .metadata
        .insert("errorClass".into(), error.error_class.clone().into());
    breadcrumb
        .metadata
        .insert("errorMessage".into(), error.error_message.clone().into());
    breadcrumb
        .metadata
        .insert("severity".into(), event.severity.to_string().into());
    Some(breadcrumb)
}

// Make this unwind safe. It's not out of the box because of the
// `CallbackChain`s we contain.
impl RefUnwindSafe for Client {}
