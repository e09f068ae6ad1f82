use std::ops::Deref;
use std::sync::Arc;

use crate::{apply_defaults, Client, ClientOptions, ConfigError};
use faultline_core::faultline_debug;

/// Helper struct that is returned from `init`.
///
/// When this is dropped pending deliveries are drained for up to the
/// `shutdown_timeout` of the client options.
#[must_use = "when the init guard is dropped the transport will be shut down and no further \
              events can be sent.  If you do want to ignore this use mem::forget on it."]
pub struct ClientInitGuard(Arc<Client>);

impl ClientInitGuard {
    /// Quick check if the client has a transport.
    pub fn is_enabled(&self) -> bool {
        self.0.is_enabled()
    }

    /// Returns a shareable handle to the client.
    pub fn client(&self) -> Arc<Client> {
        self.0.clone()
    }
}

impl Deref for ClientInitGuard {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.0
    }
}

impl Drop for ClientInitGuard {
    fn drop(&mut self) {
        let debug = self.0.options().debug;
        if self.is_enabled() {
            faultline_debug!(debug, "dropping client guard -> disposing client");
        } else {
            faultline_debug!(debug, "dropping client guard (no client to dispose)");
        }
        self.0.close(None);
    }
}

/// Creates a faultline client for the given options.
///
/// The options are completed with [`apply_defaults`], so without a
/// configured transport the default HTTP transport is used and a missing
/// API key is read from `FAULTLINE_API_KEY`.
///
/// This returns a client init guard that must be kept in scope to help the
/// client deliver events before the application closes.  When the guard is
/// dropped then the transport that was initialized shuts down and no
/// further events can be sent through it.
///
/// # Examples
///
/// ```
/// let faultline = faultline::init("0123456789abcdef0123456789abcdef").unwrap();
/// faultline.leave_breadcrumb("started", None, None);
/// ```
///
/// A missing API key is a configuration error:
///
/// ```
/// std::env::remove_var("FAULTLINE_API_KEY");
/// assert!(faultline::init(faultline::ClientOptions::default()).is_err());
/// ```
pub fn init<O: Into<ClientOptions>>(options: O) -> Result<ClientInitGuard, ConfigError> {
    let client = Arc::new(Client::with_options(apply_defaults(options.into()))?);
    faultline_debug!(
        client.options().debug,
        "enabled faultline client for release stage {}",
        client.options().release_stage()
    );
    Ok(ClientInitGuard(client))
}
