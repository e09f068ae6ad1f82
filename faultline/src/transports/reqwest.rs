use std::time::Duration;

use ::reqwest::blocking::{Client as ReqwestClient, Response};
use ::reqwest::header::{CONTENT_TYPE, RETRY_AFTER, USER_AGENT as USER_AGENT_HEADER};

use faultline_core::constants::USER_AGENT;
use faultline_core::protocol::{EventPayload, SessionPayload};
use faultline_core::types::Utc;
use faultline_core::{faultline_debug, ClientOptions, DeliveryCallback, DeliveryError, Transport};

use super::ratelimit::RateLimiter;
use super::retry::{classify_status, AttemptError, RetryPolicy, StatusClass};
use super::thread::{Payload, TransportThread};

/// How long a single request may take.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`Transport`] that sends payloads via the [`reqwest`] library.
///
/// When the `transport` feature is enabled this will currently
/// be the default transport.  This is separately enabled by the
/// `reqwest` feature flag.
///
/// Requests are made with the blocking client on a background thread, so
/// sending never blocks the caller.
///
/// [`reqwest`]: https://crates.io/crates/reqwest
pub struct ReqwestHttpTransport {
    thread: TransportThread,
}

impl ReqwestHttpTransport {
    /// Creates a new Transport.
    pub fn new(options: &ClientOptions) -> Self {
        Self::new_internal(options, None, RetryPolicy::default())
    }

    /// Creates a new Transport that uses the specified [`ReqwestClient`].
    pub fn with_client(options: &ClientOptions, client: ReqwestClient) -> Self {
        Self::new_internal(options, Some(client), RetryPolicy::default())
    }

    /// Creates a new Transport that retries according to `policy`.
    pub fn with_retry_policy(options: &ClientOptions, policy: RetryPolicy) -> Self {
        Self::new_internal(options, None, policy)
    }

    /// Creates a new Transport from a [`ReqwestClient`] and a retry policy.
    pub fn with_client_and_retry_policy(
        options: &ClientOptions,
        client: ReqwestClient,
        policy: RetryPolicy,
    ) -> Self {
        Self::new_internal(options, Some(client), policy)
    }

    fn new_internal(
        options: &ClientOptions,
        client: Option<ReqwestClient>,
        policy: RetryPolicy,
    ) -> Self {
        let client = client.or_else(|| {
            match ReqwestClient::builder().timeout(REQUEST_TIMEOUT).build() {
                Ok(client) => Some(client),
                Err(err) => {
                    options
                        .logger
                        .error(&format!("failed to create http client: {}", err));
                    None
                }
            }
        });
        let debug = options.debug;
        let api_key = options
            .api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_owned();
        let notify_url = options.endpoints.notify.clone();
        let sessions_url = options.endpoints.sessions.clone();

        let thread = TransportThread::new(debug, move |payload, rl| {
            let client = client.as_ref().ok_or_else(|| {
                DeliveryError::Transport("no http client available".into())
            })?;

            let (url, key, version, body) = match payload {
                Payload::Event(payload) => (
                    &notify_url,
                    payload.effective_api_key().to_owned(),
                    payload.payload_version.clone(),
                    event_body(&payload)?,
                ),
                Payload::Session(payload) => (
                    &sessions_url,
                    api_key.clone(),
                    payload.payload_version().to_owned(),
                    session_body(&payload)?,
                ),
            };

            policy.run(debug, |attempt| {
                faultline_debug!(debug, "Sending payload to {} (attempt {})", url, attempt);
                let response = client
                    .post(url.as_str())
                    .header(USER_AGENT_HEADER, USER_AGENT.as_str())
                    .header(CONTENT_TYPE, "application/json")
                    .header("Bugsnag-Api-Key", key.as_str())
                    .header("Bugsnag-Payload-Version", version.as_str())
                    .header("Bugsnag-Sent-At", sent_at())
                    .body(body.clone())
                    .send()
                    .map_err(|err| {
                        faultline_debug!(debug, "Failed to send payload: {}", err);
                        AttemptError::retry(DeliveryError::Transport(err.to_string()))
                    })?;
                handle_response(response, rl, debug)
            })
        });
        Self { thread }
    }
}

fn event_body(payload: &EventPayload) -> Result<Vec<u8>, DeliveryError> {
    let mut body = Vec::new();
    payload
        .to_writer(&mut body)
        .map_err(|err| DeliveryError::Serialization(err.to_string()))?;
    Ok(body)
}

fn session_body(payload: &SessionPayload) -> Result<Vec<u8>, DeliveryError> {
    let mut body = Vec::new();
    payload
        .to_writer(&mut body)
        .map_err(|err| DeliveryError::Serialization(err.to_string()))?;
    Ok(body)
}

fn sent_at() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn handle_response(
    response: Response,
    rl: &mut RateLimiter,
    debug: bool,
) -> Result<(), AttemptError> {
    let status = response.status().as_u16();
    let retry_after = match response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|x| x.to_str().ok())
    {
        Some(retry_after) => rl.update_from_retry_after(retry_after),
        None if status == 429 => Some(rl.update_from_429()),
        None => None,
    };

    match response.text() {
        Err(err) => {
            faultline_debug!(debug, "Failed to read response: {}", err);
        }
        Ok(text) => {
            faultline_debug!(debug, "Get response: {} `{}`", status, text);
        }
    }

    let error = DeliveryError::Rejected { status };
    match classify_status(status) {
        StatusClass::Success => Ok(()),
        StatusClass::Retry => Err(AttemptError {
            retry_after,
            ..AttemptError::retry(error)
        }),
        StatusClass::Reject => Err(AttemptError::fatal(error)),
    }
}

impl Transport for ReqwestHttpTransport {
    fn send_event(&self, payload: EventPayload, callback: DeliveryCallback) {
        self.thread.send(Payload::Event(payload), callback)
    }

    fn send_session(&self, payload: SessionPayload, callback: DeliveryCallback) {
        self.thread.send(Payload::Session(payload), callback)
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.thread.flush(timeout)
    }

    fn shutdown(&self, timeout: Duration) -> bool {
        self.flush(timeout)
    }
}
