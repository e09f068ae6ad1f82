//! This crate provides support for reporting errors, panics and other
//! faults of Rust applications to a bugsnag compatible collection service.
//!
//! # Quickstart
//!
//! The most convenient way to use this library is via the [`faultline::init`]
//! function, which starts a client with a default set of options and
//! returns a guard owning it.
//!
//! ```no_run
//! use faultline::RawFault;
//!
//! let faultline = faultline::init(faultline::ClientOptions {
//!     api_key: Some("0123456789abcdef0123456789abcdef".into()),
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! faultline.leave_breadcrumb("loaded the cart", None, None);
//! faultline.notify(&RawFault::new("CheckoutError", "card declined"));
//! ```
//!
//! More complex examples on how to use faultline can also be found in
//! [examples]. Extended instructions may also be found on [GitHub].
//!
//! When the guard is dropped pending deliveries are drained and the
//! transport is shut down.
//!
//! # Hooks and Plugins
//!
//! Events, breadcrumbs and sessions pass through `on_error`,
//! `on_breadcrumb` and `on_session` hooks before they are recorded or
//! delivered.  A hook can modify the value or veto it by returning `false`.
//! Plugins implement [`Plugin`] and are loaded once when the client is
//! created.
//!
//! # Features
//!
//! Additional functionality can be enabled via features:
//!
//! - `transport`: Enables the default HTTP transport (*enabled by default*).
//! - `device-info`: Fills the device hostname (*enabled by default*).
//! - `test`: Enables the `test` module with a transport that captures
//!   payloads.
//!
//! ## Transports
//!
//! - `reqwest`: **Default**. Enables the `reqwest` transport.
//! - `native-tls`: **Default**. Uses the `native-tls` crate for TLS.
//! - `rustls`: Enables `rustls` support for the `reqwest` transport.
//!
//! [`faultline::init`]: fn.init.html
//! [examples]: https://github.com/faultline-rs/faultline/tree/main/faultline/examples
//! [GitHub]: https://github.com/faultline-rs/faultline

#![warn(missing_docs)]

mod defaults;
mod init;
pub mod transports;

// re-export from core
#[doc(inline)]
pub use faultline_core::*;

// added public API
pub use crate::defaults::apply_defaults;
pub use crate::init::{init, ClientInitGuard};
