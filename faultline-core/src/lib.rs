//! This crate provides the core of the faultline notifier: the client that
//! turns faults into events, enriches them, runs user hooks and hands the
//! result to a transport.
//!
//! `faultline-core` is meant for plugin authors and library authors who want
//! to report faults without pulling in an HTTP stack.  Applications should
//! instead use the [`faultline`] crate, which comes with a default transport
//! and an `init` function.
//!
//! # Core Concepts
//!
//! Everything is centered around the [`Client`], configured through
//! [`ClientOptions`].  Faults enter the client through the [`Fault`] trait;
//! user code can alter or veto events, breadcrumbs and sessions through
//! [`Hook`]s.  The extension points are the [`Plugin`], [`Transport`] and
//! [`TransportFactory`] traits.
//!
//! ```
//! use faultline_core::{Client, ClientOptions, RawFault};
//!
//! let client = Client::with_options(ClientOptions {
//!     api_key: Some("0123456789abcdef0123456789abcdef".into()),
//!     ..Default::default()
//! })
//! .unwrap();
//! client.leave_breadcrumb("loaded the cart", None, None);
//! client.notify(&RawFault::new("CheckoutError", "card declined"));
//! ```
//!
//! # Features
//!
//! - `feature = "device-info"`: Fills the device hostname (*enabled by
//!   default*).
//! - `feature = "test"`: Activates the [`test`] module, which can be used to
//!   write integration tests.  It comes with a test transport which can
//!   capture all sent payloads for inspection.
//!
//! [`faultline`]: https://crates.io/crates/faultline
//! [`test`]: test/index.html

#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[doc(hidden)]
#[macro_use]
pub mod macros;

mod breadcrumbs;
mod callbacks;
mod client;
mod clientoptions;
pub mod constants;
mod delivery;
mod error;
pub mod event;
mod logger;
mod plugin;
mod session;
mod transport;
pub mod truncation;

// public api or exports from this crate
pub use crate::breadcrumbs::BreadcrumbStore;
pub use crate::callbacks::{
    Callback, CallbackChain, ChainOutcome, Hook, HookId, HookKind, OnBreadcrumbCallback,
    OnErrorCallback, OnSessionCallback,
};
pub use crate::client::{Client, CompletionCallback, UncaughtKind};
pub use crate::clientoptions::{ClientOptions, Endpoints, OnUncaughtCallback};
pub use crate::delivery::{Delivery, DeliveryCallback, DeliveryOutcome};
pub use crate::error::{ConfigError, DeliveryError, FieldError};
pub use crate::event::{
    build_event, parse_type_from_debug, ErrorFault, Fault, NonErrorFault, Origin, PanicFault,
    RawFault, RawStack, SourceProvider,
};
pub use crate::logger::{panic_message, LogLogger, Logger};
pub use crate::plugin::Plugin;
pub use crate::session::{new_session, SessionTracker};
pub use crate::transport::{Transport, TransportFactory};


// public api from other crates
#[doc(hidden)]
pub use log as __log;
#[doc(inline)]
pub use faultline_types as types;
pub use faultline_types::protocol::v4 as protocol;
pub use faultline_types::protocol::v4::{Breadcrumb, BreadcrumbType, Event, Severity, User};
