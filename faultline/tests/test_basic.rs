#![cfg(feature = "test")]

use std::sync::{Arc, Mutex};

use faultline::protocol::{BreadcrumbType, Event, Map, Severity, SeverityReasonType, Value};
use faultline::test::{with_captured_events, with_captured_events_options, TestTransport};
use faultline::{
    Client, ClientOptions, DeliveryError, DeliveryOutcome, ErrorFault, Fault, FieldError,
    NonErrorFault, OnErrorCallback, Plugin, RawFault, UncaughtKind,
};

fn client_with(transport: &Arc<TestTransport>, options: ClientOptions) -> Client {
    Client::with_options(ClientOptions {
        api_key: Some(faultline::test::TEST_API_KEY.into()),
        transport: Some(Arc::new(transport.clone())),
        ..options
    })
    .unwrap()
}

#[test]
fn test_basic_notify() {
    let events = with_captured_events(|client| {
        client.set_context(Some("checkout".into()));
        assert!(client.notify(&RawFault::new("CheckoutError", "card declined")));
    });
    assert_eq!(events.len(), 1);
    let event = events.into_iter().next().unwrap();
    assert_eq!(event.errors[0].error_class, "CheckoutError");
    assert_eq!(event.errors[0].error_message, "card declined");
    assert_eq!(event.severity, Severity::Warning);
    assert!(!event.unhandled);
    assert_eq!(event.severity_reason.ty, SeverityReasonType::HandledException);
    assert_eq!(event.context.as_deref(), Some("checkout"));
}

#[test]
fn test_notify_error_with_sources() {
    let err = "NaN".parse::<usize>().unwrap_err();
    let events = with_captured_events(|client| {
        client.notify_error(&err);
    });
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].errors[0].error_class, "ParseIntError");
    assert_eq!(
        events[0].errors[0].error_message,
        "invalid digit found in string"
    );
}

#[test]
fn test_notify_with_severity() {
    let events = with_captured_events(|client| {
        client.notify_with_severity(&RawFault::new("Slow", "took 3s"), Severity::Info);
    });
    assert_eq!(events[0].severity, Severity::Info);
    assert_eq!(
        events[0].severity_reason.ty,
        SeverityReasonType::UserSpecifiedSeverity
    );
}

#[test]
fn test_non_error_fault() {
    let events = with_captured_events(|client| {
        client.notify(&NonErrorFault::new("notify()", "just a string"));
    });
    let event = &events[0];
    assert_eq!(event.errors[0].error_class, "InvalidError");
    assert_eq!(
        event.get_metadata("notify()", NonErrorFault::METADATA_KEY),
        Some(&Value::from("just a string"))
    );
}

#[test]
fn test_breadcrumbs_keep_the_latest() {
    let events = with_captured_events_options(
        |client| {
            for i in 0..5 {
                client.leave_breadcrumb(format!("crumb {}", i), None, None);
            }
            client.notify(&RawFault::new("Error", "boom"));
        },
        ClientOptions {
            max_breadcrumbs: 3,
            ..Default::default()
        },
    );
    let messages: Vec<_> = events[0]
        .breadcrumbs
        .iter()
        .map(|b| b.message.as_str())
        .collect();
    assert_eq!(messages, vec!["crumb 2", "crumb 3", "crumb 4"]);
}

#[test]
fn test_capacity_one_keeps_last_breadcrumb() {
    with_captured_events_options(
        |client| {
            client.leave_breadcrumb("A", None, None);
            client.leave_breadcrumb("B", None, None);
            let crumbs = client.breadcrumbs();
            assert_eq!(crumbs.len(), 1);
            assert_eq!(crumbs[0].message, "B");
        },
        ClientOptions {
            max_breadcrumbs: 1,
            ..Default::default()
        },
    );
}

#[test]
fn test_capacity_zero_still_runs_hooks() {
    let seen = Arc::new(Mutex::new(vec![]));
    let seen_hook = seen.clone();
    with_captured_events_options(
        |client| {
            client.leave_breadcrumb("ignored", None, None);
            assert!(client.breadcrumbs().is_empty());
        },
        ClientOptions {
            max_breadcrumbs: 0,
            ..Default::default()
        }
        .add_on_breadcrumb(move |crumb| {
            seen_hook.lock().unwrap().push(crumb.message.clone());
            true
        }),
    );
    assert_eq!(*seen.lock().unwrap(), vec!["ignored".to_string()]);
}

#[test]
fn test_breadcrumb_hook_rewrites_and_drops() {
    with_captured_events_options(
        |client| {
            let mut metadata = Map::new();
            metadata.insert("password".to_string(), Value::from("hunter2"));
            metadata.insert("nested".to_string(), serde_json::json!({"a": [1, 2]}));
            client.leave_breadcrumb("login", Some(metadata), Some(BreadcrumbType::User));
            client.leave_breadcrumb("secret", None, None);

            let crumbs = client.breadcrumbs();
            assert_eq!(crumbs.len(), 1);
            assert_eq!(crumbs[0].message, "login (redacted)");
            assert_eq!(crumbs[0].metadata.get("password"), Some(&Value::from("[FILTERED]")));
            assert_eq!(
                crumbs[0].metadata.get("nested"),
                Some(&Value::from(r#"{"a":[1,2]}"#))
            );
        },
        ClientOptions::default().add_on_breadcrumb(|crumb| {
            if crumb.message == "secret" {
                return false;
            }
            crumb.message.push_str(" (redacted)");
            if crumb.metadata.contains_key("password") {
                crumb
                    .metadata
                    .insert("password".into(), Value::from("[FILTERED]"));
            }
            true
        }),
    );
}

#[test]
fn test_error_breadcrumb_is_recorded() {
    let events = with_captured_events(|client| {
        client.notify(&RawFault::new("FirstError", "one"));
        client.notify(&RawFault::new("SecondError", "two"));
    });
    assert_eq!(events.len(), 2);
    assert!(events[0].breadcrumbs.is_empty());

    let crumb = &events[1].breadcrumbs[0];
    assert_eq!(crumb.ty, BreadcrumbType::Error);
    assert_eq!(crumb.message, "FirstError");
    assert_eq!(crumb.metadata.get("errorMessage"), Some(&Value::from("one")));
    assert_eq!(crumb.metadata.get("severity"), Some(&Value::from("warning")));
}

#[test]
fn test_snapshot_is_not_affected_by_later_breadcrumbs() {
    let events = with_captured_events(|client| {
        client.leave_breadcrumb("before", None, None);
        client.notify(&RawFault::new("Error", "boom"));
        client.leave_breadcrumb("after", None, None);
    });
    let messages: Vec<_> = events[0]
        .breadcrumbs
        .iter()
        .map(|b| b.message.as_str())
        .collect();
    assert_eq!(messages, vec!["before"]);
}

#[test]
fn test_hooks_run_in_registration_order() {
    let events = with_captured_events_options(
        |client| {
            client.notify(&RawFault::new("Error", "boom"));
        },
        ClientOptions::default()
            .add_on_error(|event| {
                event.severity = Severity::Info;
                true
            })
            .add_on_error(|event| {
                assert_eq!(event.severity, Severity::Info);
                event.severity = Severity::Error;
                true
            }),
    );
    assert_eq!(events[0].severity, Severity::Error);
    assert_eq!(
        events[0].severity_reason.ty,
        SeverityReasonType::UserCallbackSetSeverity
    );
}

#[test]
fn test_veto_stops_delivery() {
    let later_ran = Arc::new(Mutex::new(false));
    let later = later_ran.clone();
    let events = with_captured_events_options(
        |client| {
            assert!(!client.notify(&RawFault::new("Error", "boom")));
        },
        ClientOptions::default()
            .add_on_error(|_| false)
            .add_on_error(move |_| {
                *later.lock().unwrap() = true;
                true
            }),
    );
    assert!(events.is_empty());
    assert!(!*later_ran.lock().unwrap());
}

#[test]
fn test_panicking_hook_does_not_abort_delivery() {
    let events = with_captured_events_options(
        |client| {
            client.notify(&RawFault::new("Error", "boom"));
        },
        ClientOptions::default()
            .add_on_error(|event| {
                event.context = Some("partial".into());
                panic!("hook bug");
            })
            .add_on_error(|event| {
                event.add_metadata("second", "ran", true);
                true
            }),
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].context.as_deref(), Some("partial"));
    assert_eq!(
        events[0].get_metadata("second", "ran"),
        Some(&Value::from(true))
    );
}

#[test]
fn test_context_set_by_hook_overrides_default() {
    let events = with_captured_events_options(
        |client| {
            client.set_context(Some("default".into()));
            client.notify(&RawFault::new("Error", "boom"));
        },
        ClientOptions::default().add_on_error(|event| {
            event.context = Some("X".into());
            true
        }),
    );
    assert_eq!(events[0].context.as_deref(), Some("X"));
}

#[test]
fn test_per_call_hook_runs_after_global_hooks() {
    let events = with_captured_events_options(
        |client| {
            let hook: OnErrorCallback = Arc::new(|event: &mut Event| {
                assert_eq!(event.context.as_deref(), Some("global"));
                event.context = Some("local".into());
                true
            });
            client.notify_with(&RawFault::new("Error", "boom"), Some(hook), None);
        },
        ClientOptions::default().add_on_error(|event| {
            event.context = Some("global".into());
            true
        }),
    );
    assert_eq!(events[0].context.as_deref(), Some("local"));
}

struct ExplodingMessage;

impl Fault for ExplodingMessage {
    fn error_class(&self) -> Result<String, FieldError> {
        Ok("HostError".into())
    }

    fn message(&self) -> Result<Option<String>, FieldError> {
        panic!("getter threw")
    }
}

#[test]
fn test_throwing_accessor_still_delivers() {
    let outcome = Arc::new(Mutex::new(None));
    let outcome_handler = outcome.clone();
    let events = with_captured_events(|client| {
        client.notify_with(
            &ExplodingMessage,
            None,
            Some(Box::new(move |result| {
                *outcome_handler.lock().unwrap() = Some(result);
            })),
        );
    });
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].errors[0].error_class, "HostError");
    assert_eq!(events[0].errors[0].error_message, "[unreadable]");
    assert_eq!(*outcome.lock().unwrap(), Some(DeliveryOutcome::Delivered));
}

#[test]
fn test_user_and_metadata_are_attached() {
    let events = with_captured_events_options(
        |client| {
            client.set_user(faultline::User {
                id: Some("42".into()),
                email: Some("jane@example.com".into()),
                name: None,
            });
            client.add_metadata("account", "plan", "pro");
            client.add_metadata("account", "seats", 3);

            let mut event_metadata = faultline::protocol::Metadata::new();
            event_metadata.add("account", "plan", "enterprise");
            let fault = MetadataFault(event_metadata);
            client.notify(&fault);
        },
        ClientOptions::default(),
    );
    let event = &events[0];
    assert_eq!(event.user.id.as_deref(), Some("42"));
    assert_eq!(
        event.get_metadata("account", "plan"),
        Some(&Value::from("enterprise"))
    );
    assert_eq!(event.get_metadata("account", "seats"), Some(&Value::from(3)));
}

struct MetadataFault(faultline::protocol::Metadata);

impl Fault for MetadataFault {
    fn error_class(&self) -> Result<String, FieldError> {
        Ok("Error".into())
    }

    fn message(&self) -> Result<Option<String>, FieldError> {
        Ok(None)
    }

    fn metadata(&self) -> Result<Option<faultline::protocol::Metadata>, FieldError> {
        Ok(Some(self.0.clone()))
    }
}

#[test]
fn test_error_fault_cause_chain() {
    #[derive(Debug)]
    struct Outer(std::num::ParseIntError);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("could not read config")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    let err = Outer("x".parse::<u32>().unwrap_err());
    let events = with_captured_events(|client| {
        client.notify(&ErrorFault::new(&err));
    });
    let classes: Vec<_> = events[0]
        .errors
        .iter()
        .map(|e| e.error_class.as_str())
        .collect();
    assert_eq!(classes, vec!["Outer", "ParseIntError"]);
}

#[test]
fn test_session_counts_unhandled_events() {
    let transport = TestTransport::new();
    let client = client_with(&transport, ClientOptions::default());

    client.notify(&RawFault::new("Early", "before any session"));
    let session = client.start_session().unwrap();
    client.notify_uncaught(Box::new(RawFault::new("Crash", "boom")), UncaughtKind::Exception);
    client.close(None);

    let starts = transport.fetch_and_clear_sessions();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].id, session.id);

    let events = transport.fetch_and_clear_events();
    assert_eq!(events.len(), 2);
    assert!(events[0].session.is_none());

    let event = &events[1];
    assert!(event.unhandled);
    assert_eq!(event.severity, Severity::Error);
    assert_eq!(
        event.severity_reason.ty,
        SeverityReasonType::UnhandledException
    );
    let counted = event.session.as_ref().unwrap();
    assert_eq!(counted.id, session.id);
    assert_eq!(counted.counts.unhandled, 1);
    assert_eq!(counted.counts.handled, 0);
}

#[test]
fn test_hook_can_flag_event_unhandled() {
    let transport = TestTransport::new();
    let client = client_with(
        &transport,
        ClientOptions::default().add_on_error(|event| {
            event.unhandled = true;
            true
        }),
    );
    client.start_session();
    client.notify(&RawFault::new("Error", "boom"));
    client.close(None);

    let events = transport.fetch_and_clear_events();
    let counts = events[0].session.as_ref().unwrap().counts;
    assert_eq!(counts.unhandled, 1);
    assert_eq!(counts.handled, 0);
}

#[test]
fn test_vetoed_event_is_not_counted() {
    let transport = TestTransport::new();
    let client = client_with(
        &transport,
        ClientOptions::default().add_on_error(|event| event.errors[0].error_class != "Ignored"),
    );
    client.start_session();
    assert!(!client.notify(&RawFault::new("Ignored", "noise")));
    assert!(client.notify(&RawFault::new("Kept", "signal")));
    client.close(None);

    let events = transport.fetch_and_clear_events();
    assert_eq!(events.len(), 1);
    let counts = events[0].session.as_ref().unwrap().counts;
    assert_eq!(counts.handled, 1);
    assert_eq!(counts.unhandled, 0);
}

#[test]
fn test_paused_session_is_not_attached() {
    let transport = TestTransport::new();
    let client = client_with(&transport, ClientOptions::default());
    let session = client.start_session().unwrap();
    client.pause_session();
    client.notify(&RawFault::new("Error", "while paused"));
    assert_eq!(client.resume_session().unwrap().id, session.id);
    client.notify(&RawFault::new("Error", "after resume"));
    client.close(None);

    let events = transport.fetch_and_clear_events();
    assert!(events[0].session.is_none());
    assert_eq!(events[1].session.as_ref().unwrap().counts.handled, 1);
}

#[test]
fn test_failed_delivery_is_reported_once() {
    let transport = TestTransport::new();
    transport.fail_with(Some(DeliveryError::Rejected { status: 400 }));
    let client = client_with(&transport, ClientOptions::default());

    let outcomes = Arc::new(Mutex::new(vec![]));
    let outcomes_handler = outcomes.clone();
    assert!(client.notify_with(
        &RawFault::new("Error", "boom"),
        None,
        Some(Box::new(move |outcome| {
            outcomes_handler.lock().unwrap().push(outcome);
        })),
    ));
    client.close(None);

    assert_eq!(transport.fetch_and_clear_events().len(), 1);
    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![DeliveryOutcome::Failed(DeliveryError::Rejected { status: 400 })]
    );
}

#[test]
fn test_discarded_event_completes_with_discarded() {
    let outcome = Arc::new(Mutex::new(None));
    let outcome_handler = outcome.clone();
    let events = with_captured_events_options(
        |client| {
            client.notify_with(
                &RawFault::new("Error", "boom"),
                None,
                Some(Box::new(move |result| {
                    *outcome_handler.lock().unwrap() = Some(result);
                })),
            );
        },
        ClientOptions::default().add_on_error(|_| false),
    );
    assert!(events.is_empty());
    assert_eq!(*outcome.lock().unwrap(), Some(DeliveryOutcome::Discarded));
}

#[test]
fn test_uncaught_handler_receives_outcome() {
    let transport = TestTransport::new();
    transport.fail_with(Some(DeliveryError::QueueFull));

    let seen = Arc::new(Mutex::new(vec![]));
    let seen_handler = seen.clone();
    let client = client_with(
        &transport,
        ClientOptions::default().set_on_uncaught(move |fault, outcome| {
            let class = fault.error_class().unwrap();
            seen_handler.lock().unwrap().push((class, outcome.clone()));
        }),
    );
    client.notify_uncaught(
        Box::new(RawFault::new("Rejection", "nobody awaited")),
        UncaughtKind::PromiseRejection,
    );
    client.close(None);

    let events = transport.fetch_and_clear_events();
    assert_eq!(
        events[0].severity_reason.ty,
        SeverityReasonType::UnhandledPromiseRejection
    );
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(
            "Rejection".to_string(),
            DeliveryOutcome::Failed(DeliveryError::QueueFull)
        )]
    );
}

#[test]
fn test_vetoed_uncaught_fault_is_discarded() {
    let seen = Arc::new(Mutex::new(vec![]));
    let seen_handler = seen.clone();
    let events = with_captured_events_options(
        |client| {
            assert!(!client.notify_uncaught(
                Box::new(RawFault::new("Crash", "boom")),
                UncaughtKind::Panic,
            ));
        },
        ClientOptions::default()
            .add_on_error(|_| false)
            .set_on_uncaught(move |_, outcome| {
                seen_handler.lock().unwrap().push(outcome.clone());
            }),
    );
    assert!(events.is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![DeliveryOutcome::Discarded]);
}

#[derive(Default)]
struct CountingPlugin {
    loads: Mutex<u32>,
}

impl Plugin for CountingPlugin {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn load(&self, client: &Client) {
        *self.loads.lock().unwrap() += 1;
        client.add_metadata("plugins", "counting", true);
    }
}

#[test]
fn test_plugins_are_loaded_and_found() {
    let events = with_captured_events_options(
        |client| {
            assert!(client.get_plugin("counting").is_some());
            assert!(client.get_plugin("missing").is_none());
            let plugin = client.get_plugin_as::<CountingPlugin>().unwrap();
            assert_eq!(*plugin.loads.lock().unwrap(), 1);
            client.notify(&RawFault::new("Error", "boom"));
        },
        ClientOptions::default().add_plugin(CountingPlugin::default()),
    );
    assert_eq!(
        events[0].get_metadata("plugins", "counting"),
        Some(&Value::from(true))
    );
}

#[test]
fn test_release_stage_filter() {
    let events = with_captured_events_options(
        |client| {
            client.notify(&RawFault::new("Error", "boom"));
        },
        ClientOptions {
            enabled_release_stages: Some(vec!["production".into()]),
            app: faultline::protocol::App {
                release_stage: Some("staging".into()),
                ..Default::default()
            },
            ..Default::default()
        },
    );
    assert!(events.is_empty());
}
