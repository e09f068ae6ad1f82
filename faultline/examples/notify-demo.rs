use std::panic;
use std::sync::Arc;

use faultline::protocol::{BreadcrumbType, Map, Severity, Value};
use faultline::{ClientOptions, PanicFault, RawFault, UncaughtKind};

fn parse_quantity(input: &str) -> Result<u32, std::num::ParseIntError> {
    input.trim().parse()
}

fn main() {
    pretty_env_logger::init();

    let faultline = match faultline::init(
        ClientOptions {
            debug: true,
            context: Some("notify-demo".into()),
            ..ClientOptions::from_env()
        }
        .add_on_error(|event| {
            event.add_metadata("demo", "pid", std::process::id());
            true
        }),
    ) {
        Ok(guard) => guard,
        Err(err) => {
            log::error!("could not start faultline: {}", err);
            return;
        }
    };

    let client = faultline.client();
    let next = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        client.notify_uncaught(
            Box::new(PanicFault::from_panic_info(info)),
            UncaughtKind::Panic,
        );
        client.flush(None);
        next(info);
    }));

    let mut metadata = Map::new();
    metadata.insert("items".into(), Value::from(3));
    faultline.leave_breadcrumb("loaded the cart", Some(metadata), Some(BreadcrumbType::State));

    if let Err(err) = parse_quantity("three") {
        log::info!("reporting handled error: {}", err);
        faultline.notify_error(&err);
    }

    faultline.notify_with_severity(
        &RawFault::new("SlowCheckout", "checkout took 4.2s"),
        Severity::Info,
    );

    let shared = Arc::new(vec![1, 2, 3]);
    let index = shared.len() + 1;
    let _ = panic::catch_unwind(|| shared[index]);
}
