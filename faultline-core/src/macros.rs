/// Emits an internal diagnostic on the `faultline` log target.
///
/// The first argument is the `debug` flag of the client options the
/// diagnostic belongs to; nothing is formatted unless it is `true`.
#[macro_export]
#[doc(hidden)]
macro_rules! faultline_debug {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            $crate::__log::debug!(target: "faultline", $($arg)+);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fmt;

    struct Counted<'a>(&'a Cell<u32>);

    impl fmt::Display for Counted<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.set(self.0.get() + 1);
            f.write_str("counted")
        }
    }

    #[test]
    fn faultline_debug_expands_with_and_without_arguments() {
        crate::faultline_debug!(true, "plain message");
        crate::faultline_debug!(true, "formatted {} {:?}", 1, "two");
    }

    #[test]
    fn faultline_debug_is_silent_when_disabled() {
        let formatted = Cell::new(0);
        crate::faultline_debug!(false, "{}", Counted(&formatted));
        assert_eq!(formatted.get(), 0);
    }

    #[test]
    fn faultline_debug_flag_is_per_call() {
        let debug = crate::ClientOptions {
            debug: true,
            ..Default::default()
        };
        let quiet = crate::ClientOptions::default();
        let formatted = Cell::new(0);
        crate::faultline_debug!(debug.debug, "debug client");
        crate::faultline_debug!(quiet.debug, "{}", Counted(&formatted));
        assert_eq!(formatted.get(), 0);
    }
}
