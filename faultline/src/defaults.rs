use std::env;
#[cfg(feature = "reqwest")]
use std::sync::Arc;

use crate::ClientOptions;
#[cfg(feature = "reqwest")]
use crate::transports::DefaultTransportFactory;

/// Apply default client options.
///
/// Extends the given `ClientOptions` with default options such as a default
/// transport and values read from the environment.  Only options that are
/// not already set are filled in.
///
/// 1. A default transport is set if none is configured and the `reqwest`
///    feature is enabled.
/// 2. The API key is read from `FAULTLINE_API_KEY`.
/// 3. The release stage is read from `FAULTLINE_RELEASE_STAGE`, falling back
///    to `development` for debug builds.
/// 4. The app version is read from `FAULTLINE_APP_VERSION`.
///
/// # Examples
///
/// ```
/// std::env::set_var("FAULTLINE_RELEASE_STAGE", "production-env");
/// let options = faultline::ClientOptions {
///     api_key: Some("0123456789abcdef0123456789abcdef".into()),
///     ..Default::default()
/// };
/// let options = faultline::apply_defaults(options);
/// assert_eq!(options.release_stage(), "production-env");
/// ```
pub fn apply_defaults(mut opts: ClientOptions) -> ClientOptions {
    #[cfg(feature = "reqwest")]
    {
        if opts.transport.is_none() {
            opts.transport = Some(Arc::new(DefaultTransportFactory));
        }
    }
    if opts.api_key.is_none() {
        opts.api_key = env::var("FAULTLINE_API_KEY").ok();
    }
    if opts.app.release_stage.is_none() {
        opts.app.release_stage = env::var("FAULTLINE_RELEASE_STAGE")
            .ok()
            .or_else(|| {
                if cfg!(debug_assertions) {
                    Some("development".into())
                } else {
                    None
                }
            });
    }
    if opts.app.version.is_none() {
        opts.app.version = env::var("FAULTLINE_APP_VERSION").ok();
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_options_are_kept() {
        let mut options = ClientOptions::from("0123456789abcdef0123456789abcdef");
        options.app.release_stage = Some("staging".into());
        options.app.version = Some("1.2.3".into());

        let options = apply_defaults(options);
        assert_eq!(
            options.api_key.as_deref(),
            Some("0123456789abcdef0123456789abcdef")
        );
        assert_eq!(options.release_stage(), "staging");
        assert_eq!(options.app.version.as_deref(), Some("1.2.3"));
        #[cfg(feature = "reqwest")]
        assert!(options.transport.is_some());
    }
}
