use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber. The level defaults to `info`;
/// the settings file can raise it to `debug`, and once raised `RUST_LOG` may
/// refine it further.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        // Ignore `RUST_LOG` here so a stray environment variable cannot make
        // a background indicator chatty.
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
