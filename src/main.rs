use kestrel_script_bridge::cli::CliOverrides;
use kestrel_script_bridge::config::AppConfig;
use kestrel_script_bridge::run_with_overrides;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli_overrides = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    init_tracing(&cli_overrides);
    if let Err(err) = run_with_overrides(&cli_overrides) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(cli: &CliOverrides) {
    let configured = AppConfig::load(cli.config_path()).map(|cfg| cfg.logging.filter).unwrap_or_else(|_| "info".into());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}
