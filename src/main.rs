#![cfg(not(tarpaulin_include))]

use sheetdrive::{app, config};

/// Start the web server with settings from `sheetdrive.toml` and the
/// environment. `RUST_LOG` overrides the default `info` log level.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = config::load_settings()?;
    app::run(settings).await
}
