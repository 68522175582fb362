use anyhow::Context;

use scene_renderer::{AppConfig, LoggingConfig, demo, init_logging, run_with_config};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let mut config = AppConfig::new();
    if let Some(root) = std::env::args_os().nth(1) {
        config = config.asset_root(root);
    }

    run_with_config(config, demo::setup).context("scene renderer stopped")?;
    Ok(())
}
