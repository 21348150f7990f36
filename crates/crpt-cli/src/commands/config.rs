use anyhow::Result;
use crpt_client::{config, Config};
use std::path::{Path, PathBuf};

fn resolve_path(custom: Option<&Path>) -> PathBuf {
    custom.map_or_else(config::config_file_path, Path::to_path_buf)
}

/// Show the current effective configuration.
pub fn show_config(config: &Config, custom: Option<&Path>) {
    let path = resolve_path(custom);

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", path.display());
    let exists = path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  api_url: {}", config.api_url);
    println!("  request_limit: {}", config.request_limit);
    println!("  time_unit: {:?} ({:?} window)", config.time_unit, config.window());
    println!("  request_timeout_secs: {}", config.request_timeout_secs);
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());
    println!("  logging.output: {:?}", config.logging.output());

    println!("\nPriority: CLI args > ENV vars (CRPT_*) > Config file > Defaults");
}

/// Show the config file path.
pub fn show_path(custom: Option<&Path>) {
    println!("{}", resolve_path(custom).display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config(custom: Option<&Path>) -> Result<()> {
    let path = resolve_path(custom);
    let created = config::ensure_config_file_at(&path)?;

    if created {
        println!("✓ Created config file: {}", path.display());
        println!("\nEdit this file to configure crpt.");
    } else {
        println!("Config file already exists: {}", path.display());
    }

    Ok(())
}
