use anyhow::Result;
use calfetch_core::config::CacheConfig;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let config_path = CacheConfig::config_path()?;

    if !config_path.exists() {
        CacheConfig::create_default_config(&config_path)?;
        println!("{} {}", "Created".green(), config_path.display());
    }

    let config = CacheConfig::load()?;

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());
    println!();
    println!("{}", "Effective configuration".bold());
    print!("{}", toml::to_string_pretty(&config.redacted())?);

    if config.api_key.is_empty() || config.calendar_id.is_empty() {
        println!();
        println!(
            "{}",
            "Set api_key and calendar_id in the config file or via CALFETCH_API_KEY and CALFETCH_CALENDAR_ID"
                .yellow()
        );
    }

    Ok(())
}
