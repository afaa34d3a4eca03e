use fluxez::{
    logger::{self, LogLevel, LoggerConfig},
    Config,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_loaded = dotenv::dotenv().is_ok();

    let config = Config::from_env();
    let level = config.log_level.parse().unwrap_or(LogLevel::Info);
    logger::init_with_config(LoggerConfig::default().with_level(level))?;

    if env_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    config.backend.validate()?;
    logger::log_startup_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        &config.bind_address(),
    );
    logger::log_config_info(&config);

    fluxez::server::run(config).await?;
    Ok(())
}
