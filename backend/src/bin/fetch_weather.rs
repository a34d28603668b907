use anyhow::Result;
use backend::{
    config::Config,
    db::Db,
    weather::{ReqwestTransport, WeatherService},
};
use clap::Parser;

/// Fetch the current weather for a city from OpenWeather.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// City name as understood by OpenWeather, e.g. "London" or "London,GB"
    city: String,

    /// Store the fetched record in the database
    #[arg(long)]
    save: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let api_key = config.require_api_key()?;

    let db = Db::connect(&config.database_url)?;
    let mut service = WeatherService::new(
        ReqwestTransport::new()?,
        db,
        config.openweather_api_url.as_str(),
        api_key,
    );

    let data = service.fetch_weather_data(&args.city)?;
    println!("{}", serde_json::to_string_pretty(&data)?);

    if args.save {
        service.save_weather_data(&data)?;
        log::info!("Saved weather data for {}", args.city);
    }

    Ok(())
}
