use std::sync::{Arc, Mutex};

use anyhow::Result;
use backend::{api, config::Config, db::Db};

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let db = Arc::new(Mutex::new(Db::connect(&config.database_url)?));

    api::new_http_server(db, &config).await?;

    log::info!("Shut down");
    Ok(())
}
