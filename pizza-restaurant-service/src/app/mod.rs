use anyhow::Context;
use clap::Args;
use tracing::info;

use pizza_restaurant_service::store::Store;

pub mod seed;
pub mod serve;

#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// SQLite database file, or `:memory:`
    #[arg(long, env = "DATABASE_URL", default_value = "app.db", global = true)]
    pub database_url: String,
    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 8, global = true)]
    pub pool_size: u32,
}

impl DatabaseArgs {
    /// Opens the pool and brings the schema up to date.
    pub fn connect(&self) -> anyhow::Result<Store> {
        let store = Store::connect(&self.database_url, self.pool_size)
            .with_context(|| format!("failed to open database {}", self.database_url))?;
        let applied = store.migrate().context("failed to run migrations")?;
        info!(applied, database_url = %self.database_url, "database ready");
        Ok(store)
    }
}

pub fn migrate(database: &DatabaseArgs) -> anyhow::Result<()> {
    database.connect()?;
    Ok(())
}
