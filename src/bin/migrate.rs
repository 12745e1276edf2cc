use sea_orm_migration::MigratorTrait;
use storefront_checkout::{config::AppConfig, db::create_orm_conn, migration::Migrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;

    match std::env::args().nth(1).as_deref() {
        None | Some("up") => {
            Migrator::up(&orm, None).await?;
            println!("Migrations applied");
        }
        Some("down") => {
            Migrator::down(&orm, Some(1)).await?;
            println!("Rolled back last migration");
        }
        Some("status") => Migrator::status(&orm).await?,
        Some(other) => anyhow::bail!("unknown command '{other}', expected up, down or status"),
    }
    Ok(())
}
