use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use storefront_checkout::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    middleware::auth::{ADMIN_ROLE, issue_token},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin@example.com", "Ada", "Admin", ADMIN_ROLE).await?;
    let user_id = ensure_user(&orm, "user@example.com", "Grace", "Hopper", "customer").await?;
    seed_products(&orm).await?;

    // Identity lives in another service; these tokens stand in for its logins.
    let ttl = Duration::days(7);
    let admin_token = issue_token(&config.jwt_secret, admin_id, "admin@example.com", ADMIN_ROLE, ttl)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user_token = issue_token(&config.jwt_secret, user_id, "user@example.com", "customer", ttl)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    println!("Admin token: {admin_token}");
    println!("User token: {user_token}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    first_name: &str,
    last_name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present");
        return Ok(existing.id);
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        first_name: Set(first_name.to_string()),
        last_name: Set(last_name.to_string()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let products = [
        ("Ferris Mug", "ferris-mug", 499),
        ("Rust Sticker Pack", "rust-sticker-pack", 349),
        ("Axum Hoodie", "axum-hoodie", 5500),
        ("E-book: Async Rust", "ebook-async-rust", 2500),
    ];

    for (name, slug, price) in products {
        let exists = Products::find()
            .filter(ProdCol::Slug.eq(slug))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let now = Utc::now();
        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            image_url: Set(None),
            price: Set(price),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
