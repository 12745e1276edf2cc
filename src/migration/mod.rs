use sea_orm_migration::prelude::*;

mod m20260101_000001_create_catalog_and_identity;
mod m20260101_000002_create_carts;
mod m20260101_000003_create_orders;
mod m20260101_000004_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_catalog_and_identity::Migration),
            Box::new(m20260101_000002_create_carts::Migration),
            Box::new(m20260101_000003_create_orders::Migration),
            Box::new(m20260101_000004_create_audit_logs::Migration),
        ]
    }
}
