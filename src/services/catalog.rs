//! Lookups against the catalog and identity records owned by other services.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entity::{
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::AppResult,
    models::{Customer, Product},
    money::Money,
};

pub async fn find_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Option<Product>> {
    Ok(Products::find_by_id(id)
        .one(conn)
        .await?
        .map(product_from_entity))
}

pub async fn find_products<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, Product>> {
    let ids: Vec<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|model| (model.id, product_from_entity(model)))
        .collect())
}

pub async fn find_customer<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Option<Customer>> {
    Ok(Users::find_by_id(id)
        .one(conn)
        .await?
        .map(customer_from_entity))
}

pub async fn find_customer_by_email<C: ConnectionTrait>(
    conn: &C,
    email: &str,
) -> AppResult<Option<Customer>> {
    Ok(Users::find()
        .filter(UserCol::Email.eq(email.trim()))
        .one(conn)
        .await?
        .map(customer_from_entity))
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        slug: model.slug,
        image_url: model.image_url,
        price: Money::from_minor(model.price),
        is_active: model.is_active,
    }
}

fn customer_from_entity(model: UserModel) -> Customer {
    Customer {
        id: model.id,
        email: model.email,
        first_name: model.first_name,
        last_name: model.last_name,
        role: model.role,
    }
}
