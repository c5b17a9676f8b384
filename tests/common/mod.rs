// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use dealerbook::application::{Dealership, NewUser};
use dealerbook::config::Settings;
use dealerbook::domain::{Caller, NewSparePart, NewTractor, Role, TractorType};
use tempfile::TempDir;

pub const ADMIN_PASSWORD: &str = "admin123";

/// Settings pointing at a fresh database inside `temp_dir`, with a cheap bcrypt cost.
pub fn test_settings(temp_dir: &TempDir) -> Settings {
    let db_path = temp_dir.path().join("test.db");
    let mut settings = Settings::default().with_database_path(db_path.to_str().unwrap());
    settings.auth.bcrypt_cost = 4;
    settings.auth.jwt_secret = "test-secret".into();
    settings
}

/// Helper to create a dealership with a temporary database
pub async fn test_dealership() -> Result<(Dealership, TempDir)> {
    let temp_dir = TempDir::new()?;
    let dealership = Dealership::init(&test_settings(&temp_dir)).await?;
    Ok((dealership, temp_dir))
}

/// Seed the admin account and return it as a caller.
pub async fn admin(dealership: &Dealership) -> Result<Caller> {
    dealership.auth.bootstrap_admin(ADMIN_PASSWORD).await?;
    let login = dealership.auth.login("admin", ADMIN_PASSWORD).await?;
    Ok(dealership.auth.validate_token(&login.token)?)
}

pub async fn manager(dealership: &Dealership, username: &str) -> Result<Caller> {
    dealership
        .auth
        .create_user(NewUser {
            username: username.into(),
            password: "manager123".into(),
            full_name: "Shop Manager".into(),
            role: Role::Manager,
        })
        .await?;
    let login = dealership.auth.login(username, "manager123").await?;
    Ok(dealership.auth.validate_token(&login.token)?)
}

/// A new tractor bought from a supplier, price in whole units.
pub fn tractor(brand: &str, model: &str, chassis: &str, price: i64) -> NewTractor {
    NewTractor::new(brand, model, chassis, price * 100)
        .with_year(2023)
        .with_engine_number(format!("EN-{chassis}"))
        .with_supplier("Tractor Wholesale Ltd")
}

pub fn trade_in(brand: &str, model: &str, chassis: &str, price: i64) -> NewTractor {
    NewTractor::new(brand, model, chassis, price * 100)
        .with_year(2015)
        .with_type(TractorType::Used)
}

/// A spare part with `stock` units on hand and a reorder threshold of `min`.
pub fn part(name: &str, number: &str, unit_price: i64, stock: i64, min: i64) -> NewSparePart {
    NewSparePart::new(name, number, unit_price)
        .with_stock(stock)
        .with_min_stock(min)
}
