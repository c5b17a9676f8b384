mod common;

use anyhow::Result;
use common::{ADMIN_PASSWORD, admin, manager, test_dealership, test_settings};
use dealerbook::application::{AppError, AuthService, NewUser, require_role};
use dealerbook::domain::Role;
use dealerbook::storage::Repository;
use tempfile::TempDir;

#[tokio::test]
async fn test_bootstrap_admin_only_once() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;

    let created = dealership.auth.bootstrap_admin(ADMIN_PASSWORD).await?;
    assert_eq!(created.map(|u| u.role), Some(Role::Admin));

    let again = dealership.auth.bootstrap_admin("other").await?;
    assert!(again.is_none());
    assert_eq!(dealership.auth.list_users().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_login_and_validate_token() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    dealership.auth.bootstrap_admin(ADMIN_PASSWORD).await?;

    let login = dealership.auth.login("admin", ADMIN_PASSWORD).await?;
    assert_eq!(login.user.username, "admin");
    assert!(login.expires_at > chrono::Utc::now());

    let caller = dealership.auth.validate_token(&login.token)?;
    assert_eq!(caller.user_id, login.user.id);
    assert_eq!(caller.username, "admin");
    assert_eq!(caller.role, Role::Admin);

    Ok(())
}

#[tokio::test]
async fn test_current_user_from_token() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let caller = manager(&dealership, "sam").await?;

    let user = dealership.auth.current_user(&caller).await?;
    assert_eq!(user.id, caller.user_id);
    assert_eq!(user.username, "sam");
    assert_eq!(user.role, Role::Manager);
    assert_eq!(user.full_name, "Shop Manager");

    let mut stale = caller.clone();
    stale.user_id += 100;
    assert!(matches!(
        dealership.auth.current_user(&stale).await,
        Err(AppError::UserNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    dealership.auth.bootstrap_admin(ADMIN_PASSWORD).await?;

    assert!(matches!(
        dealership.auth.login("admin", "wrong").await,
        Err(AppError::AuthenticationFailed)
    ));
    assert!(matches!(
        dealership.auth.login("nobody", ADMIN_PASSWORD).await,
        Err(AppError::AuthenticationFailed)
    ));

    Ok(())
}

#[tokio::test]
async fn test_rejects_foreign_and_garbage_tokens() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    dealership.auth.bootstrap_admin(ADMIN_PASSWORD).await?;
    let login = dealership.auth.login("admin", ADMIN_PASSWORD).await?;

    assert!(matches!(
        dealership.auth.validate_token("not-a-token"),
        Err(AppError::AuthenticationFailed)
    ));

    // Same database, different signing secret
    let other_dir = TempDir::new()?;
    let mut settings = test_settings(&other_dir);
    settings.auth.jwt_secret = "another-secret".into();
    let repo = Repository::init(&settings.database).await?;
    let other = AuthService::new(repo, &settings.auth);
    assert!(matches!(
        other.validate_token(&login.token),
        Err(AppError::AuthenticationFailed)
    ));

    Ok(())
}

#[tokio::test]
async fn test_manager_cannot_use_admin_operations() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    let admin = admin(&dealership).await?;
    let manager = manager(&dealership, "sam").await?;

    assert!(require_role(&admin, Role::Admin).is_ok());
    assert!(matches!(
        require_role(&manager, Role::Admin),
        Err(AppError::Forbidden { required: Role::Admin })
    ));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_username() -> Result<()> {
    let (dealership, _temp) = test_dealership().await?;
    manager(&dealership, "sam").await?;

    let result = dealership
        .auth
        .create_user(NewUser {
            username: "sam".into(),
            password: "secret".into(),
            full_name: "Another Sam".into(),
            role: Role::Manager,
        })
        .await;
    assert!(matches!(result, Err(AppError::UsernameTaken(name)) if name == "sam"));

    let user = dealership.auth.get_user("sam").await?;
    assert_eq!(user.full_name, "Shop Manager");
    assert!(matches!(
        dealership.auth.get_user("ghost").await,
        Err(AppError::UserNotFound(_))
    ));

    Ok(())
}
