use crate::{
    auth::hash_password,
    config::AppConfig,
    error::AppError,
    models::{NewUser, Role},
    repository::RepositoryState,
};

/// ensure_superadmin
///
/// Seeds the account named by `SUPERADMIN_PSEUDO` / `SUPERADMIN_PASSWORD` with the
/// superadmin role. Without it, no account could ever be promoted, since only admins
/// change roles. An existing account with that pseudo is left as it is.
pub async fn ensure_superadmin(repo: &RepositoryState, config: &AppConfig) -> Result<(), AppError> {
    let Some(account) = &config.superadmin else {
        return Ok(());
    };

    if let Some(existing) = repo.find_user_by_pseudo(&account.pseudo).await? {
        if existing.role != Role::Superadmin {
            tracing::warn!(
                user_id = existing.id,
                role = %existing.role,
                "bootstrap pseudo belongs to an account without the superadmin role"
            );
        }
        return Ok(());
    }

    let password_hash = hash_password(account.password.clone(), config.bcrypt_cost).await?;
    let user = repo
        .create_user(NewUser {
            pseudo: account.pseudo.clone(),
            password_hash,
            email: None,
            country: None,
            biography: None,
            avatar: None,
            role: Role::Superadmin,
        })
        .await?;

    tracing::info!(user_id = user.id, pseudo = %user.pseudo, "superadmin account created");
    Ok(())
}
