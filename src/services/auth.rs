// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, CurrentUser, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String) -> Self {
        Self {
            user_repo,
            jwt_secret,
        }
    }

    // Login por username OU e-mail. O erro é sempre o mesmo
    // (InvalidCredentials) para não vazar qual dos dois existe.
    pub async fn login_user(&self, identifier: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_identifier(identifier)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AppError::InvalidCredentials);
        }

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Bcrypt é caro: roda em thread separada para não travar o runtime.
        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        let roles = self.user_repo.roles_for_user(user.id).await?;
        self.create_token(&user, &roles)
    }

    pub async fn validate_token(&self, token: &str) -> Result<CurrentUser, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self
            .user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::NotFound("Usuário"))?;

        if !user.is_active {
            return Err(AppError::InvalidToken);
        }

        // Os papéis vêm do banco, não do token: revogar um papel tem efeito
        // imediato mesmo com tokens antigos em circulação.
        let roles = self.user_repo.roles_for_user(user.id).await?;
        Ok(CurrentUser { user, roles })
    }

    // Cria um usuário com papéis dentro de uma transação: usuário sem papel
    // não deve existir.
    pub async fn create_user(
        &self,
        pool: &sqlx::PgPool,
        username: &str,
        email: &str,
        password: &str,
        role_names: &[String],
    ) -> Result<User, AppError> {
        if role_names.is_empty() {
            return Err(AppError::rule("Informe ao menos um papel para o usuário."));
        }

        let mut role_ids = Vec::with_capacity(role_names.len());
        for name in role_names {
            let role = self
                .user_repo
                .find_role_by_name(name)
                .await?
                .ok_or(AppError::NotFound("Papel"))?;
            role_ids.push(role.id);
        }

        let password_clone = password.to_owned();
        let hashed_password =
            tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        let mut tx = pool.begin().await?;

        let user = self
            .user_repo
            .create_user(&mut *tx, username, email, &hashed_password)
            .await?;

        for role_id in role_ids {
            self.user_repo.assign_role(&mut *tx, user.id, role_id).await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    // Bootstrap: se o banco está vazio, cria o admin inicial para que o
    // sistema seja utilizável logo após a primeira subida.
    pub async fn ensure_default_admin(
        &self,
        pool: &sqlx::PgPool,
        password: &str,
    ) -> Result<(), AppError> {
        if self.user_repo.count_users().await? > 0 {
            return Ok(());
        }

        self.create_user(
            pool,
            "admin",
            "admin@localhost",
            password,
            &["ADMIN".to_string()],
        )
        .await?;

        tracing::info!("👤 Usuário 'admin' criado (primeira execução).");
        Ok(())
    }

    fn create_token(&self, user: &User, roles: &[String]) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            roles: roles.to_vec(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "kiosk".to_string(),
            email: "kiosk@example.com".to_string(),
            password_hash: "x".to_string(),
            is_active: true,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let secret = "segredo-de-teste";
        let user = sample_user();
        let roles = vec!["MANAGER".to_string(), "STAFF".to_string()];

        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            roles: roles.clone(),
            exp: (now + chrono::Duration::days(7)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, user.id);
        assert_eq!(decoded.claims.username, "kiosk");
        assert_eq!(decoded.claims.roles, roles);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let user = sample_user();
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            roles: vec!["STAFF".to_string()],
            exp: (now + chrono::Duration::days(1)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"segredo-a"),
        )
        .unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"segredo-b"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
