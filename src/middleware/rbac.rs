// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{common::error::AppError, models::auth::CurrentUser};

/// 1. O Trait que define o conjunto de papéis exigido por um endpoint
pub trait RoleSet: Send + Sync + 'static {
    fn allowed() -> &'static [&'static str];
}

// Basta UM papel em comum (ANY-of, não ALL-of).
pub fn has_any_role(user_roles: &[String], allowed: &[&str]) -> bool {
    user_roles.iter().any(|r| allowed.contains(&r.as_str()))
}

/// 2. O Extractor (Guardião)
pub struct RequireRole<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleSet,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let current = parts
            .extensions
            .get::<CurrentUser>()
            .ok_or(AppError::InvalidToken)?;

        if !has_any_role(&current.roles, T::allowed()) {
            return Err(AppError::Forbidden(format!(
                "Esta ação exige um dos papéis: {}.",
                T::allowed().join(", ")
            )));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// CONJUNTOS DE PAPÉIS (TIPOS)
// ---

pub struct AdminOnly;
impl RoleSet for AdminOnly {
    fn allowed() -> &'static [&'static str] {
        &["ADMIN"]
    }
}

pub struct ManagerUp;
impl RoleSet for ManagerUp {
    fn allowed() -> &'static [&'static str] {
        &["ADMIN", "MANAGER"]
    }
}

pub struct AnyStaff;
impl RoleSet for AnyStaff {
    fn allowed() -> &'static [&'static str] {
        &["ADMIN", "MANAGER", "STAFF"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn any_single_matching_role_grants_access() {
        assert!(has_any_role(&roles(&["STAFF"]), AnyStaff::allowed()));
        assert!(has_any_role(&roles(&["MANAGER", "STAFF"]), ManagerUp::allowed()));
    }

    #[test]
    fn match_is_any_of_not_all_of() {
        // Ter só MANAGER basta para ManagerUp, mesmo sem ADMIN.
        assert!(has_any_role(&roles(&["MANAGER"]), ManagerUp::allowed()));
    }

    #[test]
    fn missing_role_denies_access() {
        assert!(!has_any_role(&roles(&["STAFF"]), AdminOnly::allowed()));
        assert!(!has_any_role(&roles(&[]), AnyStaff::allowed()));
    }
}
