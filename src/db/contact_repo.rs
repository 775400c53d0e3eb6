// src/db/contact_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::messaging::{Contact, Group},
};

#[derive(Clone)]
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Contatos
    // ---

    pub async fn list_contacts(&self) -> Result<Vec<Contact>, AppError> {
        let contacts = sqlx::query_as::<_, Contact>("SELECT * FROM contacts ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(contacts)
    }

    pub async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, AppError> {
        let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(contact)
    }

    pub async fn create_contact(
        &self,
        name: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<Contact, AppError> {
        sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (name, phone, email)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Duplicate(format!("Contato com telefone '{}'", phone));
                }
            }
            e.into()
        })
    }

    pub async fn delete_contact(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Grupos
    // ---

    pub async fn list_groups(&self) -> Result<Vec<Group>, AppError> {
        let groups = sqlx::query_as::<_, Group>("SELECT * FROM groups ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    pub async fn find_group(&self, id: Uuid) -> Result<Option<Group>, AppError> {
        let group = sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(group)
    }

    pub async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Group, AppError> {
        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (name, description)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Duplicate(format!("Grupo '{}'", name));
                }
            }
            e.into()
        })
    }

    pub async fn add_contact_to_group(
        &self,
        group_id: Uuid,
        contact_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO group_contacts (group_id, contact_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(group_id)
        .bind(contact_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_contact_from_group(
        &self,
        group_id: Uuid,
        contact_id: Uuid,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM group_contacts WHERE group_id = $1 AND contact_id = $2")
                .bind(group_id)
                .bind(contact_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    // Contatos de um grupo, na ordem em que serão enviados.
    pub async fn contacts_in_group(&self, group_id: Uuid) -> Result<Vec<Contact>, AppError> {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT c.* FROM contacts c
            JOIN group_contacts gc ON gc.contact_id = c.id
            WHERE gc.group_id = $1
            ORDER BY c.name ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(contacts)
    }
}
