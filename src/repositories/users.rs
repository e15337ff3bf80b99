use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AuthUser, Role};

use super::decode_err;

/// Loads the principal's row for request authentication. The caller checks
/// the `activo` flag; a missing row means the token outlived the account.
pub async fn find_auth_user(pool: &PgPool, id: Uuid) -> Result<Option<AuthUser>, AppError> {
    let row = sqlx::query("SELECT id, email, nombre, apellido, role, activo FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| {
        let role: String = r.get("role");
        Ok::<AuthUser, sqlx::Error>(AuthUser {
            id: r.get("id"),
            email: r.get("email"),
            nombre: r.get("nombre"),
            apellido: r.get("apellido"),
            role: Role::parse(&role)
                .ok_or_else(|| decode_err(format!("unknown role in users row: {role}")))?,
            activo: r.get("activo"),
        })
    })
    .transpose()
    .map_err(AppError::from)
}
