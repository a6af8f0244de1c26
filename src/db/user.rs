use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// The full user entity. The request path only ever borrows a read-only
/// view of this for the duration of one request.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_approved: bool,
    pub is_admin: bool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    is_active: i32,
    is_approved: i32,
    is_admin: i32,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            is_active: row.is_active != 0,
            is_approved: row.is_approved != 0,
            is_admin: row.is_admin != 0,
        }
    }
}

/// Public user summary for the admin user list. Does not expose the
/// password hash.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub is_active: bool,
    pub is_approved: bool,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserSummaryRow {
    id: String,
    email: String,
    is_active: i32,
    is_approved: i32,
    is_admin: i32,
    created_at: String,
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            is_active: row.is_active != 0,
            is_approved: row.is_approved != 0,
            is_admin: row.is_admin != 0,
            created_at: row.created_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, email, password_hash, is_active, is_approved, is_admin";

// Connection-level queries. The request-scoped session and the pool-backed
// store both run these, so each statement exists exactly once.

pub(super) async fn fetch_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<User>, sqlx::Error> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {} FROM users WHERE id = ?",
        SELECT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(User::from))
}

pub(super) async fn fetch_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {} FROM users WHERE email = ?",
        SELECT_COLUMNS
    ))
    .bind(email)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(User::from))
}

pub(super) async fn insert(conn: &mut SqliteConnection, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, is_active, is_approved, is_admin)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_active as i32)
    .bind(user.is_approved as i32)
    .bind(user.is_admin as i32)
    .execute(conn)
    .await?;
    Ok(())
}

pub(super) async fn count_all(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(conn)
        .await?;
    Ok(count.0)
}

pub(super) async fn count_admins(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_admin = 1")
        .fetch_one(conn)
        .await?;
    Ok(count.0)
}

pub(super) async fn update(conn: &mut SqliteConnection, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET email = ?, is_active = ?, is_approved = ?, is_admin = ? WHERE id = ?",
    )
    .bind(&user.email)
    .bind(user.is_active as i32)
    .bind(user.is_approved as i32)
    .bind(user.is_admin as i32)
    .bind(&user.id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn list(conn: &mut SqliteConnection) -> Result<Vec<UserSummary>, sqlx::Error> {
    let rows: Vec<UserSummaryRow> = sqlx::query_as(
        "SELECT id, email, is_active, is_approved, is_admin, created_at
         FROM users ORDER BY created_at",
    )
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(UserSummary::from).collect())
}

/// Pool-backed store for use outside the request path (startup, tests).
/// Request handlers go through the request-scoped `DbSession` instead so
/// a request never needs a second pool connection.
impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user with the given flags.
    pub async fn create(&self, user: &User) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, user).await
    }

    /// Get a user by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_id(&mut conn, id).await
    }

    /// Get a user by email.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_email(&mut conn, email).await
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        count_all(&mut conn).await
    }

    /// Count admin users. Drives the first-run registration flow.
    pub async fn count_admins(&self) -> Result<i64, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        count_admins(&mut conn).await
    }

    /// Persist updated email and role flags for a user.
    pub async fn update(&self, user: &User) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        update(&mut conn, user).await
    }

    /// Delete a user by id.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        delete(&mut conn, id).await
    }

    /// List all users for the admin user page.
    pub async fn list(&self) -> Result<Vec<UserSummary>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            is_active: false,
            is_approved: false,
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_update_flags() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().create(&user("u-1", "alice@example.com")).await.unwrap();

        let mut updated = db.users().get_by_id("u-1").await.unwrap().unwrap();
        updated.is_active = true;
        updated.is_approved = true;
        updated.email = "alice@corp.example.com".to_string();
        assert!(db.users().update(&updated).await.unwrap());

        let reloaded = db.users().get_by_id("u-1").await.unwrap().unwrap();
        assert!(reloaded.is_active);
        assert!(reloaded.is_approved);
        assert_eq!(reloaded.email, "alice@corp.example.com");
    }

    #[tokio::test]
    async fn test_update_missing_user_returns_false() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(!db.users().update(&user("ghost", "g@example.com")).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_omits_password_hash() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().create(&user("u-1", "alice@example.com")).await.unwrap();

        let listed = db.users().list().await.unwrap();
        assert_eq!(listed.len(), 1);

        let json = serde_json::to_value(&listed[0]).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_email_lookup_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().create(&user("u-1", "Alice@Example.com")).await.unwrap();

        let found = db.users().get_by_email("alice@example.com").await.unwrap();
        assert!(found.is_some());
    }
}
