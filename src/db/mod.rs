mod user;

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use tokio::sync::Mutex;

pub use user::{User, UserStore, UserSummary};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 0,
                    is_approved INTEGER NOT NULL DEFAULT 0,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                "CREATE INDEX idx_users_is_admin ON users(is_admin)",
            ],
        )
        .await
    }

    /// Get the user store. For use outside the request path (startup,
    /// tests); request handlers query through the request's `DbSession`.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Acquire a request-scoped session. The underlying connection is
    /// returned to the pool when the last clone drops, on every exit path.
    pub async fn session(&self) -> Result<DbSession, sqlx::Error> {
        Ok(DbSession {
            conn: Arc::new(Mutex::new(self.pool.acquire().await?)),
        })
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// A pooled connection scoped to one request. The middleware acquires it,
/// shares a clone into the request extensions, and every query for that
/// request runs on the same connection. A request therefore holds exactly
/// one pool connection, however many lookups it makes.
#[derive(Clone)]
pub struct DbSession {
    conn: Arc<Mutex<PoolConnection<Sqlite>>>,
}

impl DbSession {
    /// Load a user by id. `None` means the identity no longer exists.
    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::fetch_by_id(&mut conn, id).await
    }

    /// Load a user by email (case-insensitive per the schema collation).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::fetch_by_email(&mut conn, email).await
    }

    /// Insert a new user with the given flags.
    pub async fn create_user(&self, new_user: &User) -> Result<(), sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::insert(&mut conn, new_user).await
    }

    /// Count all users.
    pub async fn count_users(&self) -> Result<i64, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::count_all(&mut conn).await
    }

    /// Count admin users.
    pub async fn count_admins(&self) -> Result<i64, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::count_admins(&mut conn).await
    }

    /// Persist updated email and role flags for a user.
    pub async fn update_user(&self, updated: &User) -> Result<bool, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::update(&mut conn, updated).await
    }

    /// Delete a user by id.
    pub async fn delete_user(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::delete(&mut conn, id).await
    }

    /// List all users for the admin user page.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        user::list(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            is_active: true,
            is_approved: true,
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create(&test_user("u-1", "alice@example.com")).await.unwrap();

        let user = db.users().get_by_id("u-1").await.unwrap().unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert!(user.is_active);
        assert!(!user.is_admin);

        let user = db
            .users()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, "u-1");
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create(&test_user("u-1", "alice@example.com")).await.unwrap();
        let result = db.users().create(&test_user("u-2", "alice@example.com")).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_session_sees_deletions() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().create(&test_user("u-1", "alice@example.com")).await.unwrap();

        let session = db.session().await.unwrap();
        assert!(session.find_user_by_id("u-1").await.unwrap().is_some());

        db.users().delete("u-1").await.unwrap();
        assert!(session.find_user_by_id("u-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_clones_share_one_connection() {
        // Five sessions exhaust the pool; clones of one session must not.
        let db = Database::open(":memory:").await.unwrap();
        db.users().create(&test_user("u-1", "alice@example.com")).await.unwrap();

        let session = db.session().await.unwrap();
        let clones: Vec<DbSession> = (0..10).map(|_| session.clone()).collect();
        for clone in &clones {
            assert!(clone.find_user_by_id("u-1").await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_admin_and_user_counts() {
        let db = Database::open(":memory:").await.unwrap();
        assert_eq!(db.users().count().await.unwrap(), 0);
        assert_eq!(db.users().count_admins().await.unwrap(), 0);

        let mut admin = test_user("u-1", "admin@example.com");
        admin.is_admin = true;
        db.users().create(&admin).await.unwrap();
        db.users().create(&test_user("u-2", "bob@example.com")).await.unwrap();

        assert_eq!(db.users().count().await.unwrap(), 2);
        assert_eq!(db.users().count_admins().await.unwrap(), 1);
    }
}
