//! SQLite access for users and bonus levels.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::levels::level_for_spending;
use crate::types::{BonusLevel, User};

/// Levels seeded into an empty database. Bronze is the implicit base level
/// every account starts at; it has no row and no threshold.
pub const SEED_LEVELS: [(&str, f64); 3] = [
    ("Silver", 1000.0),
    ("Gold", 5000.0),
    ("Platinum", 10000.0),
];

pub const BASE_LEVEL: &str = "Bronze";

/// Open a connection pool, creating the database file if it does not exist.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Create the schema and seed the bonus levels. Seeding happens only when the
/// level table is empty, so restarting the service never duplicates rows.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            spending REAL NOT NULL DEFAULT 0.0,
            level TEXT NOT NULL DEFAULT '{BASE_LEVEL}'
        )"
    ))
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bonus_levels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            level_name TEXT NOT NULL UNIQUE,
            min_spending REAL NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bonus_levels")
        .fetch_one(pool)
        .await?;
    if existing == 0 {
        for (level_name, min_spending) in SEED_LEVELS {
            sqlx::query("INSERT INTO bonus_levels (level_name, min_spending) VALUES (?, ?)")
                .bind(level_name)
                .bind(min_spending)
                .execute(pool)
                .await?;
        }
        info!("seeded bonus levels");
    }
    Ok(())
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, spending, level FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn find_user_by_credentials(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, spending, level FROM users
         WHERE username = ? AND password = ?",
    )
    .bind(username)
    .bind(password)
    .fetch_optional(pool)
    .await
}

pub async fn find_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, spending, level FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Insert a new user with zero spending at the base level. Returns the row id.
pub async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(password)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn all_levels(pool: &SqlitePool) -> Result<Vec<BonusLevel>, sqlx::Error> {
    sqlx::query_as::<_, BonusLevel>(
        "SELECT id, level_name, min_spending FROM bonus_levels ORDER BY min_spending ASC",
    )
    .fetch_all(pool)
    .await
}

/// Atomically add to a user's spending and promote the stored level for the
/// new total. The increment happens in SQL so concurrent additions cannot
/// overwrite each other. Returns the new total and level, or `None` when no
/// user has the given id.
pub async fn add_user_spending(
    pool: &SqlitePool,
    id: i64,
    amount: f64,
    levels: &[BonusLevel],
) -> Result<Option<(f64, String)>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let new_spending: Option<f64> = sqlx::query_scalar(
        "UPDATE users SET spending = spending + ? WHERE id = ? RETURNING spending",
    )
    .bind(amount)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let new_spending = match new_spending {
        Some(total) => total,
        None => return Ok(None),
    };

    // a total below every threshold keeps the user's current level
    let promoted = level_for_spending(levels, new_spending).map(|level| level.level_name.as_str());
    let new_level: String = sqlx::query_scalar(
        "UPDATE users SET level = COALESCE(?, level) WHERE id = ? RETURNING level",
    )
    .bind(promoted)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some((new_spending, new_level)))
}
