//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Identity accounts
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                photo_url TEXT,
                created_at TEXT NOT NULL,
                last_login TEXT
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
            );

            -- User profiles, keyed by account id
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL DEFAULT '',
                gender TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL,
                viewed_categories TEXT NOT NULL DEFAULT '[]',
                liked_events TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            -- Community halls
            CREATE TABLE IF NOT EXISTS community_halls (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                address TEXT,
                capacity INTEGER NOT NULL CHECK (capacity > 0),
                price_per_plate INTEGER NOT NULL CHECK (price_per_plate >= 0),
                available INTEGER NOT NULL DEFAULT 1,
                facilities TEXT NOT NULL DEFAULT '[]',
                owner_id TEXT NOT NULL,
                image_urls TEXT NOT NULL DEFAULT '[]',
                requires_approval INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Hall bookings
            CREATE TABLE IF NOT EXISTS hall_bookings (
                id TEXT PRIMARY KEY,
                hall_id TEXT NOT NULL,
                hall_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                user_email TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                person_name TEXT NOT NULL,
                contact_info TEXT NOT NULL,
                attendees INTEGER NOT NULL,
                purpose TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                total_amount INTEGER NOT NULL,
                status TEXT NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (hall_id) REFERENCES community_halls(id)
            );

            -- Events
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                organizer_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                is_paid INTEGER NOT NULL DEFAULT 0,
                price INTEGER NOT NULL DEFAULT 0,
                max_seats INTEGER NOT NULL CHECK (max_seats > 0),
                max_tickets INTEGER,
                tags TEXT NOT NULL DEFAULT '[]',
                contact TEXT NOT NULL DEFAULT '',
                image_urls TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            -- Event bookings
            CREATE TABLE IF NOT EXISTS event_bookings (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                event_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                user_email TEXT NOT NULL,
                person_name TEXT NOT NULL,
                contact_info TEXT NOT NULL,
                tickets INTEGER NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                total_amount INTEGER NOT NULL,
                payment_status TEXT NOT NULL,
                status TEXT NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (event_id) REFERENCES events(id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Session indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_account ON sessions(account_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

            -- Hall indexes
            CREATE INDEX IF NOT EXISTS idx_halls_owner ON community_halls(owner_id);
            CREATE INDEX IF NOT EXISTS idx_halls_created ON community_halls(created_at);

            -- Booking lookups
            CREATE INDEX IF NOT EXISTS idx_hall_bookings_hall_date ON hall_bookings(hall_id, date);
            CREATE INDEX IF NOT EXISTS idx_hall_bookings_user ON hall_bookings(user_id);
            CREATE INDEX IF NOT EXISTS idx_event_bookings_event_user ON event_bookings(event_id, user_id);
            CREATE INDEX IF NOT EXISTS idx_event_bookings_user ON event_bookings(user_id);

            -- Event listing
            CREATE INDEX IF NOT EXISTS idx_events_organizer ON events(organizer_id);
            CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
        "#,
    },
    Migration {
        version: 3,
        description: "Add city updates, feedback, and scan logs",
        sql: r#"
            CREATE TABLE IF NOT EXISTS city_updates (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url TEXT,
                location TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scan_logs (
                id TEXT PRIMARY KEY,
                booking_id TEXT NOT NULL,
                booking_kind TEXT NOT NULL,
                user_name TEXT NOT NULL,
                subject TEXT NOT NULL,
                scanned_by TEXT NOT NULL,
                scanned_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_city_updates_created ON city_updates(created_at);
            CREATE INDEX IF NOT EXISTS idx_scan_logs_booking ON scan_logs(booking_id);
        "#,
    },
    Migration {
        version: 4,
        description: "Enforce one active booking per hall date and per event user",
        sql: r#"
            -- Active rows only, so cancelled or rejected bookings free the slot
            CREATE UNIQUE INDEX IF NOT EXISTS uq_hall_bookings_active_date
                ON hall_bookings(hall_id, date)
                WHERE status NOT IN ('Cancelled', 'Rejected');

            CREATE UNIQUE INDEX IF NOT EXISTS uq_event_bookings_active_user
                ON event_bookings(event_id, user_id)
                WHERE status NOT IN ('Cancelled', 'Rejected');
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version, 0 before any migration ran
pub(super) fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}
