//! SQLite storage layer.
//!
//! Single source of truth for workshops, registrations, notifications, and
//! the event log. Opened in-memory by default; all writes go through the
//! scheduler, and multi-statement operations run inside a transaction so
//! capacity checks and increments commit as one step.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::model::*;

/// Storage backend. Owns the SQLite connection.
pub struct Store {
    conn: Connection,
}

/// Handle for performing storage operations within a transaction.
///
/// All methods delegate to the same SQL logic as `Store`, but execute
/// against the transaction's connection. Either all operations commit
/// together or none do.
pub(crate) struct TxContext<'a> {
    tx: &'a Connection,
}

impl TxContext<'_> {
    pub fn get_workshop(&self, id: WorkshopId) -> Result<Workshop> {
        get_workshop_on(self.tx, id)
    }

    pub fn insert_workshop(&self, new: &NewWorkshop, now: DateTime<Utc>) -> Result<Workshop> {
        insert_workshop_on(self.tx, new, now)
    }

    pub fn update_status(
        &self,
        id: WorkshopId,
        new_status: Status,
        now: DateTime<Utc>,
    ) -> Result<Status> {
        update_status_on(self.tx, id, new_status, now)
    }

    pub fn set_filled(&self, id: WorkshopId, filled: u32, now: DateTime<Utc>) -> Result<()> {
        set_filled_on(self.tx, id, filled, now)
    }

    pub fn find_registration(
        &self,
        workshop_id: WorkshopId,
        user_id: &str,
    ) -> Result<Option<Registration>> {
        find_registration_on(self.tx, workshop_id, user_id)
    }

    pub fn insert_registration(
        &self,
        workshop_id: WorkshopId,
        new: &NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<Registration> {
        insert_registration_on(self.tx, workshop_id, new, now)
    }

    pub fn delete_registration(&self, id: RegistrationId) -> Result<()> {
        delete_registration_on(self.tx, id)
    }

    pub fn record_event(&self, kind: EventKind) -> Result<Event> {
        record_event_on(self.tx, kind)
    }

    pub fn insert_notification(
        &self,
        user_id: &str,
        kind: &str,
        message: &str,
        workshop_id: Option<WorkshopId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        insert_notification_on(self.tx, user_id, kind, message, workshop_id, now)
    }
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory database. The default for the mock catalog.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&mut self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS workshops (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                title            TEXT NOT NULL,
                description      TEXT NOT NULL DEFAULT '',
                instructor       TEXT NOT NULL DEFAULT '',
                mode             TEXT NOT NULL DEFAULT 'online',
                tags             TEXT NOT NULL DEFAULT '[]',
                scheduled_start  TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL,
                status           TEXT NOT NULL DEFAULT 'upcoming',
                capacity_total   INTEGER NOT NULL,
                capacity_filled  INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_workshops_status ON workshops(status);
            CREATE INDEX IF NOT EXISTS idx_workshops_start ON workshops(scheduled_start);

            CREATE TABLE IF NOT EXISTS registrations (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                workshop_id   INTEGER NOT NULL REFERENCES workshops(id),
                user_id       TEXT NOT NULL,
                user_email    TEXT,
                user_name     TEXT,
                status        TEXT NOT NULL DEFAULT 'confirmed',
                registered_at TEXT NOT NULL,
                UNIQUE(user_id, workshop_id)
            );

            CREATE INDEX IF NOT EXISTS idx_registrations_user ON registrations(user_id);

            CREATE TABLE IF NOT EXISTS events (
                seq       INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                kind      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                kind        TEXT NOT NULL,
                message     TEXT NOT NULL,
                workshop_id INTEGER,
                created_at  TEXT NOT NULL,
                read        INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);
            ",
        )?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Execute a closure within a SQLite transaction.
    ///
    /// The transaction commits if the closure returns Ok, rolls back on Err.
    pub(crate) fn with_transaction<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TxContext) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let mut ctx = TxContext { tx: &tx };
        let result = f(&mut ctx)?;
        tx.commit()?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Workshops
    // -----------------------------------------------------------------------

    /// Get a workshop by ID.
    pub fn get_workshop(&self, id: WorkshopId) -> Result<Workshop> {
        get_workshop_on(&self.conn, id)
    }

    /// List workshops, optionally filtered by status, ordered by start time.
    pub fn list_workshops(&self, status: Option<Status>) -> Result<Vec<Workshop>> {
        let sql = "SELECT id, title, description, instructor, mode, tags, scheduled_start,
                          duration_minutes, status, capacity_total, capacity_filled,
                          created_at, updated_at
                   FROM workshops
                   WHERE (?1 IS NULL OR status = ?1)
                   ORDER BY scheduled_start ASC, id ASC";
        let mut stmt = self.conn.prepare(sql)?;

        let rows = stmt
            .query_map(params![status.map(|s| s.to_string())], |row| {
                Ok(row_to_workshop(row))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| Error::Other(format!("parse error: {e}")))?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Registrations
    // -----------------------------------------------------------------------

    /// Find a user's registration for a workshop, if any.
    pub fn find_registration(
        &self,
        workshop_id: WorkshopId,
        user_id: &str,
    ) -> Result<Option<Registration>> {
        find_registration_on(&self.conn, workshop_id, user_id)
    }

    /// All registrations for a user, oldest first.
    pub fn registrations_for_user(&self, user_id: &str) -> Result<Vec<Registration>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workshop_id, user_id, user_email, user_name, status, registered_at
             FROM registrations WHERE user_id = ?1 ORDER BY registered_at ASC, id ASC",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| Ok(row_to_registration(row)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| Error::Other(format!("parse error: {e}")))?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Get events since a sequence number.
    pub fn events_since(&self, since_seq: u64) -> Result<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, timestamp, kind FROM events WHERE seq > ?1 ORDER BY seq ASC")?;

        let events = stmt
            .query_map(params![since_seq as i64], |row| {
                let kind_str: String = row.get(2)?;
                Ok(Event {
                    seq: row.get::<_, i64>(0)? as u64,
                    timestamp: row
                        .get::<_, String>(1)?
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                    kind: serde_json::from_str(&kind_str)
                        .unwrap_or(EventKind::Unknown { raw: kind_str }),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// A user's notifications, newest first.
    pub fn notifications_for_user(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, kind, message, workshop_id, created_at, read
             FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| Ok(row_to_notification(row)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| Error::Other(format!("parse error: {e}")))?);
        }
        Ok(result)
    }

    /// Mark a notification as read.
    pub fn mark_notification_read(&mut self, id: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1",
            params![id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("notification {id}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inner functions accept &Connection so they work with both
// Connection (auto-commit) and Transaction (deref to Connection).
// ---------------------------------------------------------------------------

fn insert_workshop_on(
    conn: &Connection,
    new: &NewWorkshop,
    now: DateTime<Utc>,
) -> Result<Workshop> {
    let filled = new.capacity_filled.min(new.capacity_total);
    conn.execute(
        "INSERT INTO workshops (
            title, description, instructor, mode, tags, scheduled_start,
            duration_minutes, status, capacity_total, capacity_filled,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            new.title,
            new.description,
            new.instructor,
            new.mode.to_string(),
            serde_json::to_string(&new.tags).unwrap_or_else(|_| "[]".to_string()),
            new.scheduled_start.to_rfc3339(),
            new.duration_minutes,
            Status::Upcoming.to_string(),
            new.capacity_total,
            filled,
            now.to_rfc3339(),
        ],
    )?;

    get_workshop_on(conn, WorkshopId(conn.last_insert_rowid()))
}

fn get_status_on(conn: &Connection, id: WorkshopId) -> Result<Status> {
    let status_str: String = conn
        .query_row(
            "SELECT status FROM workshops WHERE id = ?1",
            params![id.0],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("workshop {id}")))?;

    status_str.parse()
}

fn get_workshop_on(conn: &Connection, id: WorkshopId) -> Result<Workshop> {
    conn.query_row(
        "SELECT id, title, description, instructor, mode, tags, scheduled_start,
                duration_minutes, status, capacity_total, capacity_filled,
                created_at, updated_at
         FROM workshops WHERE id = ?1",
        params![id.0],
        |row| Ok(row_to_workshop(row)),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("workshop {id}")))?
    .map_err(|e| Error::Other(format!("failed to parse workshop: {e}")))
}

fn update_status_on(
    conn: &Connection,
    id: WorkshopId,
    new_status: Status,
    now: DateTime<Utc>,
) -> Result<Status> {
    let old_status = get_status_on(conn, id)?;

    if !old_status.can_transition_to(new_status) {
        return Err(Error::InvalidTransition {
            from: old_status,
            to: new_status,
        });
    }

    conn.execute(
        "UPDATE workshops SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![new_status.to_string(), now.to_rfc3339(), id.0],
    )?;

    Ok(old_status)
}

fn set_filled_on(conn: &Connection, id: WorkshopId, filled: u32, now: DateTime<Utc>) -> Result<()> {
    let updated = conn.execute(
        "UPDATE workshops SET capacity_filled = ?1, updated_at = ?2 WHERE id = ?3",
        params![filled, now.to_rfc3339(), id.0],
    )?;
    if updated == 0 {
        return Err(Error::NotFound(format!("workshop {id}")));
    }
    Ok(())
}

fn find_registration_on(
    conn: &Connection,
    workshop_id: WorkshopId,
    user_id: &str,
) -> Result<Option<Registration>> {
    conn.query_row(
        "SELECT id, workshop_id, user_id, user_email, user_name, status, registered_at
         FROM registrations WHERE workshop_id = ?1 AND user_id = ?2",
        params![workshop_id.0, user_id],
        |row| Ok(row_to_registration(row)),
    )
    .optional()?
    .transpose()
    .map_err(|e| Error::Other(format!("failed to parse registration: {e}")))
}

fn insert_registration_on(
    conn: &Connection,
    workshop_id: WorkshopId,
    new: &NewRegistration,
    now: DateTime<Utc>,
) -> Result<Registration> {
    conn.execute(
        "INSERT INTO registrations (workshop_id, user_id, user_email, user_name, status, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            workshop_id.0,
            new.user_id,
            new.user_email,
            new.user_name,
            RegistrationStatus::Confirmed.to_string(),
            now.to_rfc3339(),
        ],
    )?;

    let id = RegistrationId(conn.last_insert_rowid());
    conn.query_row(
        "SELECT id, workshop_id, user_id, user_email, user_name, status, registered_at
         FROM registrations WHERE id = ?1",
        params![id.0],
        |row| Ok(row_to_registration(row)),
    )?
    .map_err(|e| Error::Other(format!("failed to parse registration: {e}")))
}

fn delete_registration_on(conn: &Connection, id: RegistrationId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM registrations WHERE id = ?1", params![id.0])?;
    if deleted == 0 {
        return Err(Error::NotFound(format!("registration {id}")));
    }
    Ok(())
}

fn record_event_on(conn: &Connection, kind: EventKind) -> Result<Event> {
    let now = Utc::now();

    conn.execute(
        "INSERT INTO events (timestamp, kind) VALUES (?1, ?2)",
        params![
            now.to_rfc3339(),
            serde_json::to_string(&kind).unwrap_or_default(),
        ],
    )?;

    let seq = conn.last_insert_rowid();

    Ok(Event {
        seq: seq as u64,
        timestamp: now,
        kind,
    })
}

fn insert_notification_on(
    conn: &Connection,
    user_id: &str,
    kind: &str,
    message: &str,
    workshop_id: Option<WorkshopId>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (user_id, kind, message, workshop_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            kind,
            message,
            workshop_id.map(|id| id.0),
            now.to_rfc3339(),
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row parsing helpers
// ---------------------------------------------------------------------------

fn row_to_workshop(row: &rusqlite::Row) -> std::result::Result<Workshop, String> {
    let mode_str: String = row.get(4).map_err(|e| e.to_string())?;
    let tags_str: String = row.get(5).map_err(|e| e.to_string())?;
    let start_str: String = row.get(6).map_err(|e| e.to_string())?;
    let status_str: String = row.get(8).map_err(|e| e.to_string())?;
    let created_str: String = row.get(11).map_err(|e| e.to_string())?;
    let updated_str: String = row.get(12).map_err(|e| e.to_string())?;

    Ok(Workshop {
        id: WorkshopId(row.get(0).map_err(|e| e.to_string())?),
        title: row.get(1).map_err(|e| e.to_string())?,
        description: row.get(2).map_err(|e| e.to_string())?,
        instructor: row.get(3).map_err(|e| e.to_string())?,
        mode: mode_str.parse().map_err(|e: Error| e.to_string())?,
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        scheduled_start: start_str
            .parse()
            .map_err(|_| "invalid scheduled_start".to_string())?,
        duration_minutes: row.get(7).map_err(|e| e.to_string())?,
        status: status_str.parse().map_err(|e: Error| e.to_string())?,
        capacity: Capacity {
            total: row.get(9).map_err(|e| e.to_string())?,
            filled: row.get(10).map_err(|e| e.to_string())?,
        },
        created_at: created_str
            .parse()
            .map_err(|_| "invalid created_at".to_string())?,
        updated_at: updated_str
            .parse()
            .map_err(|_| "invalid updated_at".to_string())?,
    })
}

fn row_to_registration(row: &rusqlite::Row) -> std::result::Result<Registration, String> {
    let status_str: String = row.get(5).map_err(|e| e.to_string())?;
    let registered_str: String = row.get(6).map_err(|e| e.to_string())?;

    Ok(Registration {
        id: RegistrationId(row.get(0).map_err(|e| e.to_string())?),
        workshop_id: WorkshopId(row.get(1).map_err(|e| e.to_string())?),
        user_id: row.get(2).map_err(|e| e.to_string())?,
        user_email: row.get(3).map_err(|e| e.to_string())?,
        user_name: row.get(4).map_err(|e| e.to_string())?,
        status: match status_str.as_str() {
            "confirmed" => RegistrationStatus::Confirmed,
            other => return Err(format!("unknown registration status: {other}")),
        },
        registered_at: registered_str
            .parse()
            .map_err(|_| "invalid registered_at".to_string())?,
    })
}

fn row_to_notification(row: &rusqlite::Row) -> std::result::Result<Notification, String> {
    let created_str: String = row.get(5).map_err(|e| e.to_string())?;
    let workshop_id: Option<i64> = row.get(4).map_err(|e| e.to_string())?;

    Ok(Notification {
        id: row.get(0).map_err(|e| e.to_string())?,
        user_id: row.get(1).map_err(|e| e.to_string())?,
        kind: row.get(2).map_err(|e| e.to_string())?,
        message: row.get(3).map_err(|e| e.to_string())?,
        workshop_id: workshop_id.map(WorkshopId),
        created_at: created_str
            .parse()
            .map_err(|_| "invalid created_at".to_string())?,
        read: row.get::<_, i64>(6).map_err(|e| e.to_string())? != 0,
    })
}
