use rusqlite::Connection;

use super::map_sqlite_err;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id           TEXT PRIMARY KEY,
            username     TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL DEFAULT '',
            email        TEXT NOT NULL DEFAULT '',
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS project_members (
            project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (project_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'backlog'
                            CHECK(status IN (
                                'backlog', 'todo', 'in_progress',
                                'in_review', 'done', 'cancelled'
                            )),
            assignee_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            creator_id  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);

        CREATE TABLE IF NOT EXISTS attachments (
            id                 TEXT PRIMARY KEY,
            task_id            TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            uploaded_by        TEXT NOT NULL REFERENCES users(id),
            file_name          TEXT NOT NULL,
            original_file_name TEXT NOT NULL,
            file_size          INTEGER NOT NULL,
            content_type       TEXT NOT NULL,
            storage_key        TEXT NOT NULL UNIQUE,
            presigned_url      TEXT NOT NULL,
            url_expires_at     TEXT NOT NULL,
            is_deleted         INTEGER NOT NULL DEFAULT 0,
            deleted_at         TEXT,
            created_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attachments_task
            ON attachments(task_id, is_deleted, created_at);
        CREATE INDEX IF NOT EXISTS idx_attachments_uploader
            ON attachments(uploaded_by, is_deleted, created_at);
        CREATE INDEX IF NOT EXISTS idx_attachments_expiry
            ON attachments(is_deleted, url_expires_at);

        CREATE TRIGGER IF NOT EXISTS attachments_storage_key_immutable
            BEFORE UPDATE OF storage_key ON attachments
            WHEN NEW.storage_key <> OLD.storage_key
        BEGIN
            SELECT RAISE(ABORT, 'storage_key is immutable');
        END;

        CREATE TABLE IF NOT EXISTS activity_log (
            id          TEXT PRIMARY KEY,
            task_id     TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL,
            action      TEXT NOT NULL
                            CHECK(action IN ('file_uploaded', 'file_downloaded', 'file_deleted')),
            details     TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_activity_task ON activity_log(task_id, created_at);

        CREATE TABLE IF NOT EXISTS api_keys (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name         TEXT NOT NULL DEFAULT '',
            key_hash     TEXT NOT NULL UNIQUE,
            created_at   TEXT NOT NULL,
            last_used_at TEXT
        );
        ",
    )
    .map_err(map_sqlite_err)
}
