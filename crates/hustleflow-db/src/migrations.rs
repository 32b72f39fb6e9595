use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS requests (
            id            TEXT PRIMARY KEY,
            amount        INTEGER NOT NULL,
            currency      TEXT NOT NULL,
            kind          TEXT NOT NULL,
            urgency       TEXT NOT NULL,
            duration_days INTEGER NOT NULL,
            matched       INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            owner_token   TEXT NOT NULL,
            owner_alias   TEXT NOT NULL,
            owner_name    TEXT NOT NULL,
            owner_room    TEXT NOT NULL,
            owner_contact TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_requests_board
            ON requests(urgency, created_at);

        CREATE TABLE IF NOT EXISTS offers (
            id              TEXT NOT NULL,
            request_id      TEXT NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
            amount          INTEGER NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            created_at      TEXT NOT NULL,
            offerer_token   TEXT NOT NULL,
            offerer_alias   TEXT NOT NULL,
            offerer_name    TEXT NOT NULL,
            offerer_room    TEXT NOT NULL,
            offerer_contact TEXT,
            PRIMARY KEY (request_id, id),
            UNIQUE (request_id, offerer_token)
        );

        CREATE INDEX IF NOT EXISTS idx_offers_request
            ON offers(request_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
