//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Rebase history (append-only)
-- ============================================================

CREATE TABLE IF NOT EXISTS rebase_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    price TEXT NOT NULL,
    supply_delta TEXT NOT NULL,
    new_supply TEXT NOT NULL,
    band INTEGER NOT NULL,
    deviation TEXT NOT NULL,
    circuit_breaker_triggered INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_rebase_history_timestamp ON rebase_history(timestamp);

-- ============================================================
-- Recorded aggregate prices (append-only)
-- ============================================================

CREATE TABLE IF NOT EXISTS price_observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at INTEGER NOT NULL,
    price TEXT NOT NULL,
    source_timestamp INTEGER NOT NULL,
    confidence INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_observations_recorded ON price_observations(recorded_at);

-- ============================================================
-- Settings and persisted controller state
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
