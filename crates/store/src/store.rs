//! SQLite-backed store.
//!
//! One connection behind a mutex; every operation is a single short
//! statement or transaction. Writes that race on a primary key resolve
//! idempotently.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use pennyworth_chain::{genesis_entry, ChainEntry};
use pennyworth_core::Money;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::models::{AddressRecord, Bank, PlaidRecord, User};
use crate::Result;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        active INTEGER NOT NULL DEFAULT 1,
        latest_roundup_date TEXT,
        aggregator_tokens TEXT NOT NULL DEFAULT '{}',
        aggregator_accounts TEXT NOT NULL DEFAULT '{}',
        pledges TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS banks (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS addresses (
        address TEXT PRIMARY KEY,
        public_key TEXT NOT NULL,
        latest_transaction TEXT
    );

    CREATE TABLE IF NOT EXISTS chain_entries (
        hash TEXT PRIMARY KEY,
        address TEXT NOT NULL,
        count INTEGER NOT NULL,
        entry TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_chain_entries_address
        ON chain_entries(address, count);

    CREATE TABLE IF NOT EXISTS plaid_transactions (
        transaction_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        amount_cents INTEGER NOT NULL,
        roundup_cents INTEGER NOT NULL,
        date TEXT,
        name TEXT NOT NULL DEFAULT '',
        summed INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS runs (
        process TEXT PRIMARY KEY,
        last TEXT NOT NULL
    );
";

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // A poisoned lock only means another thread panicked mid-read;
    // SQLite state is still consistent, so keep going.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- users ---------------------------------------------------------

    pub fn upsert_user(&self, user: &User) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO users
                 (id, active, latest_roundup_date, aggregator_tokens,
                  aggregator_accounts, pledges)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 active = excluded.active,
                 latest_roundup_date = excluded.latest_roundup_date,
                 aggregator_tokens = excluded.aggregator_tokens,
                 aggregator_accounts = excluded.aggregator_accounts,
                 pledges = excluded.pledges",
            params![
                user.id,
                user.active as i64,
                user.latest_roundup_date.map(|d| d.to_string()),
                serde_json::to_string(&user.aggregator_tokens)?,
                serde_json::to_string(&user.aggregator_accounts)?,
                serde_json::to_string(&user.pledges)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, active, latest_roundup_date, aggregator_tokens,
                        aggregator_accounts, pledges
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user_parts,
            )
            .optional()?;
        row.map(parts_to_user).transpose()
    }

    /// Users the scheduler considers: active, with an active pledge
    /// that has at least one monthly address, and with aggregator
    /// credentials on file. Per-bank token checks happen at dispatch.
    pub fn eligible_users(&self) -> Result<Vec<User>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, active, latest_roundup_date, aggregator_tokens,
                    aggregator_accounts, pledges
             FROM users WHERE active = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_user_parts)?;

        let mut users = Vec::new();
        for parts in rows {
            let user = parts_to_user(parts?)?;
            let has_pledge = user
                .active_pledge()
                .is_some_and(|p| !p.addresses.is_empty());
            if has_pledge && !user.aggregator_tokens.is_empty() {
                users.push(user);
            }
        }
        Ok(users)
    }

    pub fn set_latest_roundup_date(&self, user_id: &str, date: NaiveDate) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE users SET latest_roundup_date = ?2 WHERE id = ?1",
            params![user_id, date.to_string()],
        )?;
        Ok(())
    }

    // -- banks ---------------------------------------------------------

    pub fn upsert_bank(&self, bank: &Bank) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO banks (id, kind) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET kind = excluded.kind",
            params![bank.id, bank.kind],
        )?;
        Ok(())
    }

    pub fn bank_kind(&self, id: &str) -> Result<Option<String>> {
        let conn = self.lock();
        Ok(conn
            .query_row("SELECT kind FROM banks WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?)
    }

    // -- addresses and chain entries -----------------------------------

    /// Create an address with its co-signer key and genesis entry, in
    /// one transaction. The tip starts at the genesis hash.
    pub fn provision_address(
        &self,
        address: &str,
        public_key_hex: &str,
        currency: &str,
        limit: Money,
    ) -> Result<ChainEntry> {
        let genesis = genesis_entry(address, currency, limit)?;
        let entry_json = serde_json::to_string(&genesis)?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO addresses (address, public_key, latest_transaction)
             VALUES (?1, ?2, ?3)",
            params![address, public_key_hex, genesis.hash.value],
        )?;
        tx.execute(
            "INSERT INTO chain_entries (hash, address, count, entry)
             VALUES (?1, ?2, ?3, ?4)",
            params![genesis.hash.value, address, genesis.payload.count, entry_json],
        )?;
        tx.commit()?;

        debug!(address, tip = %genesis.hash.value, "address provisioned");
        Ok(genesis)
    }

    pub fn get_address(&self, address: &str) -> Result<Option<AddressRecord>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT address, public_key, latest_transaction
                 FROM addresses WHERE address = ?1",
                params![address],
                |row| {
                    Ok(AddressRecord {
                        address: row.get(0)?,
                        public_key: row.get(1)?,
                        latest_transaction: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Move an address tip from `from` to `to`. Returns false when the
    /// tip moved under us; the tip never goes backwards.
    pub fn advance_tip(&self, address: &str, from: Option<&str>, to: &str) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE addresses SET latest_transaction = ?3
             WHERE address = ?1 AND latest_transaction IS ?2",
            params![address, from, to],
        )?;
        Ok(changed == 1)
    }

    /// Insert or refresh a chain entry. Re-delivered envelopes hit the
    /// same hash and just rewrite the same row.
    pub fn upsert_entry(&self, entry: &ChainEntry) -> Result<()> {
        let entry_json = serde_json::to_string(entry)?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO chain_entries (hash, address, count, entry)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(hash) DO UPDATE SET entry = excluded.entry",
            params![
                entry.hash.value,
                entry.payload.address,
                entry.payload.count,
                entry_json
            ],
        )?;
        Ok(())
    }

    pub fn get_entry(&self, hash: &str) -> Result<Option<ChainEntry>> {
        let conn = self.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT entry FROM chain_entries WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(Into::into))
            .transpose()
    }

    pub fn entries_for_address(&self, address: &str) -> Result<Vec<ChainEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT entry FROM chain_entries WHERE address = ?1 ORDER BY count",
        )?;
        let rows = stmt.query_map(params![address], |row| row.get::<_, String>(0))?;

        let mut entries = Vec::new();
        for json in rows {
            entries.push(serde_json::from_str(&json?)?);
        }
        Ok(entries)
    }

    // -- audit records and runs ----------------------------------------

    /// Write the audit copy of one aggregator transaction. Returns
    /// false when the transaction id was already recorded.
    pub fn insert_plaid_record(&self, record: &PlaidRecord) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO plaid_transactions
                 (transaction_id, user_id, amount_cents, roundup_cents,
                  date, name, summed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.transaction_id,
                record.user_id,
                record.amount.cents(),
                record.roundup.cents(),
                record.date,
                record.name,
                record.summed as i64,
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get_plaid_record(&self, transaction_id: &str) -> Result<Option<PlaidRecord>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT transaction_id, user_id, amount_cents, roundup_cents,
                        date, name, summed
                 FROM plaid_transactions WHERE transaction_id = ?1",
                params![transaction_id],
                |row| {
                    Ok(PlaidRecord {
                        transaction_id: row.get(0)?,
                        user_id: row.get(1)?,
                        amount: Money::from_cents(row.get(2)?),
                        roundup: Money::from_cents(row.get(3)?),
                        date: row.get(4)?,
                        name: row.get(5)?,
                        summed: row.get::<_, i64>(6)? != 0,
                    })
                },
            )
            .optional()?)
    }

    pub fn record_run(&self, process: &str, last: DateTime<Utc>) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO runs (process, last) VALUES (?1, ?2)
             ON CONFLICT(process) DO UPDATE SET last = excluded.last",
            params![process, last.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn last_run(&self, process: &str) -> Result<Option<String>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                "SELECT last FROM runs WHERE process = ?1",
                params![process],
                |row| row.get(0),
            )
            .optional()?)
    }
}

type UserParts = (String, i64, Option<String>, String, String, String);

fn row_to_user_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn parts_to_user(parts: UserParts) -> Result<User> {
    let (id, active, latest_roundup_date, tokens, accounts, pledges) = parts;
    Ok(User {
        id,
        active: active != 0,
        latest_roundup_date: latest_roundup_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        aggregator_tokens: serde_json::from_str::<HashMap<String, String>>(&tokens)?,
        aggregator_accounts: serde_json::from_str::<HashMap<String, String>>(&accounts)?,
        pledges: serde_json::from_str(&pledges)?,
    })
}
