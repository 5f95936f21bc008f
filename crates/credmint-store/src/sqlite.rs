//! SQLite-backed store.
//!
//! Compare-and-set writes are single `UPDATE ... WHERE col IS ?expected`
//! statements, so two writers racing on the same slot cannot both succeed.
//! Audit uniqueness is enforced by `UNIQUE` constraints and `INSERT OR IGNORE`.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use credmint_core::limits::PLACEHOLDER_URI;
use credmint_core::model::{
    Address, AddressField, AddressSlot, CredentialRecord, CredentialStatus, InstitutionProfile,
    InstitutionStatus, MintAuditEntry, RevocationEntry,
};

use crate::store::{CasOutcome, LocalStore, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS institutions (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    website         TEXT,
    logo_uri        TEXT,
    authority       TEXT NOT NULL,
    super_authority TEXT,
    status          TEXT NOT NULL,
    registration    TEXT,
    tree            TEXT,
    collection      TEXT,
    lookup_table    TEXT
);

CREATE TABLE IF NOT EXISTS credentials (
    id                TEXT PRIMARY KEY,
    institution_id    TEXT NOT NULL,
    credential_number TEXT NOT NULL,
    title             TEXT NOT NULL,
    student_name      TEXT NOT NULL,
    recipient         TEXT NOT NULL,
    degree_type       TEXT,
    program           TEXT,
    issued_on         TEXT,
    image_uri         TEXT,
    content_uri       TEXT,
    status            TEXT NOT NULL,
    asset_id          TEXT,
    leaf_index        INTEGER,
    mint_signature    TEXT,
    UNIQUE (institution_id, credential_number)
);

CREATE TABLE IF NOT EXISTS mint_audit (
    credential_number TEXT NOT NULL,
    institution_id    TEXT NOT NULL,
    credential_id     TEXT NOT NULL,
    signature         TEXT NOT NULL,
    recipient         TEXT NOT NULL,
    tree              TEXT NOT NULL,
    recorded_at       TEXT NOT NULL,
    UNIQUE (credential_number, institution_id)
);

CREATE TABLE IF NOT EXISTS revocations (
    credential_number TEXT NOT NULL,
    institution_id    TEXT NOT NULL,
    credential_id     TEXT NOT NULL,
    asset_id          TEXT NOT NULL,
    reason            TEXT NOT NULL,
    signature         TEXT NOT NULL,
    revoked_at        TEXT NOT NULL,
    UNIQUE (credential_number, institution_id)
);
"#;

const INSTITUTION_COLUMNS: &str = "id, name, website, logo_uri, authority, super_authority, status, \
     registration, tree, collection, lookup_table";

const CREDENTIAL_COLUMNS: &str = "id, institution_id, credential_number, title, student_name, \
     recipient, degree_type, program, issued_on, image_uri, content_uri, status, asset_id, \
     leaf_index, mint_signature";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SqliteStore")
    }
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_address(column: &str, value: &str) -> StoreResult<Address> {
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{column}={value}: {e}")))
}

fn parse_opt_address(column: &str, value: Option<String>) -> StoreResult<Option<Address>> {
    value.map(|v| parse_address(column, &v)).transpose()
}

fn parse_time(column: &str, value: &str) -> StoreResult<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|e| StoreError::Corrupt(format!("{column}={value}: {e}")))
}

fn format_time(t: &OffsetDateTime) -> StoreResult<String> {
    t.format(&Rfc3339)
        .map_err(|e| StoreError::Corrupt(format!("timestamp: {e}")))
}

struct InstitutionRow {
    id: String,
    name: String,
    website: Option<String>,
    logo_uri: Option<String>,
    authority: String,
    super_authority: Option<String>,
    status: String,
    slots: [Option<String>; 4],
}

impl InstitutionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            website: row.get(2)?,
            logo_uri: row.get(3)?,
            authority: row.get(4)?,
            super_authority: row.get(5)?,
            status: row.get(6)?,
            slots: [row.get(7)?, row.get(8)?, row.get(9)?, row.get(10)?],
        })
    }

    fn into_profile(self) -> StoreResult<InstitutionProfile> {
        let [registration, tree, collection, lookup_table] = self.slots;
        Ok(InstitutionProfile {
            authority: parse_address("authority", &self.authority)?,
            super_authority: parse_opt_address("super_authority", self.super_authority)?,
            status: InstitutionStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Corrupt(format!("status={}", self.status)))?,
            registration: AddressSlot::from(parse_opt_address("registration", registration)?),
            tree: AddressSlot::from(parse_opt_address("tree", tree)?),
            collection: AddressSlot::from(parse_opt_address("collection", collection)?),
            lookup_table: AddressSlot::from(parse_opt_address("lookup_table", lookup_table)?),
            id: self.id,
            name: self.name,
            website: self.website,
            logo_uri: self.logo_uri,
        })
    }
}

struct CredentialRow {
    id: String,
    institution_id: String,
    credential_number: String,
    title: String,
    student_name: String,
    recipient: String,
    degree_type: Option<String>,
    program: Option<String>,
    issued_on: Option<String>,
    image_uri: Option<String>,
    content_uri: Option<String>,
    status: String,
    asset_id: Option<String>,
    leaf_index: Option<u32>,
    mint_signature: Option<String>,
}

impl CredentialRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            institution_id: row.get(1)?,
            credential_number: row.get(2)?,
            title: row.get(3)?,
            student_name: row.get(4)?,
            recipient: row.get(5)?,
            degree_type: row.get(6)?,
            program: row.get(7)?,
            issued_on: row.get(8)?,
            image_uri: row.get(9)?,
            content_uri: row.get(10)?,
            status: row.get(11)?,
            asset_id: row.get(12)?,
            leaf_index: row.get(13)?,
            mint_signature: row.get(14)?,
        })
    }

    fn into_record(self) -> StoreResult<CredentialRecord> {
        Ok(CredentialRecord {
            recipient: parse_address("recipient", &self.recipient)?,
            status: CredentialStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Corrupt(format!("status={}", self.status)))?,
            asset_id: parse_opt_address("asset_id", self.asset_id)?,
            id: self.id,
            institution_id: self.institution_id,
            credential_number: self.credential_number,
            title: self.title,
            student_name: self.student_name,
            degree_type: self.degree_type,
            program: self.program,
            issued_on: self.issued_on,
            image_uri: self.image_uri,
            content_uri: self.content_uri,
            leaf_index: self.leaf_index,
            mint_signature: self.mint_signature,
        })
    }
}

impl SqliteStore {
    fn read_slot(
        conn: &Connection,
        institution_id: &str,
        field: AddressField,
    ) -> StoreResult<Option<Option<String>>> {
        let sql = format!("SELECT {} FROM institutions WHERE id = ?1", field.as_str());
        Ok(conn
            .query_row(&sql, params![institution_id], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?)
    }
}

impl LocalStore for SqliteStore {
    fn get_institution(&self, id: &str) -> StoreResult<Option<InstitutionProfile>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {INSTITUTION_COLUMNS} FROM institutions WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id], InstitutionRow::read)
            .optional()?;
        row.map(InstitutionRow::into_profile).transpose()
    }

    fn put_institution(&self, p: &InstitutionProfile) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO institutions (id, name, website, logo_uri, authority, super_authority, \
                 status, registration, tree, collection, lookup_table) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, website = excluded.website, \
                 logo_uri = excluded.logo_uri, authority = excluded.authority, \
                 super_authority = excluded.super_authority",
            params![
                p.id,
                p.name,
                p.website,
                p.logo_uri,
                p.authority.to_string(),
                p.super_authority.map(|a| a.to_string()),
                p.status.as_str(),
                p.registration.address().map(|a| a.to_string()),
                p.tree.address().map(|a| a.to_string()),
                p.collection.address().map(|a| a.to_string()),
                p.lookup_table.address().map(|a| a.to_string()),
            ],
        )?;
        Ok(())
    }

    fn list_institutions(&self) -> StoreResult<Vec<InstitutionProfile>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {INSTITUTION_COLUMNS} FROM institutions ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], InstitutionRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(InstitutionRow::into_profile).collect()
    }

    fn compare_and_set_address(
        &self,
        institution_id: &str,
        field: AddressField,
        expected: Option<Address>,
        new: Address,
    ) -> StoreResult<CasOutcome> {
        let conn = self.conn.lock();
        let column = field.as_str();
        let sql = format!("UPDATE institutions SET {column} = ?1 \
             WHERE id = ?2 AND {column} IS ?3 AND {column} IS NOT ?1");
        let changed = conn.execute(
            &sql,
            params![
                new.to_string(),
                institution_id,
                expected.map(|a| a.to_string())
            ],
        )?;
        if changed == 1 {
            return Ok(CasOutcome::Applied);
        }

        let current = Self::read_slot(&conn, institution_id, field)?
            .ok_or_else(|| StoreError::NotFound(format!("institution {institution_id}")))?;
        debug!(institution_id, column, ?current, "address compare-and-set not applied");
        if current.as_deref() == Some(new.to_string().as_str()) {
            Ok(CasOutcome::AlreadyApplied)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }

    fn compare_and_set_status(
        &self,
        institution_id: &str,
        expected: InstitutionStatus,
        new: InstitutionStatus,
    ) -> StoreResult<CasOutcome> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE institutions SET status = ?1 WHERE id = ?2 AND status = ?3 AND status <> ?1",
            params![new.as_str(), institution_id, expected.as_str()],
        )?;
        if changed == 1 {
            return Ok(CasOutcome::Applied);
        }
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM institutions WHERE id = ?1",
                params![institution_id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            None => Err(StoreError::NotFound(format!("institution {institution_id}"))),
            Some(s) if s == new.as_str() => Ok(CasOutcome::AlreadyApplied),
            Some(_) => Ok(CasOutcome::Conflict),
        }
    }

    fn get_credential(&self, id: &str) -> StoreResult<Option<CredentialRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id], CredentialRow::read)
            .optional()?;
        row.map(CredentialRow::into_record).transpose()
    }

    fn put_credential(&self, r: &CredentialRecord) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO credentials (id, institution_id, credential_number, title, \
                 student_name, recipient, degree_type, program, issued_on, image_uri, content_uri, \
                 status, asset_id, leaf_index, mint_signature) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                r.id,
                r.institution_id,
                r.credential_number,
                r.title,
                r.student_name,
                r.recipient.to_string(),
                r.degree_type,
                r.program,
                r.issued_on,
                r.image_uri,
                r.content_uri,
                r.status.as_str(),
                r.asset_id.map(|a| a.to_string()),
                r.leaf_index,
                r.mint_signature,
            ],
        )?;
        Ok(())
    }

    fn list_credentials(&self, institution_id: &str) -> StoreResult<Vec<CredentialRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE institution_id = ?1 ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![institution_id], CredentialRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(CredentialRow::into_record).collect()
    }

    fn set_content_if_placeholder(&self, credential_id: &str, uri: &str) -> StoreResult<String> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE credentials SET content_uri = ?1 WHERE id = ?2 \
             AND (content_uri IS NULL OR trim(content_uri) = '' OR content_uri = ?3)",
            params![uri, credential_id, PLACEHOLDER_URI],
        )?;
        let current: Option<Option<String>> = conn
            .query_row(
                "SELECT content_uri FROM credentials WHERE id = ?1",
                params![credential_id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            None => Err(StoreError::NotFound(format!("credential {credential_id}"))),
            Some(v) => Ok(v.unwrap_or_default()),
        }
    }

    fn mark_minted(&self, credential_id: &str, signature: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE credentials SET status = 'minted', mint_signature = ?2 \
             WHERE id = ?1 AND status IN ('pending', 'failed')",
            params![credential_id, signature],
        )?;
        if changed == 0 {
            ensure_credential(&conn, credential_id)?;
        }
        Ok(changed == 1)
    }

    fn mark_failed(&self, credential_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE credentials SET status = 'failed' WHERE id = ?1 AND status = 'pending'",
            params![credential_id],
        )?;
        if changed == 0 {
            ensure_credential(&conn, credential_id)?;
        }
        Ok(changed == 1)
    }

    fn mark_revoked(&self, credential_id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE credentials SET status = 'revoked' WHERE id = ?1 AND status = 'minted'",
            params![credential_id],
        )?;
        if changed == 0 {
            ensure_credential(&conn, credential_id)?;
        }
        Ok(changed == 1)
    }

    fn set_credential_asset(
        &self,
        credential_id: &str,
        asset_id: Address,
        leaf_index: u32,
    ) -> StoreResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE credentials SET asset_id = ?1, leaf_index = ?2 WHERE id = ?3",
            params![asset_id.to_string(), leaf_index, credential_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("credential {credential_id}")));
        }
        Ok(())
    }

    fn append_mint_audit(&self, e: &MintAuditEntry) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO mint_audit (credential_number, institution_id, credential_id, \
                 signature, recipient, tree, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                e.credential_number,
                e.institution_id,
                e.credential_id,
                e.signature,
                e.recipient.to_string(),
                e.tree.to_string(),
                format_time(&e.recorded_at)?,
            ],
        )?;
        Ok(changed == 1)
    }

    fn append_revocation(&self, e: &RevocationEntry) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO revocations (credential_number, institution_id, credential_id, \
                 asset_id, reason, signature, revoked_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                e.credential_number,
                e.institution_id,
                e.credential_id,
                e.asset_id.to_string(),
                e.reason,
                e.signature,
                format_time(&e.revoked_at)?,
            ],
        )?;
        Ok(changed == 1)
    }

    fn mint_audit(&self, institution_id: &str) -> StoreResult<Vec<MintAuditEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT credential_number, institution_id, credential_id, signature, recipient, tree, \
                 recorded_at \
             FROM mint_audit WHERE institution_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![institution_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(number, inst, cred, sig, recipient, tree, at)| {
                Ok(MintAuditEntry {
                    credential_number: number,
                    institution_id: inst,
                    credential_id: cred,
                    signature: sig,
                    recipient: parse_address("recipient", &recipient)?,
                    tree: parse_address("tree", &tree)?,
                    recorded_at: parse_time("recorded_at", &at)?,
                })
            })
            .collect()
    }

    fn revocations(&self, institution_id: &str) -> StoreResult<Vec<RevocationEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT credential_number, institution_id, credential_id, asset_id, reason, signature, \
                 revoked_at \
             FROM revocations WHERE institution_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![institution_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(number, inst, cred, asset, reason, sig, at)| {
                Ok(RevocationEntry {
                    credential_number: number,
                    institution_id: inst,
                    credential_id: cred,
                    asset_id: parse_address("asset_id", &asset)?,
                    reason,
                    signature: sig,
                    revoked_at: parse_time("revoked_at", &at)?,
                })
            })
            .collect()
    }
}

fn ensure_credential(conn: &Connection, credential_id: &str) -> StoreResult<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM credentials WHERE id = ?1",
            params![credential_id],
            |row| row.get(0),
        )
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound(format!("credential {credential_id}"))),
    }
}
