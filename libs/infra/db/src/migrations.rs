// [libs/infra/db/src/migrations.rs]
/*!
 * =================================================================
 * APARATO: VERSIONED MIGRATION LEDGER (ESTRATO L3)
 * RESPONSABILIDAD: EVOLUCION CONTROLADA Y REVERSIBLE DEL ESQUEMA
 *
 * A diferencia del bootstrap idempotente de schema.rs (que solo sabe
 * construir el estado mas reciente), este ledger registra cada paso
 * de evolucion como un par forward/inverse con checksum, de modo que
 * el historial de esquema pueda auditarse y revertirse version por
 * version.
 * =================================================================
 */

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use libsql::Connection;
use tracing::{info, instrument, warn};

use crate::errors::DbError;

/// Un paso de evolucion del esquema con su reverso declarado.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

impl Migration {
    fn checksum(&self) -> i64 {
        let mut hasher = DefaultHasher::new();
        self.up_sql.hash(&mut hasher);
        self.down_sql.hash(&mut hasher);
        // acotado a i64 positivo para almacenamiento en columna INTEGER.
        (hasher.finish() & 0x7fff_ffff_ffff_ffff) as i64
    }
}

/// El ledger de migraciones del plano de control, en orden de aplicacion.
///
/// Cada entrada nueva se agrega al final; ninguna entrada existente se
/// edita una vez publicada, pues su checksum quedaria invalidado contra
/// despliegues ya migrados.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "add_incidents_severity_index",
        up_sql: "CREATE INDEX IF NOT EXISTS idx_incidents_severity ON incidents(severity);",
        down_sql: "DROP INDEX IF EXISTS idx_incidents_severity;",
    },
    Migration {
        version: 2,
        name: "add_providers_organization_index",
        up_sql: "CREATE INDEX IF NOT EXISTS idx_providers_organization ON providers(organization);",
        down_sql: "DROP INDEX IF EXISTS idx_providers_organization;",
    },
];

const LEDGER_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        checksum INTEGER NOT NULL,
        applied_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Aplica toda migracion pendiente del ledger, en orden de version,
/// verificando que las ya aplicadas no hayan sido alteradas en disco.
#[instrument(skip(db))]
pub async fn apply_pending(db: &Connection) -> Result<(), DbError> {
    db.execute(LEDGER_TABLE_SQL, ())
        .await
        .map_err(DbError::QueryError)?;

    for migration in MIGRATIONS {
        let mut rows = db
            .query(
                "SELECT checksum FROM schema_migrations WHERE version = ?1",
                libsql::params![migration.version],
            )
            .await
            .map_err(DbError::QueryError)?;

        if let Some(row) = rows.next().await.map_err(DbError::QueryError)? {
            let recorded_checksum: i64 = row.get(0).map_err(DbError::QueryError)?;
            if recorded_checksum != migration.checksum() {
                return Err(DbError::MigrationChecksumMismatch {
                    version: migration.version,
                });
            }
            continue;
        }

        info!(version = migration.version, name = migration.name, "applying migration");
        db.execute(migration.up_sql, ())
            .await
            .map_err(DbError::QueryError)?;
        db.execute(
            "INSERT INTO schema_migrations (version, name, checksum) VALUES (?1, ?2, ?3)",
            libsql::params![migration.version, migration.name, migration.checksum()],
        )
        .await
        .map_err(DbError::QueryError)?;
    }

    Ok(())
}

/// Revierte el ledger hasta (exclusivo de) `target_version`, aplicando
/// los `down_sql` en orden inverso de version.
#[instrument(skip(db))]
pub async fn rollback_to(db: &Connection, target_version: i64) -> Result<(), DbError> {
    for migration in MIGRATIONS.iter().rev() {
        if migration.version <= target_version {
            break;
        }
        warn!(version = migration.version, name = migration.name, "rolling back migration");
        db.execute(migration.down_sql, ())
            .await
            .map_err(DbError::QueryError)?;
        db.execute(
            "DELETE FROM schema_migrations WHERE version = ?1",
            libsql::params![migration.version],
        )
        .await
        .map_err(DbError::QueryError)?;
    }
    Ok(())
}
