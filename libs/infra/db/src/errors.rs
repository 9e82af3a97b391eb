// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACION SEMANTICA DE FALLOS DE PERSISTENCIA
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace fisico o de red con el motor libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuracion del entorno (variables vacias o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecucion devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformacion de tipos entre SQLite y el dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// La entidad solicitada no existe en la tabla consultada.
    #[error("[L3_DB_FAULT]: ENTITY_NOT_FOUND -> {entity} id={id}")]
    NotFound { entity: &'static str, id: String },

    /// Escritura optimista rechazada: la columna `version` leida ya no
    /// coincide con la version vigente en el motor.
    #[error("[L3_DB_FAULT]: OPTIMISTIC_VERSION_CONFLICT -> {entity} id={id}")]
    VersionConflict { entity: &'static str, id: String },

    /// Violacion de unicidad u otra restriccion declarada en el esquema.
    #[error("[L3_DB_FAULT]: CONSTRAINT_VIOLATION -> {0}")]
    ConstraintViolation(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE -> {0}")]
    TransactionError(String),

    /// La migracion encontrada en disco no coincide con su checksum
    /// registrado en el ledger — el historial de esquema fue alterado.
    #[error("[L3_DB_MIGRATION_FAULT]: CHECKSUM_MISMATCH -> version={version}")]
    MigrationChecksumMismatch { version: i64 },
}
