//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: schedulers rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3       | Universal        | Cannot read or write a file              |
//! | 10-19   | sync             | Config-driven sync runs                  |
//! | 20-29   | catalog          | Catalog store and reconciliation         |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use autocat_recon::CatalogError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// A file could not be read or written.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Sync (10-19)
// =============================================================================

/// Sync config failed to parse or validate.
pub const EXIT_SYNC_INVALID_CONFIG: u8 = 10;

/// At least one source failed; the others were still committed.
pub const EXIT_SYNC_SOURCE_FAILED: u8 = 11;

/// `--only` named a source the config does not have.
pub const EXIT_SYNC_UNKNOWN_SOURCE: u8 = 12;

// =============================================================================
// Catalog (20-29)
// =============================================================================

/// Database could not be opened or a statement failed.
pub const EXIT_CATALOG_STORAGE: u8 = 20;

/// A uniqueness or reference rule rejected a write; the run was rolled back.
pub const EXIT_CATALOG_CONSTRAINT: u8 = 21;

/// An external id moved brands under `relink = "reject"`.
pub const EXIT_CATALOG_LINK_CONFLICT: u8 = 22;

/// Catalog tree could not be read or parsed.
pub const EXIT_CATALOG_INPUT: u8 = 23;

/// Map a catalog error to its exit code.
pub fn catalog_exit_code(err: &CatalogError) -> u8 {
    match err {
        CatalogError::Storage(_) | CatalogError::NotFound(_) => EXIT_CATALOG_STORAGE,
        CatalogError::Constraint(_) => EXIT_CATALOG_CONSTRAINT,
        CatalogError::LinkConflict { .. } => EXIT_CATALOG_LINK_CONFLICT,
        CatalogError::Config(_) => EXIT_SYNC_INVALID_CONFIG,
        CatalogError::Provider { .. } | CatalogError::Json(_) => EXIT_CATALOG_INPUT,
        CatalogError::Io(_) => EXIT_IO,
    }
}
