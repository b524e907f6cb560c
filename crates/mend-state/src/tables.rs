//! redb table definitions for the mend report log.

use redb::TableDefinition;

/// Fix reports keyed by append sequence number. Values are JSON `FixReport`s.
pub const REPORTS: TableDefinition<u64, &[u8]> = TableDefinition::new("reports");
