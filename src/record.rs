use serde::{Deserialize, Serialize};

/// Current on-disk shape of the singleton repository record. Bumped whenever
/// `RepositoryRecord`'s fields change in a way `upgrade_repository` needs to
/// migrate.
pub const VERSION: u32 = 1;

/// The `$Repository` singleton record: the one piece of state the repository
/// core keeps about itself, independent of any registered collection (§4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub version: u32,
    pub id: String,
}
