pub mod ledger;
pub mod seed;

pub use ledger::{LedgerSettings, LedgerStore};
pub use seed::{default_seeds, load_seed_file, SeedLoader, SeedRecord, SeedReport};
