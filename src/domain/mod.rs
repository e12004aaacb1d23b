pub mod audit;
pub mod query;
pub mod transaction;

pub use audit::{AuditAction, AuditEntry, SYSTEM_ACTOR};
pub use query::{Page, PageRequest, TransactionFilter, DEFAULT_PAGE_SIZE};
pub use transaction::{
    normalize_amount, NewTransaction, Transaction, TransactionStatus, TransitionRequest,
};
