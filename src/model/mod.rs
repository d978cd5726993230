//! Types that represent the core data model, such as `RosterRow` and `PaymentRecord`.
mod amount;
pub mod classify;
pub mod email;
mod record;
mod roster;
mod schema;
mod troop;

pub use amount::Amount;
pub use classify::{classify, Classification, Classified};
pub use email::{EmailAddress, ResolvedEmails};
pub use record::{PaymentRecord, PaymentTerms};
pub use roster::{Roster, RosterRow};
pub use schema::{LedgerColumns, SchemaConfig};
pub use troop::{Troop, TroopTable};
