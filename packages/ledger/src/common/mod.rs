pub mod amount;
pub mod entity_ids;
pub mod errors;
pub mod id;
pub mod media;

pub use amount::{Amount, AmountParseError, LEDGER_SCALE};
pub use entity_ids::*;
pub use errors::{ErrorKind, LedgerError};
pub use media::MediaReference;
