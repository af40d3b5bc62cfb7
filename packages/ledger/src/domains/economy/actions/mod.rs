//! Economy domain actions - balance-changing ledger commands

mod give;
mod mint;

pub use give::Give;
pub use mint::Mint;
