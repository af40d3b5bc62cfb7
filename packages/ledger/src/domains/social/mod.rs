//! Social domain - the trust graph between members

pub mod actions;
