//! Economy domain - minting and transfers

pub mod actions;
