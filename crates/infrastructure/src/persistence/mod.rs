//! Durable ledger stores.

pub mod postgres;
