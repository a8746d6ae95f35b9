//! Adapters for the contest subsystem's driven ports.

pub mod intent_store;

pub use intent_store::InMemoryIntentStore;
