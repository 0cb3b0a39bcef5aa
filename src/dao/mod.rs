/// Persisted snapshot model definitions.
pub mod models;
/// Snapshot load/save abstraction and the JSON file backend.
pub mod snapshot_store;
/// Storage abstraction layer shared by persistence backends.
pub mod storage;
