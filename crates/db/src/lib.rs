//! videotreff-db – Persistenz-Gateway
//!
//! Dieses Crate stellt das Repository-Pattern bereit, das SQLite hinter
//! einer einheitlichen Schnittstelle abstrahiert. Der Signaling-Kern
//! behandelt alle Aufrufe als best-effort: die In-Memory-Registry bleibt
//! fuer laufende Sessions autoritativ, der Store ist ein Verlaufs-Cache.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::{DbError, DbResult};
pub use models::{ChatNachrichtRecord, MitgliedRecord, NeueChatNachricht, RaumSnapshot};
pub use repository::{ChatVerlaufRepository, RaumRepository};
pub use sqlite::{DatabaseConfig, SqliteDb};
