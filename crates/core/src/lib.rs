//! videotreff-core – Gemeinsame Identifikationstypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Videotreff-Crates gemeinsam genutzt werden. Fehlertypen leben
//! bewusst in den jeweiligen Crates (DbError, SignalingError), damit die
//! Typen hier abhaengigkeitsarm bleiben.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{RaumCode, TeilnehmerCode, VerbindungsId};
