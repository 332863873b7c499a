//! videotreff-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use videotreff_db::{DatabaseConfig, SqliteDb};
use videotreff_signaling::{SignalingConfig, SignalingServer, SignalingState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen, Migrationen ausfuehren
    /// 2. Signaling-Zustand aufbauen
    /// 3. TCP-Listener starten (Control-Protokoll)
    /// 4. Auf Ctrl-C warten und alle Verbindungen sauber trennen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            "Server startet"
        );

        let db = SqliteDb::oeffnen(&DatabaseConfig {
            url: self.config.datenbank.url.clone(),
            max_verbindungen: self.config.datenbank.max_verbindungen,
            sqlite_wal: self.config.datenbank.wal,
        })
        .await
        .context("Datenbankverbindung fehlgeschlagen")?;

        let signaling_config = SignalingConfig {
            raum_kapazitaet: self.config.raum.kapazitaet,
            max_clients: self.config.server.max_clients,
            chat_verlauf_limit: self.config.raum.chat_verlauf_limit,
            keepalive_sek: self.config.netzwerk.keepalive_sek,
            verbindungs_timeout_sek: self.config.netzwerk.verbindungs_timeout_sek,
        };
        let state = SignalingState::neu(signaling_config, Arc::new(db));

        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .context("Ungueltige Bind-Adresse")?;
        let signaling_server = SignalingServer::neu(state, bind_addr);

        // Shutdown-Signal an alle Verbindungs-Tasks verteilen
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                let _ = shutdown_tx.send(true);
            }
        });

        signaling_server
            .starten(shutdown_rx)
            .await
            .context("Signaling-Server beendet mit Fehler")?;

        tracing::info!("Server beendet");
        Ok(())
    }
}
