use std::sync::Arc;

use voice_booking::config::AppConfig;
use voice_booking::dispatch;
use voice_booking::routes::{AppState, booking_routes};
use voice_booking::session::{self, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    let dispatcher = dispatch::from_config(&config)?;

    eprintln!("🎤 Voice Booking v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}:{}/api/bookings", config.bind_addr, config.port);
    eprintln!("   Dispatcher: {}", dispatcher.name());
    eprintln!("   Default language: {}", config.default_language);
    eprintln!(
        "   Session idle timeout: {} min",
        config.session_idle_timeout.as_secs() / 60
    );
    if let Some(ref link) = config.calendar_link {
        eprintln!("   Calendar: {link}");
    }

    // ── Sessions ─────────────────────────────────────────────────────────
    let store = Arc::new(
        SessionStore::new(config.session_idle_timeout).with_max_sessions(config.max_sessions),
    );
    let _expiry_handle = session::spawn_expiry_task(Arc::clone(&store), config.sweep_interval);

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = booking_routes(AppState {
        store,
        dispatcher,
        config: Arc::clone(&config),
    });

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.bind_addr, config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "Booking server started");
    axum::serve(listener, app).await?;

    Ok(())
}
