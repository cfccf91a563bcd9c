//! services/client/src/bin/personnel.rs
//!
//! Usage:
//!   personnel [ROUTE]                       load the view behind ROUTE (default: landing page)
//!   personnel mark check-in|check-out LAT LONG
//!   personnel logout

use std::sync::Arc;

use client_lib::{
    app::{render, AppState, Location, MarkKind, ViewKind},
    config::Config,
    error::ClientError,
};
use personnel_core::{guard::LOGIN_PATH, landing_route, Navigation};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(api = %config.api_base_url, "Configuration loaded.");

    // --- 2. Wire Adapters & Resolve the Session ---
    let state = AppState::from_config(config.clone())?;
    state.session.restore().await;
    if state.session.identity().is_none() {
        if let Some(credentials) = &config.login {
            if let Err(e) = state.session.login(credentials).await {
                warn!("Configured login failed: {}", e);
            }
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("logout") => {
            state.session.logout();
            println!("Signed out.");
            Ok(())
        }
        Some("mark") => mark(&state, &args[1..]).await,
        route => show(&state, route).await,
    }
}

async fn show(state: &AppState, route: Option<&str>) -> Result<(), ClientError> {
    let mut path = match route {
        Some(path) => path.to_string(),
        None => state
            .session
            .identity()
            .map(|user| landing_route(&user))
            .unwrap_or_else(|| LOGIN_PATH.to_string()),
    };

    // Follow redirects until the guard settles on a view.
    for _ in 0..4 {
        match state.navigate(&path) {
            Navigation::Render(route) => {
                for line in render(state, &ViewKind::resolve(&route)).await? {
                    println!("{}", line);
                }
                return Ok(());
            }
            Navigation::Redirect(next) => {
                info!(from = %path, to = %next, "Redirected.");
                path = next;
            }
            Navigation::Loading => {
                return Err(ClientError::Internal("session is still resolving".to_string()))
            }
        }
    }
    Err(ClientError::Internal(format!("redirect loop at {}", path)))
}

async fn mark(state: &AppState, args: &[String]) -> Result<(), ClientError> {
    let usage = || ClientError::Internal("usage: mark check-in|check-out LAT LONG".to_string());
    let kind = match args.first().map(String::as_str) {
        Some("check-in") => MarkKind::CheckIn,
        Some("check-out") => MarkKind::CheckOut,
        _ => return Err(usage()),
    };
    let coordinate = |i: usize| args.get(i).and_then(|raw| raw.parse::<f64>().ok());
    let (Some(lat), Some(long)) = (coordinate(1), coordinate(2)) else {
        return Err(usage());
    };

    let attendance = state.attendance();
    attendance.set_location(Location { lat, long }).await;
    let status = attendance.mark(kind).await?;
    println!("{}", status);
    Ok(())
}
