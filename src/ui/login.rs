use std::path::PathBuf;

use crate::api::client::ApiClient;
use crate::app::Settings;
use crate::cli::LoginArgs;
use crate::error::{ClientError, Result};

/// Persist the backend address and credentials. The backend check afterwards
/// is informational; settings are kept even when it is unreachable.
pub async fn login(args: LoginArgs, mut settings: Settings, path: Option<PathBuf>) -> Result<()> {
    let url = crate::utils::normalize_url(&args.api_url);
    let client = ApiClient::new(&url, None)?;

    let token = match (args.token, args.email, args.password) {
        (Some(token), _, _) => Some(token),
        (None, Some(email), Some(password)) => {
            let token = client.obtain_token(&email, &password).await?;
            log::info!("obtained token for {}", email);
            Some(token)
        }
        _ => settings.token.take(),
    };

    settings.api_base_url = url;
    settings.socket_url = args.socket_url.filter(|s| !s.trim().is_empty());
    settings.token = token;
    if args.user_id.is_some() {
        settings.user_id = args.user_id;
    }
    settings.cache_enabled = !args.no_cache;
    // Derive early so a bad socket URL is reported here, not on the first chat.
    let socket = settings.socket_url()?;

    let path = path.ok_or_else(|| ClientError::Config("No config dir".into()))?;
    settings.save_to(&path)?;
    println!("Saved settings to {}", path.display());

    let checked = ApiClient::from_settings(&settings)?;
    println!("{}", describe_health(checked.ping().await));
    println!("Real-time gateway: {}", socket);
    Ok(())
}

pub async fn status(settings: &Settings) -> Result<()> {
    println!("API:       {}", settings.api_base_url);
    println!("Socket:    {}", settings.socket_url()?);
    println!("Token:     {}", if settings.token.is_some() { "set" } else { "not set" });
    println!("User id:   {}", settings.user_id.as_deref().unwrap_or("unknown"));
    println!("Cache:     {}", if settings.cache_enabled { "on" } else { "off" });

    let client = ApiClient::from_settings(settings)?;
    println!("{}", describe_health(client.ping().await));
    Ok(())
}

fn describe_health(result: Result<u16>) -> String {
    match result {
        Ok(status) if (200..300).contains(&status) => "Backend: connected".to_string(),
        Ok(status) => format!("Backend: reachable, health check returned HTTP {status}"),
        Err(e) => {
            log::warn!("health check failed: {}", e);
            format!("Backend: unreachable ({e})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_lines() {
        assert_eq!(describe_health(Ok(200)), "Backend: connected");
        assert!(describe_health(Ok(503)).contains("HTTP 503"));
        let err = describe_health(Err(ClientError::SocketClosed));
        assert!(err.starts_with("Backend: unreachable"));
    }
}
