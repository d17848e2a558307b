use crate::error::AppResult;
use reqwest::Client;
use std::time::Duration;

#[cfg(not(any(feature = "tls-native", feature = "tls-rustls")))]
compile_error!("one TLS backend feature must be enabled: `tls-native` or `tls-rustls`");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsBackendSelection {
    NativeTls,
    Rustls,
}

fn parse_tls_backend_override(raw: Option<&str>) -> Option<TlsBackendSelection> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "native" | "native-tls" | "default-tls" => Some(TlsBackendSelection::NativeTls),
        "rustls" => Some(TlsBackendSelection::Rustls),
        _ => None,
    }
}

fn supports_tls_backend(selection: TlsBackendSelection) -> bool {
    match selection {
        TlsBackendSelection::NativeTls => cfg!(feature = "tls-native"),
        TlsBackendSelection::Rustls => cfg!(feature = "tls-rustls"),
    }
}

fn compiled_default_tls_backend() -> TlsBackendSelection {
    if cfg!(feature = "tls-native") {
        TlsBackendSelection::NativeTls
    } else {
        TlsBackendSelection::Rustls
    }
}

fn selected_tls_backend() -> TlsBackendSelection {
    let raw = std::env::var("TLS_BACKEND").ok();
    if let Some(requested) = parse_tls_backend_override(raw.as_deref()) {
        if supports_tls_backend(requested) {
            return requested;
        }
        tracing::warn!(
            "TLS_BACKEND requested an unavailable backend for this build; falling back to compiled default"
        );
    }
    compiled_default_tls_backend()
}

fn apply_tls_backend(builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
    match selected_tls_backend() {
        TlsBackendSelection::NativeTls => builder,
        TlsBackendSelection::Rustls => {
            #[cfg(feature = "tls-rustls")]
            {
                builder.use_rustls_tls()
            }
            #[cfg(not(feature = "tls-rustls"))]
            {
                builder
            }
        }
    }
}

pub fn tls_backend_name() -> &'static str {
    match selected_tls_backend() {
        TlsBackendSelection::NativeTls => "native-tls",
        TlsBackendSelection::Rustls => "rustls",
    }
}

/// Client shared by the authenticator and the resource calls.
pub fn build_client(timeout_secs: u64, user_agent: &str) -> AppResult<Client> {
    let client = apply_tls_backend(Client::builder())
        .connect_timeout(Duration::from_secs(20))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tls_backend_override() {
        assert_eq!(
            parse_tls_backend_override(Some("Native-TLS")),
            Some(TlsBackendSelection::NativeTls)
        );
        assert_eq!(
            parse_tls_backend_override(Some(" rustls ")),
            Some(TlsBackendSelection::Rustls)
        );
        assert_eq!(parse_tls_backend_override(Some("openssl")), None);
        assert_eq!(parse_tls_backend_override(None), None);
    }

    #[test]
    fn test_build_client_succeeds_with_defaults() {
        assert!(build_client(15, "fleetgate-test/0.1").is_ok());
    }
}
