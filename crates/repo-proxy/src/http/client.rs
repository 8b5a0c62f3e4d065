use reqwest::{Client, Proxy, Response};
use tracing::{debug, info};

use crate::config::{HttpClientConfig, HttpProxyConfig, ProxyType};
use crate::error::{ProxyError, ProxyResult};

/// Create a reqwest Client for talking to an upstream repository
pub fn create_client(config: &HttpClientConfig) -> ProxyResult<Client> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(16)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        // Explicit proxy configuration takes precedence
        client_builder = client_builder.proxy(upstream_proxy(proxy_config)?);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for upstream");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("Using system proxy settings for upstream");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for upstream");
    }

    client_builder.build().map_err(ProxyError::from)
}

/// Translate the configured outbound proxy into a reqwest proxy.
fn upstream_proxy(config: &HttpProxyConfig) -> ProxyResult<Proxy> {
    let url = config.url.as_str();
    let proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(url),
        ProxyType::Https => Proxy::https(url),
        ProxyType::Socks5 if url.starts_with("socks5://") => Proxy::all(url),
        ProxyType::Socks5 => Proxy::all(format!("socks5://{url}")),
        ProxyType::All => Proxy::all(url),
    }
    .map_err(|e| ProxyError::InvalidUrl(format!("{:?} proxy '{url}': {e}", config.proxy_type)))?;

    Ok(match &config.auth {
        Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
        None => proxy,
    })
}

/// Validators and type recorded from an upstream response
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

/// Extract cache-related headers from an HTTP response
pub fn extract_cache_headers(response: &Response) -> CacheHeaders {
    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    CacheHeaders {
        etag: header(reqwest::header::ETAG),
        last_modified: header(reqwest::header::LAST_MODIFIED),
        content_type: header(reqwest::header::CONTENT_TYPE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyAuth;

    fn outbound(url: &str, proxy_type: ProxyType) -> HttpProxyConfig {
        HttpProxyConfig {
            url: url.to_string(),
            proxy_type,
            auth: None,
        }
    }

    #[test]
    fn invalid_proxy_is_reported_as_invalid_url() {
        let config = HttpClientConfig {
            proxy: Some(outbound("::not a proxy::", ProxyType::Https)),
            ..HttpClientConfig::default()
        };

        match create_client(&config) {
            Err(ProxyError::InvalidUrl(msg)) => assert!(msg.starts_with("Https proxy '::not a proxy::'")),
            other => panic!("expected invalid url, got {other:?}"),
        }
    }

    #[test]
    fn socks5_scheme_is_added_to_bare_address() {
        assert!(upstream_proxy(&outbound("127.0.0.1:1080", ProxyType::Socks5)).is_ok());
        assert!(upstream_proxy(&outbound("socks5://127.0.0.1:1080", ProxyType::Socks5)).is_ok());
    }

    #[test]
    fn authenticated_proxy_builds_client() {
        let config = HttpClientConfig {
            proxy: Some(HttpProxyConfig {
                auth: Some(ProxyAuth {
                    username: "deploy".to_string(),
                    password: "secret".to_string(),
                }),
                ..outbound("http://proxy.internal:3128", ProxyType::All)
            }),
            ..HttpClientConfig::default()
        };

        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn default_config_builds() {
        assert!(create_client(&HttpClientConfig::default()).is_ok());
    }
}
