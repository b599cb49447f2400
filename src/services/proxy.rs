//! Process-wide HTTP proxy used by every `LastfmClient` built afterwards.

use std::sync::RwLock;

static PROXY: RwLock<Option<String>> = RwLock::new(None);

/// Sets (or clears with `None`) the proxy URL, e.g. `http://proxy.local:3128`.
pub fn set_proxy(url: Option<String>) {
    let url = url.filter(|u| !u.trim().is_empty());
    match &url {
        Some(u) => tracing::info!("Using HTTP proxy {}", u),
        None => tracing::debug!("HTTP proxy cleared"),
    }
    *PROXY.write().unwrap_or_else(|e| e.into_inner()) = url;
}

pub fn proxy() -> Option<String> {
    PROXY.read().unwrap_or_else(|e| e.into_inner()).clone()
}
