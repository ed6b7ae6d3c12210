//! Proxy configuration for the shared HTTP client.

/// Proxy transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// Plain HTTP CONNECT proxy.
    Http,
    /// SOCKS5 proxy.
    Socks5,
}

/// Operator-configured proxy, mirroring the `proxy` config section.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Transport kind.
    pub kind: ProxyKind,
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Optional basic-auth username.
    pub username: Option<String>,
    /// Optional basic-auth password.
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Render the `scheme://[user:pass@]host:port` URL `reqwest::Proxy` expects.
    #[must_use]
    pub fn to_url(&self) -> String {
        let scheme = match self.kind {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
        };
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("{scheme}://{user}:{pass}@{}:{}", self.host, self.port)
            }
            _ => format!("{scheme}://{}:{}", self.host, self.port),
        }
    }
}
