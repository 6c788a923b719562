//! Connection configuration types.

use std::time::Duration;

use crate::url::{ImapUrl, Scheme};

/// How the connection should be secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Clear text only; STARTTLS is never attempted.
    None,
    /// Upgrade with STARTTLS when the server offers it, fall back to clear
    /// text otherwise.
    Opportunistic,
    /// STARTTLS must succeed before any credentials are sent.
    Required,
    /// TLS from the first byte (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::Opportunistic | Self::Required => 143,
            Self::Implicit => 993,
        }
    }

    /// Whether a STARTTLS upgrade should be attempted after CAPABILITY.
    #[must_use]
    pub const fn wants_starttls(self) -> bool {
        matches!(self, Self::Opportunistic | Self::Required)
    }
}

/// Login credentials for the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Credentials; with none configured, authentication is skipped.
    pub credentials: Option<Credentials>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout for each awaited server response.
    pub response_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 993,
            security: Security::Implicit,
            credentials: None,
            connect_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(60),
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Derives a configuration from a parsed URL: implicit TLS for
    /// `imaps://`, opportunistic STARTTLS for `imap://`, credentials and
    /// port from the URL where present.
    #[must_use]
    pub fn from_url(url: &ImapUrl) -> Self {
        let security = match url.scheme {
            Scheme::Imap => Security::Opportunistic,
            Scheme::Imaps => Security::Implicit,
        };
        let credentials = url.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: url.password.clone().unwrap_or_default(),
        });
        ConfigBuilder {
            host: url.host.clone(),
            port: Some(url.port),
            security,
            credentials,
            connect_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(60),
        }
        .build()
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    credentials: Option<Credentials>,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            credentials: None,
            connect_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(60),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-response timeout.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            credentials: self.credentials,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::Opportunistic.default_port(), 143);
        assert_eq!(Security::Required.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("imap.example.com")
            .security(Security::Opportunistic)
            .build();
        assert_eq!(config.port, 143);

        let config = Config::builder("imap.example.com")
            .security(Security::Required)
            .port(1143)
            .build();
        assert_eq!(config.port, 1143);
    }

    #[test]
    fn test_config_from_url() {
        let url = crate::url::ImapUrl::parse("imap://joe:pw@mail.example.com/INBOX;UID=4")
            .unwrap();
        let config = Config::from_url(&url);

        assert_eq!(config.host, "mail.example.com");
        assert_eq!(config.port, 143);
        assert_eq!(config.security, Security::Opportunistic);
        let creds = config.credentials.unwrap();
        assert_eq!(creds.username, "joe");
        assert_eq!(creds.password, "pw");
    }

    #[test]
    fn test_config_from_imaps_url() {
        let url = crate::url::ImapUrl::parse("imaps://mail.example.com/").unwrap();
        let config = Config::from_url(&url);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.port, 993);
        assert!(config.credentials.is_none());
    }
}
