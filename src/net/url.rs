//! Connection URLs: `protocol://host[:port][/path][?k=v&...]`.
//!
//! The protocol string is opaque to the core; [`crate::service::MessagingService`]
//! matches it case-sensitively against the registered transport factories.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A parsed connection URL.
///
/// Equality is over the parsed tuple; formatting emits query parameters in
/// map order, which may differ from the order they were written in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Url {
    protocol: String,
    hostname: String,
    port: Option<u16>,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl Url {
    /// A portless URL, e.g. for transports addressed by path.
    pub fn new(protocol: impl Into<String>, hostname: impl Into<String>) -> Result<Self> {
        let url = Self {
            protocol: protocol.into(),
            hostname: hostname.into(),
            ..Self::default()
        };
        url.validate()?;
        Ok(url)
    }

    pub fn with_port(
        protocol: impl Into<String>,
        hostname: impl Into<String>,
        port: u16,
    ) -> Result<Self> {
        if port == 0 {
            return Err(Error::MalformedUrl("bad port number".to_owned()));
        }
        let mut url = Self::new(protocol, hostname)?;
        url.port = Some(port);
        Ok(url)
    }

    fn validate(&self) -> Result<()> {
        if self.protocol.is_empty() {
            return Err(Error::MalformedUrl("protocol is not specified".to_owned()));
        }
        if self.hostname.is_empty() {
            return Err(Error::MalformedUrl("hostname is not specified".to_owned()));
        }
        Ok(())
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Parses `protocol://host[:port][/path][?k=v&...]`.
    ///
    /// Query fragments without a `=` are skipped; anything else malformed
    /// fails with [`Error::MalformedUrl`].
    pub fn parse(input: &str) -> Result<Self> {
        let (protocol, rest) = input
            .split_once("://")
            .ok_or_else(|| Error::MalformedUrl("missing protocol separator".to_owned()))?;

        let mut builder = UrlBuilder::new();
        builder.protocol(protocol);

        // Authority ends at the first path or query delimiter.
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);

        match authority.split_once(':') {
            Some((host, port)) => {
                builder.hostname(host);
                let port: u16 = port
                    .parse()
                    .map_err(|_| Error::MalformedUrl("invalid port value".to_owned()))?;
                builder.port(port);
            }
            None => {
                builder.hostname(authority);
            }
        }

        let (path, query) = match tail.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (tail, None),
        };
        if !path.is_empty() {
            builder.path(path);
        }

        if let Some(query) = query {
            for fragment in query.split('&') {
                let Some((key, value)) = fragment.split_once('=') else {
                    continue;
                };
                if !key.is_empty() {
                    builder.parameter(key, value);
                }
            }
        }

        builder.build()
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.hostname)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if !self.path.is_empty() {
            if !self.path.starts_with('/') {
                write!(f, "/")?;
            }
            write!(f, "{}", self.path)?;
        }
        for (i, (key, value)) in self.parameters.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// Incremental [`Url`] construction.
#[derive(Debug, Clone, Default)]
pub struct UrlBuilder {
    protocol: String,
    hostname: String,
    port: Option<u16>,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl UrlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol(&mut self, protocol: impl Into<String>) -> &mut Self {
        self.protocol = protocol.into();
        self
    }

    pub fn hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.hostname = hostname.into();
        self
    }

    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    pub fn path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = path.into();
        self
    }

    pub fn parameter(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Validates and produces the URL.
    pub fn build(&self) -> Result<Url> {
        if self.port == Some(0) {
            return Err(Error::MalformedUrl("bad port number".to_owned()));
        }
        let url = Url {
            protocol: self.protocol.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
            path: self.path.clone(),
            parameters: self.parameters.clone(),
        };
        url.validate()?;
        Ok(url)
    }
}
