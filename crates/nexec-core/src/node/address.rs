use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Network address of one node: `(scheme, host, port)`.
///
/// Accepts full URLs (`https://node.example.com:50212`) or bare
/// `host:port` pairs, which get the `tcp` scheme. IPv6 hosts keep their
/// brackets so `Display` always yields a parseable address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let with_scheme = if s.contains("://") {
            s.to_string()
        } else {
            format!("tcp://{s}")
        };
        let parsed = url::Url::parse(&with_scheme)
            .with_context(|| format!("invalid node address: {s}"))?;

        let scheme = parsed.scheme().to_string();
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("node address missing host: {s}"))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("node address missing port: {s}"))?;

        Ok(Self { scheme, host, port })
    }

    /// `host:port`, without the scheme.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
