//! Dev-server address resolution and negotiation.

use async_trait::async_trait;
use tokio::net::TcpListener;

use crate::config::{Address, ValueExt};
use crate::error::ConfigError;
use serde_json::Value;

/// Default dev-server host when neither the caller nor the script sets one.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default dev-server port when neither the caller nor the script sets one.
pub const DEFAULT_PORT: u16 = 8080;

/// Negotiates the actual dev-server address for a requested one.
///
/// Returning `None` declines the request, which fails the cycle.
#[async_trait(?Send)]
pub trait AddressNegotiator {
    async fn negotiate(&self, requested: &Address) -> Option<Address>;
}

/// Finds the first bindable port at or above the requested one.
#[derive(Debug, Clone, Copy)]
pub struct PortProbe {
    /// How many consecutive ports to try
    pub attempts: u16,
}

impl Default for PortProbe {
    fn default() -> Self {
        Self { attempts: 20 }
    }
}

#[async_trait(?Send)]
impl AddressNegotiator for PortProbe {
    async fn negotiate(&self, requested: &Address) -> Option<Address> {
        for offset in 0..self.attempts {
            let port = requested.port.checked_add(offset)?;
            match TcpListener::bind((requested.host.as_str(), port)).await {
                Ok(listener) => {
                    // release immediately; the dev server binds it later
                    drop(listener);
                    if offset > 0 {
                        tracing::info!("Port {} is in use, using {} instead", requested.port, port);
                    }
                    return Some(Address::new(requested.host.clone(), port));
                }
                Err(e) => tracing::debug!("Cannot bind {}:{}: {}", requested.host, port, e),
            }
        }
        None
    }
}

/// The address this cycle asks for: caller options, then the script, then defaults.
pub fn requested_address(host: Option<&str>, port: Option<u16>, cfg: &Value) -> Address {
    let host = host.map(str::to_string).or_else(|| cfg.text_at("devServer.host").map(str::to_string));
    let port = port.or_else(|| cfg.at("devServer.port").and_then(Value::as_u64).and_then(|p| u16::try_from(p).ok()));
    Address::new(host.unwrap_or_else(|| DEFAULT_HOST.to_string()), port.unwrap_or(DEFAULT_PORT))
}

/// Resolve the authoritative dev-server address for this cycle.
///
/// `cache` holds the last `(requested, negotiated)` pair of the session; an
/// unchanged request reuses the negotiated address without asking again.
pub async fn resolve_address(
    requested: Address,
    negotiator: Option<&dyn AddressNegotiator>,
    cache: &mut Option<(Address, Address)>,
) -> Result<Address, ConfigError> {
    if let Some((previous, negotiated)) = cache.as_ref() {
        if *previous == requested {
            return Ok(negotiated.clone());
        }
    }

    let Some(negotiator) = negotiator else {
        *cache = Some((requested.clone(), requested.clone()));
        return Ok(requested);
    };

    match negotiator.negotiate(&requested).await {
        Some(actual) => {
            *cache = Some((requested, actual.clone()));
            Ok(actual)
        }
        None => Err(ConfigError::Network(requested)),
    }
}
