//! Address geocoding
//!
//! Free-text address to coordinates. The lookup service is an unreliable
//! third party, so callers go through [`geocode_with_retry`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::GeoPoint;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::network::NetworkStatus;
use crate::retry::RetryExecutor;

/// Geocoding lookup service
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for `address`, or `None` when nothing matches
    async fn lookup(&self, address: &str) -> ClientResult<Option<GeoPoint>>;
}

/// Nominatim search result (coordinates arrive as strings)
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// OpenStreetMap Nominatim client
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    network: NetworkStatus,
}

impl NominatimGeocoder {
    pub fn new(config: &ClientConfig, network: NetworkStatus) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.retry.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build geocoder client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.geocoder_url.trim_end_matches('/').to_string(),
            network,
        })
    }
}

fn parse_hit(hit: &SearchHit) -> ClientResult<GeoPoint> {
    let latitude: f64 = hit
        .lat
        .parse()
        .map_err(|_| ClientError::InvalidResponse(format!("bad latitude '{}'", hit.lat)))?;
    let longitude: f64 = hit
        .lon
        .parse()
        .map_err(|_| ClientError::InvalidResponse(format!("bad longitude '{}'", hit.lon)))?;
    Ok(GeoPoint::new(latitude, longitude))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, address: &str) -> ClientResult<Option<GeoPoint>> {
        if !self.network.is_online() {
            return Err(ClientError::Offline);
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let hits: Vec<SearchHit> = response.json().await?;
        hits.first().map(parse_hit).transpose()
    }
}

/// Geocode through the retry policy. Blank addresses resolve to `None`
/// without a remote call.
pub async fn geocode_with_retry(
    geocoder: &dyn Geocoder,
    executor: &RetryExecutor,
    address: &str,
) -> ClientResult<Option<GeoPoint>> {
    let address = address.trim();
    if address.is_empty() {
        return Ok(None);
    }

    let point = executor.execute(|| geocoder.lookup(address)).await?;
    match point {
        Some(p) if p.is_valid() => Ok(Some(p)),
        Some(p) => {
            tracing::warn!(address, latitude = p.latitude, longitude = p.longitude, "Geocoder returned out-of-range coordinates");
            Ok(None)
        }
        None => {
            tracing::debug!(address, "Address not found by geocoder");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyGeocoder {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl Geocoder for FlakyGeocoder {
        async fn lookup(&self, _address: &str) -> ClientResult<Option<GeoPoint>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ClientError::Status {
                    status: 429,
                    message: "Too Many Requests".into(),
                })
            } else {
                Ok(Some(GeoPoint::new(41.39, 2.17)))
            }
        }
    }

    #[test]
    fn test_parse_hit() {
        let hit = SearchHit {
            lat: "41.3874".into(),
            lon: "2.1686".into(),
        };
        assert_eq!(parse_hit(&hit).unwrap(), GeoPoint::new(41.3874, 2.1686));

        let bad = SearchHit {
            lat: "north".into(),
            lon: "2".into(),
        };
        assert!(matches!(parse_hit(&bad), Err(ClientError::InvalidResponse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_lookup_is_retried() {
        let geocoder = FlakyGeocoder {
            calls: AtomicU32::new(0),
            failures: 2,
        };
        let executor = RetryExecutor::new(RetryPolicy::new(
            3,
            Duration::from_millis(100),
            Duration::from_secs(1),
        ));

        let point = geocode_with_retry(&geocoder, &executor, "Carrer de Mallorca 401, Barcelona")
            .await
            .unwrap();
        assert_eq!(point, Some(GeoPoint::new(41.39, 2.17)));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_blank_address_skips_lookup() {
        let geocoder = FlakyGeocoder {
            calls: AtomicU32::new(0),
            failures: 0,
        };
        let point = geocode_with_retry(&geocoder, &RetryExecutor::default(), "   ")
            .await
            .unwrap();
        assert!(point.is_none());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }
}
