use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Best-effort IP lookup. Failures yield `None`, never an error.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, ip: IpAddr) -> Option<GeoLocation>;
}

/// Lookups against an ip-api.com compatible endpoint (`{base}/{ip}`).
pub struct HttpGeoLocator {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGeoLocator {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    status: Option<String>,
    country: Option<String>,
    city: Option<String>,
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn locate(&self, ip: IpAddr) -> Option<GeoLocation> {
        if !is_routable(ip) {
            return None;
        }

        let url = format!("{}/{}?fields=status,country,city", self.base_url, ip);
        let result = async {
            let resp = self.http.get(&url).send().await?.error_for_status()?;
            resp.json::<LookupResponse>().await
        }
        .await;

        match result {
            Ok(body) if body.status.as_deref().unwrap_or("success") == "success" => Some(GeoLocation {
                country: body.country.filter(|c| !c.is_empty()),
                city: body.city.filter(|c| !c.is_empty()),
            }),
            Ok(_) => None,
            Err(e) => {
                debug!("Geolocation lookup for {} failed: {}", ip, e);
                None
            }
        }
    }
}

/// Used when lookups are disabled.
pub struct NoGeoLocator;

#[async_trait]
impl GeoLocator for NoGeoLocator {
    async fn locate(&self, _ip: IpAddr) -> Option<GeoLocation> {
        None
    }
}

fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()),
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn private_addresses_are_not_looked_up() {
        let locator = HttpGeoLocator::new("http://127.0.0.1:9");
        assert_eq!(locator.locate("10.1.2.3".parse().unwrap()).await, None);
        assert_eq!(locator.locate("::1".parse().unwrap()).await, None);
    }

    #[tokio::test]
    async fn unreachable_service_degrades_to_none() {
        let locator = HttpGeoLocator::new("http://127.0.0.1:9");
        assert_eq!(locator.locate("203.0.113.9".parse().unwrap()).await, None);
    }
}
