//! Request enrichment: client IP, geo location and User-Agent classification.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use folio_core::event::DeviceType;

/// A loaded MaxMind City database.
pub type GeoReader = maxminddb::Reader<Vec<u8>>;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Peer address of the connection, when the server was started with
/// `into_make_service_with_connect_info`. Never rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaybeConnectInfo(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for MaybeConnectInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}

/// Extract the real client IP.
///
/// Order: first `X-Forwarded-For` entry (CloudFront, ALB, nginx), then
/// `X-Real-IP`, then the socket peer, then `"unknown"`.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Geo fields stored on a visit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Location as reported by the CDN in front of the API.
pub fn geo_from_headers(headers: &HeaderMap) -> GeoInfo {
    let country = ["cloudfront-viewer-country", "x-country-code", "cf-ipcountry"]
        .iter()
        .find_map(|name| header_str(headers, name))
        .map(str::to_string);
    let city = ["cloudfront-viewer-city", "x-city"]
        .iter()
        .find_map(|name| header_str(headers, name))
        .map(str::to_string);
    GeoInfo { country, city }
}

/// Attempt a GeoIP lookup for `ip` in the MaxMind database.
///
/// Returns `None` if the IP cannot be parsed or is not in the database.
pub fn lookup_geo(reader: &GeoReader, ip: &str) -> Option<GeoInfo> {
    let ip_addr = IpAddr::from_str(ip).ok()?;

    let record: maxminddb::geoip2::City = reader.lookup(ip_addr).ok()?.decode().ok()??;

    let country = record.country.iso_code.map(|s| s.to_string());

    let city = record.city.names.english.map(|s| s.to_string());

    Some(GeoInfo { country, city })
}

/// CDN headers win; the GeoIP database fills whatever they leave empty.
pub fn resolve_geo(headers: &HeaderMap, reader: Option<&GeoReader>, ip: &str) -> GeoInfo {
    let mut geo = geo_from_headers(headers);
    if geo.country.is_some() && geo.city.is_some() {
        return geo;
    }
    if let Some(found) = reader.and_then(|r| lookup_geo(r, ip)) {
        geo.country = geo.country.or(found.country);
        geo.city = geo.city.or(found.city);
    }
    geo
}

/// Parsed User-Agent fields.
#[derive(Debug, Clone, PartialEq)]
pub struct UaInfo {
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub device_type: DeviceType,
}

impl UaInfo {
    pub fn is_bot(&self) -> bool {
        self.device_type == DeviceType::Bot
    }
}

const BOT_SIGNATURES: [&str; 13] = [
    "bot",
    "spider",
    "crawler",
    "headlesschrome",
    "phantomjs",
    "python-requests",
    "curl/",
    "wget/",
    "go-http-client",
    "libwww-perl",
    "urllib",
    "httpclient",
    "lighthouse",
];

fn has_bot_signature(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    BOT_SIGNATURES.iter().any(|sig| ua.contains(sig))
}

fn known(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Classify a `User-Agent` string via the `woothee` crate.
///
/// woothee `category` maps to the stored device classification:
///   "crawler"                  → bot
///   "smartphone" on an iPad or
///   an Android without "Mobile" → tablet
///   "smartphone"/"mobilephone" → mobile
///   everything else            → desktop
///
/// An empty or unparseable UA is treated as a desktop browser of unknown
/// family unless it carries a known automation signature.
pub fn parse_user_agent(user_agent: &str) -> UaInfo {
    let unknown = |device_type| UaInfo {
        browser: None,
        browser_version: None,
        os: None,
        os_version: None,
        device_type,
    };

    if user_agent.trim().is_empty() {
        return unknown(DeviceType::Desktop);
    }

    let Some(result) = woothee::parser::Parser::new().parse(user_agent) else {
        return unknown(if has_bot_signature(user_agent) {
            DeviceType::Bot
        } else {
            DeviceType::Desktop
        });
    };

    let is_tablet = result.os == "iPad"
        || user_agent.contains("iPad")
        || (user_agent.contains("Android") && !user_agent.contains("Mobile"));

    let device_type = if result.category == "crawler" || has_bot_signature(user_agent) {
        DeviceType::Bot
    } else {
        match result.category {
            "smartphone" | "mobilephone" if is_tablet => DeviceType::Tablet,
            "smartphone" | "mobilephone" => DeviceType::Mobile,
            _ if is_tablet => DeviceType::Tablet,
            _ => DeviceType::Desktop,
        }
    };

    UaInfo {
        browser: known(&result.name),
        browser_version: known(&result.version),
        os: known(&result.os),
        os_version: known(&result.os_version),
        device_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn desktop_chrome() {
        let ua = parse_user_agent(CHROME_MAC);
        assert_eq!(ua.device_type, DeviceType::Desktop);
        assert_eq!(ua.browser.as_deref(), Some("Chrome"));
        assert!(!ua.is_bot());
    }

    #[test]
    fn iphone_is_mobile() {
        assert_eq!(parse_user_agent(IPHONE).device_type, DeviceType::Mobile);
    }

    #[test]
    fn ipad_is_tablet() {
        assert_eq!(parse_user_agent(IPAD).device_type, DeviceType::Tablet);
    }

    #[test]
    fn crawlers_and_scripts_are_bots() {
        assert!(parse_user_agent(GOOGLEBOT).is_bot());
        assert!(parse_user_agent("curl/8.4.0").is_bot());
        assert!(parse_user_agent("python-requests/2.31").is_bot());
    }

    #[test]
    fn empty_user_agent_is_desktop_unknown() {
        let ua = parse_user_agent("");
        assert_eq!(ua.device_type, DeviceType::Desktop);
        assert_eq!(ua.browser, None);
    }

    #[test]
    fn client_ip_prefers_first_forwarded_entry() {
        let peer: SocketAddr = "203.0.113.7:51000".parse().expect("addr");
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("9.9.9.9, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("8.8.8.8"));
        assert_eq!(extract_client_ip(&headers, Some(peer)), "9.9.9.9");

        headers.remove("x-forwarded-for");
        assert_eq!(extract_client_ip(&headers, Some(peer)), "8.8.8.8");

        headers.remove("x-real-ip");
        assert_eq!(extract_client_ip(&headers, Some(peer)), "203.0.113.7");
        assert_eq!(extract_client_ip(&headers, None), "unknown");
    }

    #[test]
    fn geo_headers_in_priority_order() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-ipcountry", HeaderValue::from_static("FR"));
        headers.insert("x-country-code", HeaderValue::from_static("DE"));
        headers.insert("x-city", HeaderValue::from_static("Berlin"));
        let geo = geo_from_headers(&headers);
        assert_eq!(geo.country.as_deref(), Some("DE"));
        assert_eq!(geo.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn resolve_geo_without_database_uses_headers_only() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_geo(&headers, None, "1.2.3.4"), GeoInfo::default());
    }
}
