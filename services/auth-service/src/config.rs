use anyhow::{anyhow, bail, Context, Result};
use common_auth::{JwtConfig, DEFAULT_COOKIE_NAME};
use std::env;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use subtle::ConstantTimeEq;

const DEFAULT_BUCKETS: &[f64] = &[50.0, 100.0, 200.0, 300.0, 400.0, 500.0, 1000.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSameSite {
    Lax,
    Strict,
    None,
}

impl CookieSameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            CookieSameSite::Lax => "Lax",
            CookieSameSite::Strict => "Strict",
            CookieSameSite::None => "None",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub max_age: Duration,
    pub domain: Option<String>,
    pub secure: bool,
    pub same_site: CookieSameSite,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub max_requests: u32,
    pub message: String,
}

/// Shared secret presented by internal services in `x-service-token`.
#[derive(Clone)]
pub struct ServiceToken(String);

impl ServiceToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceToken(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    pub environment: String,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cookie: CookieSettings,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitSettings,
    /// Take the client address from forwarding headers instead of the socket peer.
    pub trust_proxy: bool,
    pub service_token: Option<ServiceToken>,
    pub http_buckets: Vec<f64>,
    pub metrics_require_auth: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

        let host = get("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse HOST")?;
        let port = parse_number(get("PORT"), 3000u16).context("Failed to parse PORT")?;
        let environment = get("APP_ENV").unwrap_or_else(|| "development".to_string());
        let production = environment.eq_ignore_ascii_case("production");

        let database_url = get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let secret = get("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;
        let access_ttl = match get("JWT_EXPIRES_IN") {
            Some(raw) => parse_duration(&raw).context("Failed to parse JWT_EXPIRES_IN")?,
            None => Duration::from_secs(60 * 60),
        };
        let leeway = parse_number(get("JWT_LEEWAY_SECONDS"), 0u64)
            .context("Failed to parse JWT_LEEWAY_SECONDS")?;

        let cookie_name = get("COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());
        let jwt = JwtConfig::new(secret)
            .context("Invalid JWT_SECRET")?
            .with_ttl(access_ttl)
            .with_leeway(leeway)
            .with_cookie_name(cookie_name.clone());

        let cookie_days = parse_number(get("COOKIE_EXPIRE_DAYS"), 7u64)
            .context("Failed to parse COOKIE_EXPIRE_DAYS")?;
        let cookie = CookieSettings {
            name: cookie_name,
            max_age: Duration::from_secs(cookie_days * 24 * 60 * 60),
            domain: get("COOKIE_DOMAIN"),
            secure: get("COOKIE_SECURE")
                .map(|value| parse_bool(&value))
                .unwrap_or(production),
            same_site: get("COOKIE_SAMESITE")
                .map(|value| parse_same_site(&value))
                .transpose()
                .context("Failed to parse COOKIE_SAMESITE")?
                .unwrap_or(CookieSameSite::Lax),
        };

        let cors_origins = parse_list(
            &get("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:4200".to_string()),
        );

        let window_ms = parse_number(get("RATE_LIMIT_WINDOW_MS"), 15 * 60 * 1000u64)
            .context("Failed to parse RATE_LIMIT_WINDOW_MS")?;
        if window_ms == 0 {
            bail!("RATE_LIMIT_WINDOW_MS must be greater than zero");
        }
        let rate_limit = RateLimitSettings {
            window: Duration::from_millis(window_ms),
            max_requests: parse_number(get("RATE_LIMIT_MAX"), 100u32)
                .context("Failed to parse RATE_LIMIT_MAX")?,
            message: get("RATE_LIMIT_MESSAGE")
                .unwrap_or_else(|| "Too many requests, please try again later.".to_string()),
        };

        let http_buckets = match get("PROM_HTTP_BUCKETS") {
            Some(raw) => parse_buckets(&raw).context("Failed to parse PROM_HTTP_BUCKETS")?,
            None => DEFAULT_BUCKETS.to_vec(),
        };

        Ok(ServiceConfig {
            host,
            port,
            environment,
            database_url,
            jwt,
            cookie,
            cors_origins,
            rate_limit,
            trust_proxy: get("TRUST_PROXY")
                .map(|value| parse_bool(&value))
                .unwrap_or(false),
            service_token: get("SERVICE_AUTH_TOKEN").map(ServiceToken::new),
            http_buckets,
            metrics_require_auth: get("METRICS_REQUIRE_AUTH")
                .map(|value| parse_bool(&value))
                .unwrap_or(false),
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T>(value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => Ok(raw.parse::<T>()?),
        None => Ok(default),
    }
}

/// Accepts bare seconds or a number with an `s`, `m`, `h` or `d` suffix.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let trimmed = value.trim().to_ascii_lowercase();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| anyhow!("Invalid duration '{value}'"))?;
    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => bail!("Unsupported duration unit '{other}' in '{value}'"),
    };
    if amount == 0 {
        bail!("Duration '{value}' must be greater than zero");
    }
    Ok(Duration::from_secs(amount * multiplier))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(normalize_optional)
        .collect()
}

fn parse_buckets(value: &str) -> Result<Vec<f64>> {
    let mut buckets = value
        .split(',')
        .filter_map(normalize_optional)
        .map(|item| {
            item.parse::<f64>()
                .map_err(|_| anyhow!("Invalid bucket '{item}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    buckets.sort_by(|a, b| a.total_cmp(b));
    buckets.dedup();
    if buckets.is_empty() {
        bail!("At least one histogram bucket is required");
    }
    Ok(buckets)
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_same_site(value: &str) -> Result<CookieSameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lax" => Ok(CookieSameSite::Lax),
        "strict" => Ok(CookieSameSite::Strict),
        "none" => Ok(CookieSameSite::None),
        other => Err(anyhow!(
            "Unsupported cookie same-site policy '{other}'. Use Lax, Strict, or None."
        )),
    }
}
