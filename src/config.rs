use std::{env, fmt::Display, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub payments: PaymentConfig,
    pub notifier_webhook_url: Option<String>,
    pub abandoned_cart: AbandonedCartConfig,
}

/// Credentials for one payment provider. Absent credentials mean the provider is disabled.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub secret_key: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub currency: String,
    pub timeout: Duration,
    pub stripe: Option<GatewayCredentials>,
    pub paystack: Option<GatewayCredentials>,
}

#[derive(Debug, Clone)]
pub struct AbandonedCartConfig {
    pub sweep_interval: Duration,
    pub inactivity: chrono::Duration,
    pub cooldown: chrono::Duration,
}

impl Default for AbandonedCartConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(24 * 60 * 60),
            inactivity: chrono::Duration::hours(1),
            cooldown: chrono::Duration::hours(24),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000u16);

        let payments = PaymentConfig {
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            timeout: Duration::from_secs(positive_or("PAYMENT_GATEWAY_TIMEOUT_SECS", 15u64)),
            stripe: credentials(
                "STRIPE_SECRET_KEY",
                "STRIPE_API_BASE",
                "https://api.stripe.com/v1",
            ),
            paystack: credentials(
                "PAYSTACK_SECRET_KEY",
                "PAYSTACK_API_BASE",
                "https://api.paystack.co",
            ),
        };

        let defaults = AbandonedCartConfig::default();
        let abandoned_cart = AbandonedCartConfig {
            sweep_interval: Duration::from_secs(positive_or(
                "ABANDONED_CART_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            inactivity: chrono::Duration::minutes(positive_or(
                "ABANDONED_CART_INACTIVITY_MINUTES",
                defaults.inactivity.num_minutes(),
            )),
            cooldown: chrono::Duration::hours(positive_or(
                "ABANDONED_CART_COOLDOWN_HOURS",
                defaults.cooldown.num_hours(),
            )),
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            payments,
            notifier_webhook_url: env::var("NOTIFIER_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            abandoned_cart,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Like [`parse_or`], but zero or negative values also fall back to `default`.
fn positive_or<T: FromStr + PartialOrd + Default + Display + Copy>(key: &str, default: T) -> T {
    keep_positive(key, parse_or(key, default), default)
}

fn keep_positive<T: PartialOrd + Default + Display>(key: &str, value: T, default: T) -> T {
    if value > T::default() {
        return value;
    }
    tracing::warn!(key, %value, %default, "value must be positive, using default");
    default
}

fn credentials(secret_key: &str, base_key: &str, default_base: &str) -> Option<GatewayCredentials> {
    let secret_key = env::var(secret_key).ok().filter(|s| !s.trim().is_empty())?;
    let api_base = env::var(base_key).unwrap_or_else(|_| default_base.to_string());
    Some(GatewayCredentials {
        secret_key,
        api_base: api_base.trim_end_matches('/').to_string(),
    })
}
