use crate::identity::CookiePolicy;

/// Runtime knobs read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub port: u16,
    pub daily_vote_quota: i64,
    pub feed_page_size: i64,
    pub feed_max_limit: i64,
    pub ad_pool_size: i64,
    pub admin_page_size: i64,
    /// UTC offset defining where the voting day starts.
    pub vote_tz_offset_minutes: i32,
    pub cookie: CookiePolicy,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            daily_vote_quota: 30,
            feed_page_size: 8,
            feed_max_limit: 20,
            ad_pool_size: 20,
            admin_page_size: 10,
            vote_tz_offset_minutes: 0,
            cookie: CookiePolicy::default(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "unparsable setting, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        let positive = |v: i64, fallback: i64| if v > 0 { v } else { fallback };
        let feed_max_limit = positive(env_or("FEED_MAX_LIMIT", d.feed_max_limit), d.feed_max_limit);
        Self {
            bind_addr: env_or("BIND_ADDR", d.bind_addr),
            port: env_or("PORT", d.port),
            daily_vote_quota: positive(env_or("DAILY_VOTE_LIMIT", d.daily_vote_quota), d.daily_vote_quota),
            feed_page_size: positive(env_or("FEED_PAGE_SIZE", d.feed_page_size), d.feed_page_size).min(feed_max_limit),
            feed_max_limit,
            ad_pool_size: positive(env_or("AD_POOL_SIZE", d.ad_pool_size), d.ad_pool_size),
            admin_page_size: positive(env_or("ADMIN_PAGE_SIZE", d.admin_page_size), d.admin_page_size),
            vote_tz_offset_minutes: env_or("VOTE_TZ_OFFSET_MINUTES", d.vote_tz_offset_minutes),
            cookie: CookiePolicy {
                secure: env_flag("COOKIE_SECURE", d.cookie.secure),
                http_only: env_flag("COOKIE_HTTP_ONLY", d.cookie.http_only),
            },
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", d.max_upload_bytes),
        }
    }
}
