use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpRequest;

pub const VOTER_COOKIE: &str = "anon_id";
const VOTER_COOKIE_MAX_AGE_DAYS: i64 = 365;
const MAX_TOKEN_LEN: usize = 64;

#[derive(Clone, Copy, Debug)]
pub struct CookiePolicy {
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self { Self { secure: false, http_only: true } }
}

/// Anonymous voter identity resolved for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoterIdentity {
    pub id: String,
    /// True when the token was minted for this request and must be sent back.
    pub minted: bool,
}

impl VoterIdentity {
    pub fn resolve(req: &HttpRequest) -> Self {
        match req.cookie(VOTER_COOKIE) {
            Some(c) if is_recognized(c.value()) => Self { id: c.value().to_string(), minted: false },
            _ => Self { id: uuid::Uuid::new_v4().to_string(), minted: true },
        }
    }

    /// Cookie to attach to the response, only for freshly minted identities.
    pub fn cookie(&self, policy: CookiePolicy) -> Option<Cookie<'static>> {
        if !self.minted {
            return None;
        }
        Some(
            Cookie::build(VOTER_COOKIE, self.id.clone())
                .path("/")
                .max_age(CookieDuration::days(VOTER_COOKIE_MAX_AGE_DAYS))
                .same_site(SameSite::Lax)
                .http_only(policy.http_only)
                .secure(policy.secure)
                .finish(),
        )
    }
}

fn is_recognized(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn existing_cookie_is_reused() {
        let req = TestRequest::default()
            .cookie(Cookie::new(VOTER_COOKIE, "abc-123"))
            .to_http_request();
        let voter = VoterIdentity::resolve(&req);
        assert_eq!(voter.id, "abc-123");
        assert!(!voter.minted);
        assert!(voter.cookie(CookiePolicy::default()).is_none());
    }

    #[test]
    fn missing_cookie_mints_year_long_cookie() {
        let req = TestRequest::default().to_http_request();
        let voter = VoterIdentity::resolve(&req);
        assert!(voter.minted);
        let cookie = voter.cookie(CookiePolicy::default()).unwrap();
        assert_eq!(cookie.name(), VOTER_COOKIE);
        assert_eq!(cookie.value(), voter.id);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(365)));
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn garbage_token_is_replaced() {
        let req = TestRequest::default()
            .cookie(Cookie::new(VOTER_COOKIE, "<script>"))
            .to_http_request();
        let voter = VoterIdentity::resolve(&req);
        assert!(voter.minted);
        assert_ne!(voter.id, "<script>");
    }
}
