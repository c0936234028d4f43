use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::Error;
use futures_util::future::{LocalBoxFuture, ready, Ready};
use std::rc::Rc;

/// Self-hosted uploads plus https media (embedded promise videos).
pub const DEFAULT_CSP: &str = "default-src 'self'; img-src 'self' data: https:; media-src 'self' https:; object-src 'none'; base-uri 'none'; frame-ancestors 'none'; form-action 'self'";

/// Response hardening headers. Handlers that set one of these themselves win.
#[derive(Clone)]
pub struct SecurityHeaders {
    pub enable_hsts: bool,
    pub csp: String,
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self { enable_hsts: false, csp: DEFAULT_CSP.to_string() }
    }
}

impl SecurityHeaders {
    /// `ENABLE_HSTS` (1/true) and an optional `CSP` override.
    pub fn from_env() -> Self {
        let enable_hsts = std::env::var("ENABLE_HSTS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let csp = std::env::var("CSP").ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| DEFAULT_CSP.to_string());
        Self { enable_hsts, csp }
    }

    pub fn with_hsts(mut self, enable: bool) -> Self {
        self.enable_hsts = enable;
        self
    }

    fn header_set(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut set = Vec::with_capacity(6);
        match HeaderValue::from_str(&self.csp) {
            Ok(v) => set.push((header::CONTENT_SECURITY_POLICY, v)),
            Err(_) => {
                tracing::warn!("CSP is not a valid header value; using default");
                set.push((header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(DEFAULT_CSP)));
            }
        }
        set.push((header::REFERRER_POLICY, HeaderValue::from_static("strict-origin-when-cross-origin")));
        set.push((header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")));
        set.push((header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")));
        set.push((HeaderName::from_static("permissions-policy"), HeaderValue::from_static("camera=(), microphone=(), geolocation=()")));
        if self.enable_hsts {
            set.push((header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static("max-age=63072000; includeSubDomains")));
        }
        set
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddleware {
            service: Rc::new(service),
            headers: self.header_set().into(),
        }))
    }
}

pub struct SecurityHeadersMiddleware<S> {
    service: Rc<S>,
    headers: Rc<[(HeaderName, HeaderValue)]>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let set = self.headers.clone();
        Box::pin(async move {
            let mut res = svc.call(req).await?;
            let headers = res.response_mut().headers_mut();
            for (name, value) in set.iter() {
                if !headers.contains_key(name) {
                    headers.insert(name.clone(), value.clone());
                }
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsts_only_when_enabled() {
        let names = |h: &SecurityHeaders| h.header_set().into_iter().map(|(n, _)| n).collect::<Vec<_>>();
        assert!(!names(&SecurityHeaders::default()).contains(&header::STRICT_TRANSPORT_SECURITY));
        assert!(names(&SecurityHeaders::default().with_hsts(true)).contains(&header::STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn invalid_csp_falls_back() {
        let h = SecurityHeaders { enable_hsts: false, csp: "bad\nvalue".into() };
        let (_, v) = &h.header_set()[0];
        assert_eq!(v, DEFAULT_CSP);
    }
}
