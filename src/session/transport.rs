//! Session cookie transport: building `Set-Cookie` values and reading the
//! `Cookie` request header.

use cookie::{Cookie, SameSite};

/// Cookie holding the OAuth `state` value between redirect and callback.
pub const OAUTH_STATE_COOKIE: &str = "daylist_oauth_state";

/// Lifetime of the OAuth state cookie.
pub const OAUTH_STATE_TTL_SECS: i64 = 600;

/// Attributes shared by every cookie the gateway issues.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub max_age_secs: i64,
    pub secure: bool,
}

impl CookieSettings {
    /// HTTP-only session cookie with a fixed max-age.
    pub fn session_cookie(&self, value: &str) -> Cookie<'static> {
        build(self.name.clone(), value.to_string(), self.max_age_secs, self.secure)
    }

    /// Expired session cookie that makes the browser drop it.
    pub fn cleared_session_cookie(&self) -> Cookie<'static> {
        build(self.name.clone(), String::new(), 0, self.secure)
    }

    /// Short-lived cookie for the OAuth redirect round trip.
    pub fn oauth_state_cookie(&self, state: &str) -> Cookie<'static> {
        build(
            OAUTH_STATE_COOKIE.to_string(),
            state.to_string(),
            OAUTH_STATE_TTL_SECS,
            self.secure,
        )
    }

    pub fn cleared_oauth_state_cookie(&self) -> Cookie<'static> {
        build(OAUTH_STATE_COOKIE.to_string(), String::new(), 0, self.secure)
    }
}

fn build(name: String, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age_secs))
        .build()
}

/// Find a cookie value in a raw `Cookie` header. Malformed pairs are skipped.
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CookieSettings {
        CookieSettings {
            name: "daylist_session".into(),
            max_age_secs: 1_036_800,
            secure: false,
        }
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = settings().session_cookie("abc.def");
        assert_eq!(cookie.name(), "daylist_session");
        assert_eq!(cookie.value(), "abc.def");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(
            cookie.max_age(),
            Some(cookie::time::Duration::seconds(1_036_800))
        );

        let header = cookie.to_string();
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Max-Age=1036800"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn secure_flag_follows_settings() {
        let mut settings = settings();
        settings.secure = true;
        assert_eq!(settings.session_cookie("v").secure(), Some(true));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = settings().cleared_session_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
    }

    #[test]
    fn find_cookie_in_header() {
        let header = "theme=dark; daylist_session=tok.sig; other=1";
        assert_eq!(
            find_cookie(header, "daylist_session").as_deref(),
            Some("tok.sig")
        );
        assert_eq!(find_cookie(header, "missing"), None);
        assert_eq!(find_cookie("", "daylist_session"), None);
    }
}
