//! A name-keyed cookie map that round-trips through a `Cookie` header string.

use chrono::Utc;
use cookie::Cookie;

/// Cookies carried between requests, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a jar from a `Cookie` request header (`a=1; b=2`).
    pub fn from_header(header: &str) -> Self {
        let mut jar = Self::new();
        for cookie in Cookie::split_parse(header).flatten() {
            jar.set(cookie.name(), cookie.value());
        }
        jar
    }

    /// Applies one `Set-Cookie` response header value.
    ///
    /// Only the name and value are kept. A `Max-Age` of zero or less, or an
    /// `Expires` date in the past, deletes the cookie instead.
    pub fn apply_set_cookie(&mut self, set_cookie: &str) {
        let Ok(cookie) = Cookie::parse(set_cookie) else {
            return;
        };
        if is_expired(&cookie) {
            self.remove(cookie.name());
        } else {
            self.set(cookie.name(), cookie.value());
        }
    }

    /// Inserts or overwrites a cookie, keeping the original position.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the jar as a `Cookie` header, or `None` when empty.
    pub fn to_header(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

fn is_expired(cookie: &Cookie) -> bool {
    let max_age_elapsed = cookie
        .max_age()
        .is_some_and(|age| age.whole_seconds() <= 0);
    let expires_passed = cookie
        .expires_datetime()
        .is_some_and(|at| at.unix_timestamp() <= Utc::now().timestamp());
    max_age_elapsed || expires_passed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip_keeps_order() {
        let jar = CookieJar::from_header("JSESSIONID=abc; SERVERID=s1");
        assert_eq!(jar.to_header().as_deref(), Some("JSESSIONID=abc; SERVERID=s1"));
    }

    #[test]
    fn test_set_cookie_overwrites_and_appends() {
        let mut jar = CookieJar::from_header("JSESSIONID=old; SERVERID=s1");
        jar.apply_set_cookie("JSESSIONID=new; Path=/vtop; Secure; HttpOnly");
        jar.apply_set_cookie("loginUserType=student; Path=/");
        jar.apply_set_cookie("JSESSIONID=newer; Path=/vtop");

        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("JSESSIONID"), Some("newer"));
        assert_eq!(
            jar.to_header().as_deref(),
            Some("JSESSIONID=newer; SERVERID=s1; loginUserType=student")
        );
    }

    #[test]
    fn test_max_age_zero_deletes() {
        let mut jar = CookieJar::from_header("a=1; b=2");
        jar.apply_set_cookie("a=; Max-Age=0; Path=/");
        assert_eq!(jar.to_header().as_deref(), Some("b=2"));
    }

    #[test]
    fn test_past_expires_deletes() {
        let mut jar = CookieJar::from_header("JSESSIONID=abc; SERVERID=s1");
        jar.apply_set_cookie("SERVERID=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/");
        assert_eq!(jar.to_header().as_deref(), Some("JSESSIONID=abc"));
        assert_eq!(jar.get("SERVERID"), None);
    }

    #[test]
    fn test_future_expires_keeps_cookie() {
        let mut jar = CookieJar::new();
        jar.apply_set_cookie("SERVERID=s2; Expires=Thu, 31 Dec 2099 23:59:59 GMT; Path=/");
        assert_eq!(jar.get("SERVERID"), Some("s2"));
    }

    #[test]
    fn test_negative_max_age_deletes() {
        let mut jar = CookieJar::from_header("a=1");
        jar.apply_set_cookie("a=gone; Max-Age=-1");
        assert!(jar.is_empty());
    }

    #[test]
    fn test_garbage_is_ignored() {
        let mut jar = CookieJar::new();
        jar.apply_set_cookie("no-equals-sign");
        jar.apply_set_cookie("=value-without-name");
        assert!(jar.is_empty());
        assert_eq!(jar.to_header(), None);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let mut jar = CookieJar::new();
        jar.apply_set_cookie("token=YWJj==; Path=/");
        assert_eq!(jar.get("token"), Some("YWJj=="));
    }
}
