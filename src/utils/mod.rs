//! Small helpers shared across the crate.

pub mod text;

use url::Url;

/// Host part of a URL, for compact source descriptions in logs.
pub fn get_domain(url_str: &str) -> Option<String> {
    let parsed = Url::parse(url_str).ok()?;
    parsed.host_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_of_a_portal_url() {
        assert_eq!(
            get_domain("https://www.bidnetdirect.com/public/solicitations/open").as_deref(),
            Some("www.bidnetdirect.com")
        );
        assert_eq!(
            get_domain("https://portal.test:8443/bids?page=2").as_deref(),
            Some("portal.test")
        );
        assert_eq!(get_domain("not a url"), None);
    }
}
