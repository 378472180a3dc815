//! Custom assertions for requests captured by the mock auth service

use wiremock::Request;

/// Assertions on a captured request.
///
/// # Example
/// ```rust,ignore
/// auth.token_requests().await[0]
///     .assert_form_field("grant_type", "client_credentials")
///     .assert_header("content-type", "application/x-www-form-urlencoded");
/// ```
pub trait RequestAssertions {
    /// Assert the url-encoded form body carries `name=value` (decoded).
    fn assert_form_field(&self, name: &str, value: &str) -> &Self;

    /// Assert the form body has no field called `name`.
    fn assert_no_form_field(&self, name: &str) -> &Self;

    /// Assert a header is present with exactly `value`.
    fn assert_header(&self, name: &str, value: &str) -> &Self;

    /// Assert a header is absent.
    fn assert_no_header(&self, name: &str) -> &Self;
}

impl RequestAssertions for Request {
    fn assert_form_field(&self, name: &str, value: &str) -> &Self {
        let fields = form_fields(self);
        let found = fields.iter().find(|(k, _)| k == name);
        assert!(
            found.is_some(),
            "Form body has no field '{}'. Fields: {:?}",
            name,
            fields.iter().map(|(k, _)| k).collect::<Vec<_>>()
        );
        assert_eq!(
            found.unwrap().1,
            value,
            "Form field '{}' has unexpected value",
            name
        );
        self
    }

    fn assert_no_form_field(&self, name: &str) -> &Self {
        assert!(
            form_fields(self).iter().all(|(k, _)| k != name),
            "Form body unexpectedly has field '{}'",
            name
        );
        self
    }

    fn assert_header(&self, name: &str, value: &str) -> &Self {
        let actual = self.headers.get(name).map(|v| v.to_str().unwrap());
        assert_eq!(actual, Some(value), "Header '{}' mismatch", name);
        self
    }

    fn assert_no_header(&self, name: &str) -> &Self {
        assert!(
            self.headers.get(name).is_none(),
            "Header '{}' unexpectedly present",
            name
        );
        self
    }
}

/// Decode an `application/x-www-form-urlencoded` body into pairs.
pub fn form_fields(request: &Request) -> Vec<(String, String)> {
    let body = String::from_utf8(request.body.clone()).expect("Form body is not UTF-8");
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).expect("Invalid escape");
                out.push(u8::from_str_radix(hex, 16).expect("Invalid escape"));
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).expect("Decoded form value is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_component() {
        assert_eq!(decode_component("orders%3Aread+customers%3Aread"), "orders:read customers:read");
        assert_eq!(decode_component("plain"), "plain");
        assert_eq!(decode_component("a%20b"), "a b");
    }
}
