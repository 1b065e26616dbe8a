//! Request target rewriting: base path stripping and query merging.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Bytes escaped in a path. `%` is left alone so existing escapes survive,
/// and non-ASCII is always escaped as UTF-8.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'[')
    .add(b']');

/// Percent-encode the characters of `path` that may not appear in a URI path.
pub fn escape_path(path: &str) -> String {
    utf8_percent_encode(path, PATH).to_string()
}

/// Drop the first `n` segments of `path`.
///
/// A path with fewer than `n` segments collapses to `/`. With `n == 0` the
/// path is returned unchanged.
pub fn strip_base_path(path: &str, n: usize) -> String {
    if n == 0 {
        return path.to_string();
    }

    let comps: Vec<&str> = path.trim_start_matches('/').splitn(n + 1, '/').collect();
    if comps.len() >= n {
        format!("/{}", comps[n..].join("/"))
    } else {
        "/".to_string()
    }
}

/// Split a raw request target into path and query, dropping any fragment.
pub fn split_target(target: &str) -> (&str, &str) {
    let target = target.split('#').next().unwrap_or_default();
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

/// Merge `params` into the form-encoded `query`.
///
/// A parameter replaces every existing value under the same key. The result
/// is re-encoded with keys in sorted order.
pub fn merge_query<'a, I>(query: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        values.entry(k.into_owned()).or_default().push(v.into_owned());
    }

    for (k, v) in params {
        values.insert(k.clone(), vec![v.clone()]);
    }

    let mut encoded = form_urlencoded::Serializer::new(String::new());
    for (k, vs) in &values {
        for v in vs {
            encoded.append_pair(k, v);
        }
    }
    encoded.finish()
}

/// Build the request target for a proxied path.
pub fn resolve_target<'a, I>(raw_path: &str, strip: usize, params: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let (path, query) = split_target(raw_path);
    let mut path = escape_path(&strip_base_path(path, strip));
    if path.is_empty() {
        path.push('/');
    }

    let query = merge_query(query, params);
    if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_strip_zero_is_identity() {
        assert_eq!(strip_base_path("/a/b", 0), "/a/b");
        assert_eq!(strip_base_path("", 0), "");
    }

    #[test]
    fn test_strip_drops_leading_segments() {
        assert_eq!(strip_base_path("/a/b/c/path", 3), "/path");
        assert_eq!(strip_base_path("/stage/users/42", 1), "/users/42");
        assert_eq!(strip_base_path("/a/b/c/d/e", 3), "/d/e");
    }

    #[test]
    fn test_strip_short_path_collapses_to_root() {
        assert_eq!(strip_base_path("/a", 3), "/");
        assert_eq!(strip_base_path("/a/b", 2), "/");
        assert_eq!(strip_base_path("/", 1), "/");
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("/a?x=1#frag"), ("/a", "x=1"));
        assert_eq!(split_target("/a"), ("/a", ""));
    }

    #[test]
    fn test_merge_overwrites_existing_keys() {
        let params = HashMap::from([("x".to_string(), "2".to_string())]);
        assert_eq!(merge_query("x=1&x=3&y=a", &params), "x=2&y=a");
    }

    #[test]
    fn test_merge_encodes_values() {
        let params = HashMap::from([("email".to_string(), "a@b".to_string())]);
        assert_eq!(merge_query("", &params), "email=a%40b");

        let params = HashMap::from([("q".to_string(), "two words".to_string())]);
        assert_eq!(merge_query("", &params), "q=two+words");
    }

    #[test]
    fn test_resolve_target() {
        let params = HashMap::from([("email".to_string(), "a@b".to_string())]);
        assert_eq!(resolve_target("/a/b/c/path", 3, &params), "/path?email=a%40b");
        assert_eq!(resolve_target("", 0, &HashMap::new()), "/");
        assert_eq!(resolve_target("/x?b=2&a=1", 0, &HashMap::new()), "/x?a=1&b=2");
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path("/users/John Doe"), "/users/John%20Doe");
        assert_eq!(escape_path("/caf\u{e9}"), "/caf%C3%A9");
        assert_eq!(escape_path("/a%20b/{id}"), "/a%20b/%7Bid%7D");
        assert_eq!(escape_path("/plain/path-1_2.txt"), "/plain/path-1_2.txt");
    }

    #[test]
    fn test_resolve_target_escapes_stripped_path() {
        let params = HashMap::from([("q".to_string(), "x y".to_string())]);
        assert_eq!(
            resolve_target("/stage/users/John Doe", 1, &params),
            "/users/John%20Doe?q=x+y"
        );
    }
}
