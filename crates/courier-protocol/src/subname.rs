//! Subscription name codec.
//!
//! A subscription name packs `(prefix, handler, topic)` into a single opaque
//! string so that an inbound delivery can be routed back to its handler.
//! Dots inside the prefix are rewritten to hyphens on encode, which makes the
//! dot an unambiguous separator on decode.
//!
//! Decoding deliberately splits in two limit-2 passes: the handler segment is
//! assumed to never contain a dot, while the topic may contain arbitrarily
//! many (`orders.created`). Changing this algorithm changes which substring
//! is handler vs. topic for dotted names, and would break already-provisioned
//! subscriptions.

/// Encode a subscription name from a prefix, handler name and topic.
#[must_use]
pub fn encode(prefix: &str, handler: &str, topic: &str) -> String {
    format!("{}.{}.{}", prefix.replace('.', "-"), handler, topic)
}

/// Decode a subscription URI into `(handler, topic)`.
///
/// Takes the path segment after the last `/`, strips the leading prefix
/// segment, then splits the remainder on the first dot. An underscoped name
/// yields an empty topic; callers must treat that as "no matching handler",
/// not as a hard error.
#[must_use]
pub fn decode(sub_uri: &str) -> (String, String) {
    let name = sub_uri.rsplit('/').next().unwrap_or(sub_uri);

    // Drop the prefix segment. When there is no dot at all, the whole
    // segment carries over (mirrors splitting with limit 2 and keeping the
    // last element).
    let remainder = name.splitn(2, '.').last().unwrap_or("");

    let mut parts = remainder.splitn(2, '.');
    let handler = parts.next().unwrap_or("").to_string();
    let topic = parts.next().unwrap_or("").to_string();

    (handler, topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(
            encode("my-app", "user_subscriber", "orders"),
            "my-app.user_subscriber.orders"
        );
    }

    #[test]
    fn test_encode_rewrites_prefix_dots() {
        assert_eq!(
            encode("my.app.staging", "user_subscriber", "orders"),
            "my-app-staging.user_subscriber.orders"
        );
    }

    #[test]
    fn test_decode_full_uri() {
        let (handler, topic) =
            decode(".../projects/p/subscriptions/my-app.user_subscriber.orders.created");
        assert_eq!(handler, "user_subscriber");
        assert_eq!(topic, "orders.created");
    }

    #[test]
    fn test_roundtrip() {
        let cases = [
            ("my-app", "user_subscriber", "orders"),
            ("my-app", "user_subscriber", "orders.created"),
            ("prefix", "h", "a.b.c.d"),
        ];
        for (prefix, handler, topic) in cases {
            let encoded = encode(prefix, handler, topic);
            assert_eq!(decode(&encoded), (handler.to_string(), topic.to_string()));
        }
    }

    #[test]
    fn test_decode_bare_name() {
        let (handler, topic) = decode("my-app.user_subscriber.orders");
        assert_eq!(handler, "user_subscriber");
        assert_eq!(topic, "orders");
    }

    #[test]
    fn test_decode_underscoped_name_yields_empty_topic() {
        let (handler, topic) = decode("my-app.user_subscriber");
        assert_eq!(handler, "user_subscriber");
        assert_eq!(topic, "");

        let (handler, topic) = decode("just-a-prefix");
        assert_eq!(handler, "just-a-prefix");
        assert_eq!(topic, "");
    }
}
