// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the pool tokenizer

#[cfg(test)]
mod tests {
    use super::super::{json_type, PoolTokenizer, ServerToken};
    use crate::constants::DEFAULT_SERVER_PORT;
    use crate::errors::TemplateError;
    use serde_json::{json, Value};

    const POOL: &str = "test-pool";

    fn tokenizer() -> PoolTokenizer {
        PoolTokenizer::new(DEFAULT_SERVER_PORT)
    }

    fn tokenize(pool: &Value) -> Result<Vec<ServerToken>, TemplateError> {
        tokenizer().tokenize(POOL, pool)
    }

    fn failure_message(pool: &Value) -> String {
        let err = tokenize(pool).unwrap_err();
        assert!(matches!(err, TemplateError::PoolTokenization { ref pool, .. } if pool == POOL));
        err.to_string()
    }

    fn fixed(literal: &str) -> ServerToken {
        ServerToken::Fixed {
            literal: literal.to_string(),
        }
    }

    fn dns_a(hostname: &str, port: u16) -> ServerToken {
        ServerToken::DnsA {
            hostname: hostname.to_string(),
            port,
        }
    }

    fn dns_srv(service: &str) -> ServerToken {
        ServerToken::DnsSrv {
            service: service.to_string(),
        }
    }

    // ========================================================================
    // Valid pools
    // ========================================================================

    #[test]
    fn test_empty_pool() {
        assert!(tokenize(&json!({ "servers": [] })).unwrap().is_empty());
    }

    #[test]
    fn test_dns_a_with_default_port() {
        let tokens = tokenize(&json!({ "servers": ["dns://default.port.example"] })).unwrap();

        assert_eq!(tokens, vec![dns_a("default.port.example", DEFAULT_SERVER_PORT)]);
    }

    #[test]
    fn test_dns_a_with_custom_port() {
        let tokens = tokenize(&json!({ "servers": ["dns+1234://custom.port.example"] })).unwrap();

        assert_eq!(tokens, vec![dns_a("custom.port.example", 1234)]);
    }

    #[test]
    fn test_custom_default_port() {
        let tokens = PoolTokenizer::new(6379)
            .tokenize(POOL, &json!({ "servers": ["dns://redis.example"] }))
            .unwrap();

        assert_eq!(tokens, vec![dns_a("redis.example", 6379)]);
    }

    #[test]
    fn test_dns_srv() {
        let tokens =
            tokenize(&json!({ "servers": ["dnssrv://_memcache._tcp.srv.example"] })).unwrap();

        assert_eq!(tokens, vec![dns_srv("_memcache._tcp.srv.example")]);
    }

    #[test]
    fn test_fixed() {
        let tokens = tokenize(&json!({ "servers": ["fixed:4567"] })).unwrap();

        assert_eq!(tokens, vec![fixed("fixed:4567")]);
    }

    #[test]
    fn test_mixed_pool_keeps_order() {
        let pool = json!({
            "servers": [
                "fixed:4567",
                "dns://default.port.example",
                "dns+1234://custom.port.example",
                "dnssrv://_memcache._tcp.srv.example",
                "fixed:7890"
            ]
        });

        let expected = vec![
            fixed("fixed:4567"),
            dns_a("default.port.example", DEFAULT_SERVER_PORT),
            dns_a("custom.port.example", 1234),
            dns_srv("_memcache._tcp.srv.example"),
            fixed("fixed:7890"),
        ];
        assert_eq!(tokenize(&pool).unwrap(), expected);
        // Deterministic
        assert_eq!(tokenize(&pool).unwrap(), expected);
    }

    #[test]
    fn test_dns_plus_without_host_is_fixed() {
        let tokens = tokenize(&json!({ "servers": ["dns+1234://", "dns+1234"] })).unwrap();

        assert_eq!(tokens, vec![fixed("dns+1234://"), fixed("dns+1234")]);
    }

    #[test]
    fn test_dns_plus_boundary_ports() {
        let tokens = tokenize(&json!({ "servers": ["dns+0://a.example", "dns+65535://b.example"] }))
            .unwrap();

        assert_eq!(tokens, vec![dns_a("a.example", 0), dns_a("b.example", 65535)]);
    }

    // ========================================================================
    // Structural failures
    // ========================================================================

    #[test]
    fn test_fails_on_null_pool() {
        assert_eq!(failure_message(&Value::Null), "pool[test-pool]: is null");
    }

    #[test]
    fn test_fails_on_non_object_pool() {
        for pool in [json!([]), json!("string"), json!(123)] {
            let message = failure_message(&pool);
            assert!(message.contains("is not a json object"), "{message}");
            assert!(message.contains(json_type(&pool)), "{message}");
        }
    }

    #[test]
    fn test_fails_on_absent_servers() {
        assert_eq!(
            failure_message(&json!({})),
            "pool[test-pool]: has no 'servers' field"
        );
    }

    #[test]
    fn test_fails_on_null_servers() {
        assert_eq!(
            failure_message(&json!({ "servers": null })),
            "pool[test-pool]: $.servers is null"
        );
    }

    #[test]
    fn test_fails_on_non_array_servers() {
        for servers in [json!({}), json!("string"), json!(1234)] {
            let message = failure_message(&json!({ "servers": servers }));
            assert!(message.contains("servers is not a json array"), "{message}");
            assert!(message.contains(json_type(&servers)), "{message}");
        }
    }

    // ========================================================================
    // Entry failures
    // ========================================================================

    #[test]
    fn test_fails_once_on_null_server() {
        let message = failure_message(&json!({ "servers": ["1.2.3.4:1234", null] }));

        assert_eq!(
            message,
            "pool[test-pool]: Some servers in $.servers were not successfully parsed:\n\
             - servers[1] is null"
        );
    }

    #[test]
    fn test_fails_on_non_string_server() {
        for server in [json!([]), json!({}), json!(1234)] {
            let message = failure_message(&json!({ "servers": ["1.2.3.4:1234", server] }));
            assert!(
                message.contains(&format!("- servers[1] is not a string (was: {})", json_type(&server))),
                "{message}"
            );
        }
    }

    #[test]
    fn test_fails_on_blank_server() {
        let message = failure_message(&json!({ "servers": ["1.2.3.4:1234", " "] }));

        assert!(message.ends_with("- servers[1] is a blank string"), "{message}");
    }

    #[test]
    fn test_fails_on_invalid_dns_a_port() {
        for server in [
            "dns+abc://a.server.example",
            "dns+://a.server.example",
            "dns+65536://a.server.example",
            "dns+-1://a.server.example",
        ] {
            let message = failure_message(&json!({ "servers": ["1.2.3.4:1234", server] }));
            assert!(
                message.contains(&format!("- servers[1] is not a valid server token (from: '{server}')")),
                "{message}"
            );
        }
    }

    #[test]
    fn test_aggregates_every_failure() {
        let pool = json!({
            "servers": [null, "ok:1", 42, "  ", "dns+x://host", "dns://fine"]
        });

        let message = failure_message(&pool);
        let lines: Vec<&str> = message.lines().collect();

        assert_eq!(
            lines,
            vec![
                "pool[test-pool]: Some servers in $.servers were not successfully parsed:",
                "- servers[0] is null",
                "- servers[2] is not a string (was: NUMBER)",
                "- servers[3] is a blank string",
                "- servers[4] is not a valid server token (from: 'dns+x://host')",
            ]
        );
    }
}
