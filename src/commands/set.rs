use std::time::{Duration, SystemTime};

use crate::codec::{parse_int, Writer};
use crate::commands::{Request, ERR_INVALID_EXPIRE_TIME, ERR_SYNTAX, ERR_VALUE_NOT_INTEGER};
use crate::server::Server;
use crate::store::SetOptions;

/// `SET key value [NX|XX] [EX s|PX ms|EXAT ts|PXAT ts-ms] [KEEPTTL] [GET]`.
///
/// NX and XX are mutually exclusive, as are KEEPTTL and any explicit expiry.
/// With GET the reply is the previous value (or null) instead of OK; a
/// failed NX/XX condition replies null.
///
/// Ref: <https://redis.io/docs/latest/commands/set>
pub fn apply(server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let now = server.now();

    let mut opts = SetOptions::default();
    let mut return_old = false;

    let mut i = 3;
    while i < req.args.len() {
        let opt = req.arg(i).to_ascii_uppercase();
        match opt.as_slice() {
            b"NX" => {
                if opts.nx || opts.xx {
                    w.write_error(ERR_SYNTAX);
                    return Ok(());
                }
                opts.nx = true;
            }
            b"XX" => {
                if opts.nx || opts.xx {
                    w.write_error(ERR_SYNTAX);
                    return Ok(());
                }
                opts.xx = true;
            }
            b"KEEPTTL" => {
                if opts.keep_ttl || opts.expire_at.is_some() {
                    w.write_error(ERR_SYNTAX);
                    return Ok(());
                }
                opts.keep_ttl = true;
            }
            b"EX" | b"PX" | b"EXAT" | b"PXAT" => {
                if opts.expire_at.is_some() || opts.keep_ttl {
                    w.write_error(ERR_SYNTAX);
                    return Ok(());
                }
                i += 1;
                if i >= req.args.len() {
                    w.write_error(ERR_SYNTAX);
                    return Ok(());
                }
                let n = match parse_int(req.arg(i)) {
                    Some(n) => n,
                    None => {
                        w.write_error(ERR_VALUE_NOT_INTEGER);
                        return Ok(());
                    }
                };
                if n <= 0 {
                    w.write_error(ERR_INVALID_EXPIRE_TIME);
                    return Ok(());
                }
                // A deadline that overflows SystemTime is rejected, not
                // panicked on.
                opts.expire_at = match expire_at(now, &opt, n as u64) {
                    Some(at) => Some(at),
                    None => {
                        w.write_error(ERR_INVALID_EXPIRE_TIME);
                        return Ok(());
                    }
                };
            }
            b"GET" => {
                if return_old {
                    w.write_error(ERR_SYNTAX);
                    return Ok(());
                }
                return_old = true;
            }
            _ => {
                w.write_error(ERR_SYNTAX);
                return Ok(());
            }
        }
        i += 1;
    }

    let store = server.keyspace_for(req.session);
    let result = store.set_string_with_options(now, req.arg(1), req.arg_bytes(2), &opts);

    if !result.stored {
        w.write_null();
    } else if return_old {
        w.write_opt_bulk(result.previous.as_deref());
    } else {
        w.write_simple("OK");
    }
    Ok(())
}

fn expire_at(now: SystemTime, opt: &[u8], n: u64) -> Option<SystemTime> {
    match opt {
        b"EX" => now.checked_add(Duration::from_secs(n)),
        b"PX" => now.checked_add(Duration::from_millis(n)),
        b"EXAT" => SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs(n)),
        b"PXAT" => SystemTime::UNIX_EPOCH.checked_add(Duration::from_millis(n)),
        _ => unreachable!("callers only pass expiry options"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use crate::commands::tests_support::{base, exec, server};

    #[test]
    fn plain_set() {
        let server = server();
        assert_eq!(exec(&server, &["SET", "k", "v"]), b"+OK\r\n");
        assert_eq!(exec(&server, &["GET", "k"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn nx_and_xx_conditions() {
        let server = server();

        assert_eq!(exec(&server, &["SET", "k", "v1", "NX"]), b"+OK\r\n");
        // Second NX fails and leaves v1 in place.
        assert_eq!(exec(&server, &["SET", "k", "v2", "NX"]), b"$-1\r\n");
        assert_eq!(exec(&server, &["GET", "k"]), b"$2\r\nv1\r\n");

        // XX on an absent key is a no-op.
        assert_eq!(exec(&server, &["SET", "other", "v", "XX"]), b"$-1\r\n");
        assert_eq!(exec(&server, &["GET", "other"]), b"$-1\r\n");
        assert_eq!(exec(&server, &["SET", "k", "v3", "XX"]), b"+OK\r\n");
    }

    #[test]
    fn ex_sets_ttl() {
        let server = server();
        assert_eq!(exec(&server, &["SET", "k", "v", "EX", "5"]), b"+OK\r\n");
        assert_eq!(exec(&server, &["TTL", "k"]), b":5\r\n");

        server.clock().advance(Duration::from_secs(6));
        assert_eq!(exec(&server, &["GET", "k"]), b"$-1\r\n");
        assert_eq!(exec(&server, &["TTL", "k"]), b":-2\r\n");
    }

    #[test]
    fn px_exat_pxat_set_ttl() {
        let server = server();
        let epoch_secs = base()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        exec(&server, &["SET", "a", "v", "PX", "2500"]);
        assert_eq!(exec(&server, &["TTL", "a"]), b":2\r\n");

        exec(&server, &["SET", "b", "v", "EXAT", &(epoch_secs + 10).to_string()]);
        assert_eq!(exec(&server, &["TTL", "b"]), b":10\r\n");

        exec(
            &server,
            &["SET", "c", "v", "PXAT", &((epoch_secs + 4) * 1000).to_string()],
        );
        assert_eq!(exec(&server, &["TTL", "c"]), b":4\r\n");
    }

    #[test]
    fn keep_ttl_preserves_expiry() {
        let server = server();
        exec(&server, &["SET", "k", "v1", "EX", "10"]);
        assert_eq!(exec(&server, &["SET", "k", "v2", "KEEPTTL"]), b"+OK\r\n");
        assert_eq!(exec(&server, &["GET", "k"]), b"$2\r\nv2\r\n");
        assert_eq!(exec(&server, &["TTL", "k"]), b":10\r\n");

        // Without KEEPTTL a plain SET clears the TTL.
        assert_eq!(exec(&server, &["SET", "k", "v3"]), b"+OK\r\n");
        assert_eq!(exec(&server, &["TTL", "k"]), b":-1\r\n");
    }

    #[test]
    fn get_option_returns_previous_value() {
        let server = server();
        assert_eq!(exec(&server, &["SET", "k", "v1", "GET"]), b"$-1\r\n");
        assert_eq!(exec(&server, &["SET", "k", "v2", "GET"]), b"$2\r\nv1\r\n");
        assert_eq!(exec(&server, &["GET", "k"]), b"$2\r\nv2\r\n");
    }

    #[test]
    fn option_conflicts_are_syntax_errors() {
        let server = server();
        let err: &[u8] = b"-ERR syntax error\r\n";

        assert_eq!(exec(&server, &["SET", "k", "v", "NX", "XX"]), err);
        assert_eq!(exec(&server, &["SET", "k", "v", "XX", "NX"]), err);
        assert_eq!(exec(&server, &["SET", "k", "v", "KEEPTTL", "EX", "5"]), err);
        assert_eq!(exec(&server, &["SET", "k", "v", "EX", "5", "KEEPTTL"]), err);
        assert_eq!(exec(&server, &["SET", "k", "v", "EX", "5", "PX", "5"]), err);
        assert_eq!(exec(&server, &["SET", "k", "v", "GET", "GET"]), err);
        assert_eq!(exec(&server, &["SET", "k", "v", "BOGUS"]), err);
        // Expiry option with no value to consume.
        assert_eq!(exec(&server, &["SET", "k", "v", "EX"]), err);
    }

    #[test]
    fn expiry_argument_validation() {
        let server = server();
        assert_eq!(
            exec(&server, &["SET", "k", "v", "EX", "ten"]),
            b"-ERR value is not an integer or out of range\r\n"
        );
        assert_eq!(
            exec(&server, &["SET", "k", "v", "EX", "+5"]),
            b"-ERR value is not an integer or out of range\r\n"
        );
        assert_eq!(
            exec(&server, &["SET", "k", "v", "EX", "0"]),
            b"-ERR invalid expire time in set\r\n"
        );
        assert_eq!(
            exec(&server, &["SET", "k", "v", "PX", "-10"]),
            b"-ERR invalid expire time in set\r\n"
        );
    }

    #[test]
    fn overflowing_expiry_is_rejected_not_panicked() {
        let server = server();
        let max = i64::MAX.to_string();

        // Seconds-based deadlines near i64::MAX do not fit in SystemTime.
        for opt in ["EX", "EXAT"] {
            assert_eq!(
                exec(&server, &["SET", "k", "v", opt, &max]),
                b"-ERR invalid expire time in set\r\n",
                "{opt} must reject a deadline past the end of SystemTime"
            );
        }
        // A failed SET leaves the keyspace untouched.
        assert_eq!(exec(&server, &["GET", "k"]), b"$-1\r\n");

        // Millisecond deadlines of the same magnitude are representable;
        // they just land absurdly far in the future.
        assert_eq!(exec(&server, &["SET", "k", "v", "PX", &max]), b"+OK\r\n");
        assert_eq!(exec(&server, &["GET", "k"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn options_are_case_insensitive() {
        let server = server();
        assert_eq!(exec(&server, &["SET", "k", "v", "nx", "ex", "5"]), b"+OK\r\n");
        assert_eq!(exec(&server, &["TTL", "k"]), b":5\r\n");
    }
}
