use crate::codec::Writer;
use crate::commands::Request;
use crate::server::Server;

/// Get the value of `key`; null when the key does not exist (or has
/// expired).
///
/// Ref: <https://redis.io/docs/latest/commands/get>
pub fn apply(server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let store = server.keyspace_for(req.session);
    match store.get_string(server.now(), req.arg(1)) {
        Some(value) => w.write_bulk(&value),
        None => w.write_null(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::commands::tests_support::{exec, server};

    #[test]
    fn existing_key() {
        let server = server();
        exec(&server, &["SET", "key1", "1"]);
        assert_eq!(exec(&server, &["GET", "key1"]), b"$1\r\n1\r\n");
    }

    #[test]
    fn missing_key() {
        let server = server();
        assert_eq!(exec(&server, &["GET", "nope"]), b"$-1\r\n");
    }

    #[test]
    fn wrong_arity() {
        let server = server();
        assert_eq!(
            exec(&server, &["GET"]),
            b"-ERR wrong number of arguments for 'get' command\r\n"
        );
        assert_eq!(
            exec(&server, &["GET", "a", "b"]),
            b"-ERR wrong number of arguments for 'get' command\r\n"
        );
    }
}
