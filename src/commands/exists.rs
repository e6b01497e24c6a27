use crate::codec::Writer;
use crate::commands::Request;
use crate::server::Server;

/// Counts how many of the given keys exist and are not expired.
///
/// Ref: <https://redis.io/docs/latest/commands/exists>
pub fn apply(server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let store = server.keyspace_for(req.session);
    let keys: Vec<&[u8]> = (1..req.args.len()).map(|i| req.arg(i)).collect();
    w.write_int(store.exists(server.now(), &keys) as i64);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::commands::tests_support::{exec, server};

    #[test]
    fn counts_live_keys() {
        let server = server();
        exec(&server, &["SET", "a", "1"]);
        exec(&server, &["SET", "b", "2"]);

        assert_eq!(exec(&server, &["EXISTS", "a"]), b":1\r\n");
        assert_eq!(exec(&server, &["EXISTS", "a", "b", "missing", "a"]), b":3\r\n");
        assert_eq!(exec(&server, &["EXISTS", "missing"]), b":0\r\n");
    }
}
