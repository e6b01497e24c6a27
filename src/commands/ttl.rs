use crate::codec::Writer;
use crate::commands::Request;
use crate::server::Server;

/// Remaining time to live of a key in whole seconds; -1 when the key has no
/// timeout, -2 when it does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/ttl>
pub fn apply(server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let store = server.keyspace_for(req.session);
    w.write_int(store.ttl(server.now(), req.arg(1)));
    Ok(())
}
