use crate::codec::Writer;
use crate::commands::Request;
use crate::server::Server;

/// Removes the specified keys, replying with how many actually existed.
///
/// Ref: <https://redis.io/docs/latest/commands/del>
pub fn apply(server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let store = server.keyspace_for(req.session);
    let keys: Vec<&[u8]> = (1..req.args.len()).map(|i| req.arg(i)).collect();
    w.write_int(store.del(&keys) as i64);
    Ok(())
}
