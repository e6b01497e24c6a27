use crate::codec::{parse_int, Writer};
use crate::commands::{Request, ERR_VALUE_NOT_INTEGER};
use crate::server::Server;

/// Sets a timeout in seconds on a key; negative seconds clear the timeout
/// (persist). Replies 1 when the key exists, 0 otherwise.
///
/// Ref: <https://redis.io/docs/latest/commands/expire>
pub fn apply(server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let secs = match parse_int(req.arg(2)) {
        Some(secs) => secs,
        None => {
            w.write_error(ERR_VALUE_NOT_INTEGER);
            return Ok(());
        }
    };

    let store = server.keyspace_for(req.session);
    let updated = store.expire(server.now(), req.arg(1), secs);
    w.write_int(i64::from(updated));
    Ok(())
}
