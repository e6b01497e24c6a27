use crate::codec::Writer;
use crate::commands::Request;
use crate::server::Server;

/// Returns PONG when called with no argument, otherwise echoes the argument
/// back as a bulk string.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
pub fn apply(_server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    match req.args.len() {
        1 => w.write_simple("PONG"),
        _ => w.write_opt_bulk(req.args[1].as_deref()),
    }
    Ok(())
}
