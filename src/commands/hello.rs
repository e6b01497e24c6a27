use crate::codec::Writer;
use crate::commands::Request;
use crate::server::Server;

/// Handshake. Accepts `HELLO`, `HELLO 2`, and `HELLO 3` but always serves
/// RESP2: the reply is the fixed capability map encoded as a 14-element
/// alternating key/value array, never a RESP3 upgrade.
///
/// Ref: <https://redis.io/docs/latest/commands/hello>
pub fn apply(_server: &Server, w: &mut Writer, _req: &mut Request) -> crate::Result<()> {
    w.write_array_header(14);
    w.write_bulk(b"server");
    w.write_bulk(b"valkey");
    w.write_bulk(b"version");
    w.write_bulk(b"0.0.0");
    w.write_bulk(b"proto");
    w.write_int(2);
    w.write_bulk(b"id");
    w.write_int(1);
    w.write_bulk(b"mode");
    w.write_bulk(b"standalone");
    w.write_bulk(b"role");
    w.write_bulk(b"master");
    w.write_bulk(b"modules");
    w.write_empty_array();
    Ok(())
}
