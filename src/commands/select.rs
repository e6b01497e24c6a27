use crate::codec::{parse_int, Writer};
use crate::commands::{Request, ERR_VALUE_NOT_INTEGER};
use crate::server::Server;

const ERR_DB_INDEX: &str = "ERR DB index is out of range";

/// Number of logical databases, matching the Redis `databases 16` default.
const DATABASES: i64 = 16;

/// Switches the connection to another logical database. Keyspaces are
/// created lazily on first use, so selecting an untouched index is free.
///
/// Ref: <https://redis.io/docs/latest/commands/select>
pub fn apply(_server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let index = match parse_int(req.arg(1)) {
        Some(index) => index,
        None => {
            w.write_error(ERR_VALUE_NOT_INTEGER);
            return Ok(());
        }
    };
    if !(0..DATABASES).contains(&index) {
        w.write_error(ERR_DB_INDEX);
        return Ok(());
    }

    req.session.selected_db = index as usize;
    w.write_simple("OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::commands::tests_support::{exec_in, server};
    use crate::session::Session;

    #[test]
    fn keyspaces_are_independent() {
        let server = server();
        let mut session = Session::new();

        exec_in(&server, &mut session, &["SET", "k", "db0"]);

        assert_eq!(exec_in(&server, &mut session, &["SELECT", "1"]), b"+OK\r\n");
        assert_eq!(session.selected_db, 1);
        assert_eq!(exec_in(&server, &mut session, &["GET", "k"]), b"$-1\r\n");

        exec_in(&server, &mut session, &["SET", "k", "db1"]);
        exec_in(&server, &mut session, &["SELECT", "0"]);
        assert_eq!(
            exec_in(&server, &mut session, &["GET", "k"]),
            b"$3\r\ndb0\r\n"
        );
    }

    #[test]
    fn index_validation() {
        let server = server();
        let mut session = Session::new();

        assert_eq!(
            exec_in(&server, &mut session, &["SELECT", "16"]),
            b"-ERR DB index is out of range\r\n"
        );
        assert_eq!(
            exec_in(&server, &mut session, &["SELECT", "-1"]),
            b"-ERR DB index is out of range\r\n"
        );
        assert_eq!(
            exec_in(&server, &mut session, &["SELECT", "one"]),
            b"-ERR value is not an integer or out of range\r\n"
        );
        assert_eq!(session.selected_db, 0, "failed SELECT must not switch");
    }
}
