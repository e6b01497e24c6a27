use std::time::SystemTime;

use crate::codec::Writer;
use crate::commands::{Request, ERR_UNKNOWN_SECTION};
use crate::server::Server;
use crate::store::Stats;

/// `INFO [section]` with sections server / memory / keyspace / replication,
/// plus all / default (server + memory + keyspace). Unknown sections are an
/// error, matching Redis/Valkey.
///
/// Ref: <https://redis.io/docs/latest/commands/info>
pub fn apply(server: &Server, w: &mut Writer, req: &mut Request) -> crate::Result<()> {
    let section = if req.args.len() == 2 {
        String::from_utf8_lossy(req.arg(1)).to_lowercase()
    } else {
        "default".to_string()
    };

    let now = server.now();
    match build_info(server, &section, now) {
        Some(text) => w.write_bulk(text.as_bytes()),
        None => w.write_error(ERR_UNKNOWN_SECTION),
    }
    Ok(())
}

fn build_info(server: &Server, section: &str, now: SystemTime) -> Option<String> {
    match section {
        "all" | "default" => Some(format!(
            "{}{}{}",
            info_server(server, now),
            info_memory(server, now),
            info_keyspace(server, now)
        )),
        "server" => Some(info_server(server, now)),
        "memory" => Some(info_memory(server, now)),
        "keyspace" => Some(info_keyspace(server, now)),
        "replication" => Some(info_replication()),
        _ => None,
    }
}

fn info_server(server: &Server, now: SystemTime) -> String {
    let unix_secs = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!(
        "# Server\r\n\
         server:valkey\r\n\
         version:0.0.0\r\n\
         proto:2\r\n\
         process_id:1\r\n\
         uptime_in_seconds:{}\r\n\
         mode:standalone\r\n\
         role:master\r\n\
         time_now:{}\r\n\r\n",
        server.uptime_secs(now),
        unix_secs
    )
}

fn info_memory(server: &Server, now: SystemTime) -> String {
    // No byte accounting; expose key counts as the hint instead.
    let (keys, expires) = server
        .keyspace_stats(now)
        .iter()
        .fold((0, 0), |(k, e), (_, s)| (k + s.keys, e + s.expires));
    format!("# Memory\r\nused_memory_keys:{keys}\r\nexpires:{expires}\r\n\r\n")
}

fn info_keyspace(server: &Server, now: SystemTime) -> String {
    let mut text = String::from("# Keyspace\r\n");
    // Like Redis, only non-empty databases get a line.
    for (index, Stats { keys, expires, avg_ttl_ms }) in server.keyspace_stats(now) {
        if keys > 0 {
            text.push_str(&format!(
                "db{index}:keys={keys},expires={expires},avg_ttl={avg_ttl_ms}\r\n"
            ));
        }
    }
    text.push_str("\r\n");
    text
}

fn info_replication() -> String {
    // Master-only, no backlog. Enough for clients probing replication.
    "# Replication\r\n\
     role:master\r\n\
     connected_slaves:0\r\n\
     master_replid:0000000000000000000000000000000000000000\r\n\
     master_replid2:0000000000000000000000000000000000000000\r\n\
     master_repl_offset:0\r\n\
     second_repl_offset:-1\r\n\
     repl_backlog_active:0\r\n\r\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::commands::tests_support::{exec, exec_in, server};
    use crate::session::Session;

    fn bulk_text(reply: &[u8]) -> String {
        // $<len>\r\n<text>\r\n
        let reply = String::from_utf8_lossy(reply).to_string();
        let body = reply.split_once("\r\n").unwrap().1;
        body.strip_suffix("\r\n").unwrap().to_string()
    }

    #[test]
    fn server_section() {
        let server = server();
        server.clock().advance(Duration::from_secs(30));

        let text = bulk_text(&exec(&server, &["INFO", "server"]));
        assert!(text.starts_with("# Server\r\n"));
        assert!(text.contains("server:valkey\r\n"));
        assert!(text.contains("proto:2\r\n"));
        assert!(text.contains("uptime_in_seconds:30\r\n"));
    }

    #[test]
    fn default_concatenates_sections() {
        let server = server();
        let text = bulk_text(&exec(&server, &["INFO"]));
        assert!(text.contains("# Server\r\n"));
        assert!(text.contains("# Memory\r\n"));
        assert!(text.contains("# Keyspace\r\n"));
        assert!(!text.contains("# Replication"));
    }

    #[test]
    fn keyspace_lists_non_empty_databases() {
        let server = server();
        let mut session = Session::new();

        exec_in(&server, &mut session, &["SET", "a", "1"]);
        exec_in(&server, &mut session, &["SET", "b", "2", "EX", "10"]);
        exec_in(&server, &mut session, &["SELECT", "3"]);
        exec_in(&server, &mut session, &["SET", "c", "3"]);

        let text = bulk_text(&exec(&server, &["INFO", "keyspace"]));
        assert!(text.contains("db0:keys=2,expires=1,avg_ttl=10000\r\n"));
        assert!(text.contains("db3:keys=1,expires=0,avg_ttl=0\r\n"));
        assert!(!text.contains("db1:"));
    }

    #[test]
    fn empty_keyspace_has_no_db_lines() {
        let server = server();
        let text = bulk_text(&exec(&server, &["INFO", "keyspace"]));
        // The section still ends with its blank separator line.
        assert_eq!(text, "# Keyspace\r\n\r\n");
    }

    #[test]
    fn replication_section() {
        let server = server();
        let text = bulk_text(&exec(&server, &["INFO", "replication"]));
        assert!(text.contains("role:master\r\n"));
        assert!(text.contains("connected_slaves:0\r\n"));
        // Offsets come before the backlog flag.
        let offset = text.find("master_repl_offset:0").unwrap();
        let second = text.find("second_repl_offset:-1").unwrap();
        let backlog = text.find("repl_backlog_active:0").unwrap();
        assert!(offset < second && second < backlog);
    }

    #[test]
    fn unknown_section_is_an_error() {
        let server = server();
        assert_eq!(
            exec(&server, &["INFO", "bogus"]),
            b"-ERR unknown section\r\n"
        );
    }
}
