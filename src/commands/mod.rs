pub mod del;
pub mod exists;
pub mod expire;
pub mod get;
pub mod hello;
pub mod info;
pub mod ping;
pub mod select;
pub mod set;
pub mod ttl;

use std::collections::HashMap;

use bytes::Bytes;

use crate::codec::Writer;
use crate::server::Server;
use crate::session::Session;

pub(crate) const ERR_EMPTY_COMMAND: &str = "ERR empty command";
pub(crate) const ERR_SYNTAX: &str = "ERR syntax error";
pub(crate) const ERR_VALUE_NOT_INTEGER: &str = "ERR value is not an integer or out of range";
pub(crate) const ERR_INVALID_EXPIRE_TIME: &str = "ERR invalid expire time in set";
pub(crate) const ERR_UNKNOWN_SECTION: &str = "ERR unknown section";

/// One parsed client command plus the connection state it runs against.
/// `args[0]` is the command word; a null array element reads as an empty
/// string through `arg`.
pub struct Request<'a> {
    /// Canonical (upper-cased) command name.
    pub name: String,
    pub args: Vec<Option<Bytes>>,
    pub session: &'a mut Session,
}

impl Request<'_> {
    pub fn arg(&self, i: usize) -> &[u8] {
        self.args
            .get(i)
            .and_then(|a| a.as_deref())
            .unwrap_or_default()
    }

    /// Owned copy of an argument, cheap for bulk payloads.
    pub fn arg_bytes(&self, i: usize) -> Bytes {
        self.args
            .get(i)
            .and_then(|a| a.clone())
            .unwrap_or_default()
    }
}

/// Handlers write every user-facing outcome (including command errors) to
/// the reply writer and return `Ok`; an `Err` is reserved for engine-level
/// failures that abort the connection.
pub type Handler = fn(&Server, &mut Writer, &mut Request) -> crate::Result<()>;

/// Arity constraints, counted over the full argv including the command word.
#[derive(Clone, Copy, Debug)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl Arity {
    fn holds(&self, argc: usize) -> bool {
        match *self {
            Arity::Exact(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
            Arity::AtMost(n) => argc <= n,
        }
    }
}

/// Checks all arity constraints for a request, producing the standard
/// wrong-number-of-arguments error on the first violation.
pub fn validate(req: &Request, arity: &[Arity]) -> Result<(), String> {
    for a in arity {
        if !a.holds(req.args.len()) {
            return Err(wrong_number_of_args(&req.name));
        }
    }
    Ok(())
}

pub(crate) fn wrong_number_of_args(name: &str) -> String {
    format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_lowercase()
    )
}

/// Unknown-command error echoing up to the first 20 arguments.
pub(crate) fn unknown_command(name: &str, args: &[Option<Bytes>]) -> String {
    let mut msg = format!("ERR unknown command `{name}`, with args beginning with: ");
    for arg in args.iter().skip(1).take(20) {
        let arg = arg.as_deref().unwrap_or_default();
        msg.push_str(&format!("`{}`, ", String::from_utf8_lossy(arg)));
    }
    msg
}

pub struct CommandSpec {
    pub arity: &'static [Arity],
    pub handler: Handler,
}

/// Name -> handler table, assembled once at server construction. String
/// dispatch happens against this table; registering the same name twice is
/// a construction-time bug and fails fast.
pub struct Registry {
    table: HashMap<&'static str, CommandSpec>,
}

impl Registry {
    pub fn build() -> crate::Result<Registry> {
        let mut registry = Registry {
            table: HashMap::new(),
        };

        registry.register("PING", &[Arity::AtMost(2)], ping::apply)?;
        registry.register("SET", &[Arity::AtLeast(3)], set::apply)?;
        registry.register("GET", &[Arity::Exact(2)], get::apply)?;
        registry.register("DEL", &[Arity::AtLeast(2)], del::apply)?;
        registry.register("EXISTS", &[Arity::AtLeast(2)], exists::apply)?;
        registry.register("EXPIRE", &[Arity::Exact(3)], expire::apply)?;
        registry.register("TTL", &[Arity::Exact(2)], ttl::apply)?;
        registry.register("HELLO", &[Arity::AtMost(2)], hello::apply)?;
        registry.register("INFO", &[Arity::AtMost(2)], info::apply)?;
        registry.register("SELECT", &[Arity::Exact(2)], select::apply)?;

        Ok(registry)
    }

    fn register(
        &mut self,
        name: &'static str,
        arity: &'static [Arity],
        handler: Handler,
    ) -> crate::Result<()> {
        if self
            .table
            .insert(name, CommandSpec { arity, handler })
            .is_some()
        {
            return Err(format!("duplicate command registration: {name}").into());
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.table.get(name)
    }
}
