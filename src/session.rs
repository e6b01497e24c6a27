/// Per-connection state. Created when a connection is accepted, owned by
/// that connection's task, dropped when the connection closes.
#[derive(Debug)]
pub struct Session {
    /// Index of the keyspace commands operate on; SELECT changes it.
    pub selected_db: usize,
}

impl Session {
    pub fn new() -> Session {
        Session { selected_db: 0 }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
