// End-to-end scenarios over real sockets: one server per test on an
// ephemeral loopback port, driven through the client connector.

use rapto::config::PROTOCOL_VERSION;
use rapto::net::{frame, ConnectOptions, Connection, NetError};
use rapto::server::{Server, ServerConfig};
use rapto::snapshot::autosnap::AutosnapConfig;
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use tempfile::TempDir;

fn start_server(
    dir: &TempDir,
    name: &str,
    tls: bool,
    auth: Option<&str>,
    save: Option<AutosnapConfig>,
) -> (SocketAddr, JoinHandle<()>) {
    let mut cfg = ServerConfig::new(name);
    cfg.db_path = dir.path().to_string_lossy().into_owned();
    cfg.db_size = Some(1 << 20);
    cfg.addr = Some("127.0.0.1:0".parse().unwrap());
    cfg.tls = tls;
    cfg.auth = auth.map(|p| p.as_bytes().to_vec());
    cfg.save = save;
    let server = Server::bind(cfg).expect("bind");
    let addr = server.local_addr();
    let handle = thread::spawn(move || server.run().expect("run"));
    (addr, handle)
}

fn connect(addr: SocketAddr) -> Connection {
    Connection::connect(
        addr,
        ConnectOptions {
            name: "e2e".into(),
            ..ConnectOptions::default()
        },
    )
    .expect("connect")
}

fn shutdown(mut conn: Connection, handle: JoinHandle<()>) {
    conn.send("DOWN").expect("send DOWN");
    handle.join().expect("clean shutdown");
}

#[test]
fn string_scenario() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "strings", false, None, None);
    let mut conn = connect(addr);

    assert_eq!(conn.query_str("SSET name Alice").unwrap(), "OK");
    assert_eq!(conn.query_str("GET name").unwrap(), "\"Alice\"");
    assert_eq!(conn.query_str("TYPE name").unwrap(), "string");
    assert_eq!(conn.query_str("LEN name").unwrap(), "5");

    shutdown(conn, handle);
}

#[test]
fn integer_update_scenario() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "ints", false, None, None);
    let mut conn = connect(addr);

    assert_eq!(conn.query_str("ISET x 10").unwrap(), "OK");
    assert_eq!(conn.query_str("UPDATE x 3").unwrap(), "OK");
    assert_eq!(conn.query_str("GET x").unwrap(), "13");
    assert_eq!(
        conn.query_str("UPDATE x 0.5").unwrap(),
        "ERR: incompatible types"
    );

    shutdown(conn, handle);
}

#[test]
fn decimal_scenario() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "decs", false, None, None);
    let mut conn = connect(addr);

    assert_eq!(conn.query_str("DSET y 1.0").unwrap(), "OK");
    assert_eq!(conn.query_str("GET y").unwrap(), "1.0");
    assert_eq!(conn.query_str("UPDATE y 0.5").unwrap(), "OK");
    assert_eq!(conn.query_str("GET y").unwrap(), "1.5");

    shutdown(conn, handle);
}

#[test]
fn promotion_is_visible_in_list_order() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "lru", false, None, None);
    let mut conn = connect(addr);

    conn.query_str("ISET a 1").unwrap();
    conn.query_str("ISET b 2").unwrap();
    conn.query_str("ISET c 3").unwrap();
    assert_eq!(conn.query_str("LIST").unwrap(), "c b a");
    assert_eq!(conn.query_str("GET a").unwrap(), "1");
    assert_eq!(conn.query_str("LIST").unwrap(), "c a b");

    shutdown(conn, handle);
}

#[test]
fn snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();

    let (addr, handle) = start_server(&dir, "persist", false, None, None);
    let mut conn = connect(addr);
    assert_eq!(conn.query_str("ISET k 1").unwrap(), "OK");
    assert_eq!(conn.query_str("SAVE").unwrap(), "OK");
    shutdown(conn, handle);

    // Same file, same capacity: the object must come back.
    let (addr, handle) = start_server(&dir, "persist", false, None, None);
    let mut conn = connect(addr);
    assert_eq!(conn.query_str("GET k").unwrap(), "1");
    assert_eq!(conn.query_str("COUNT").unwrap(), "1");
    shutdown(conn, handle);
}

#[test]
fn down_snapshots_before_stopping() {
    let dir = TempDir::new().unwrap();

    let (addr, handle) = start_server(&dir, "downsnap", false, None, None);
    let mut conn = connect(addr);
    // No explicit SAVE: DOWN alone must persist the object.
    assert_eq!(conn.query_str("ISET survives 9").unwrap(), "OK");
    shutdown(conn, handle);

    let (addr, handle) = start_server(&dir, "downsnap", false, None, None);
    let mut conn = connect(addr);
    assert_eq!(conn.query_str("GET survives").unwrap(), "9");
    shutdown(conn, handle);
}

#[test]
fn encrypted_session_round_trips() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "sealed", true, None, None);
    let mut conn = Connection::connect(
        addr,
        ConnectOptions {
            name: "e2e".into(),
            tls: true,
            ..ConnectOptions::default()
        },
    )
    .expect("tls connect");

    assert_eq!(conn.query_str("PING").unwrap(), "pong");
    assert_eq!(conn.query_str("SSET secret value").unwrap(), "OK");
    assert_eq!(conn.query_str("GET secret").unwrap(), "\"value\"");

    shutdown(conn, handle);
}

#[test]
fn auth_gates_the_command_loop() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "guarded", true, Some("pw"), None);

    // Wrong password: rejected before the command loop.
    let denied = Connection::connect(
        addr,
        ConnectOptions {
            name: "e2e".into(),
            tls: true,
            password: Some(b"nope".to_vec()),
            ..ConnectOptions::default()
        },
    );
    assert!(matches!(denied, Err(NetError::AuthFail)));

    // Correct password proceeds to the command loop.
    let mut conn = Connection::connect(
        addr,
        ConnectOptions {
            name: "e2e".into(),
            tls: true,
            password: Some(b"pw".to_vec()),
            ..ConnectOptions::default()
        },
    )
    .expect("authed connect");
    assert_eq!(conn.query_str("PING").unwrap(), "pong");

    shutdown(conn, handle);
}

#[test]
fn version_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "versioned", false, None, None);

    let mut raw = TcpStream::connect(addr).unwrap();
    frame::write_frame(&mut raw, b"0.0.1").unwrap();
    let reply = frame::read_frame(&mut raw).unwrap();
    assert_eq!(
        reply,
        format!("compatible-version={PROTOCOL_VERSION}").into_bytes()
    );
    drop(raw);

    let conn = connect(addr);
    shutdown(conn, handle);
}

#[test]
fn resolver_errors_do_not_close_the_session() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "errors", false, None, None);
    let mut conn = connect(addr);

    assert_eq!(conn.query_str("GET ghost").unwrap(), "ERR: key not found");
    assert_eq!(
        conn.query_str("WHATEVER").unwrap(),
        "ERR: command does not exist"
    );
    assert_eq!(conn.query_str("LIST").unwrap(), "ERR: no keys found.");
    // The session is still usable afterwards.
    assert_eq!(conn.query_str("PING").unwrap(), "pong");

    shutdown(conn, handle);
}

#[test]
fn dump_restore_across_the_wire() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(&dir, "dumpwire", false, None, None);
    let mut conn = connect(addr);

    conn.query_str("SSET k payload").unwrap();
    let dumped = conn.query("DUMP k").unwrap();
    conn.query_str("DEL k").unwrap();

    let mut line = b"RESTORE ".to_vec();
    line.extend_from_slice(&dumped);
    assert_eq!(conn.query(&line).unwrap(), b"OK");
    assert_eq!(conn.query_str("GET k").unwrap(), "\"payload\"");

    shutdown(conn, handle);
}

#[test]
fn autosnap_persists_without_explicit_save() {
    let dir = TempDir::new().unwrap();
    let (addr, handle) = start_server(
        &dir,
        "autosnap",
        false,
        None,
        Some(AutosnapConfig::new(1, 1)),
    );
    let mut conn = connect(addr);

    assert_eq!(conn.query_str("ISET k 5").unwrap(), "OK");
    // Delay 1s, one modification: the worker fires on a subsequent tick.
    thread::sleep(std::time::Duration::from_millis(2500));

    let snapshot = rapto::server::storage_path(&dir.path().to_string_lossy(), "autosnap");
    let size = std::fs::metadata(&snapshot).unwrap().len();
    assert!(size > 0, "autosnap should have written frames");

    shutdown(conn, handle);
}
