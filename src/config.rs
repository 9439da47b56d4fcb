// config.rs — Compile-time defaults and protocol limits.

/// 1 KiB
pub const KB: u64 = 1 << 10;
/// 1 MiB
pub const MB: u64 = 1 << 20;

/// Protocol version token exchanged on connect. A client whose first frame
/// does not byte-equal this string is rejected with `compatible-version=`.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage file extension appended to the database name.
pub const STORAGE_EXTENSION: &str = ".raptodb";

/// Upper bound for a single wire frame payload: 512 MiB.
pub const FRAME_MAX: u64 = 512 * MB;

/// Default per-frame socket read/write deadline, milliseconds.
pub const SOCKET_DEADLINE_MS: u64 = 5000;

/// Default listen port when `--tls` is set and no address is given.
pub const TLS_DEFAULT_PORT: u16 = 8443;

/// Ephemeral port range used when no address is given: `10000..19999`.
pub const EPHEMERAL_PORT_RANGE: std::ops::Range<u16> = 10000..19999;

/// Maximum key length in bytes.
pub const KEY_LEN_MAX: usize = 255;

/// Maximum string payload length in bytes.
pub const STRING_LEN_MAX: u64 = u32::MAX as u64;

/// Worst-case expansion factor used by the snapshot admission gate: a
/// compressed frame of `len` bytes is rejected when `len * 255` would not
/// fit in the remaining store capacity.
pub const EXPANSION_BOUND: u64 = 255;

/// Autosnap worker tick interval, seconds.
pub const AUTOSNAP_TICK_SECS: u64 = 1;
