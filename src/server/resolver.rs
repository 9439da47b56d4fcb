//! Query parsing and command dispatch.
//!
//! A query line is the upper-cased command token before the first space plus
//! the remainder verbatim. Dispatch runs on the executor thread against the
//! store it owns; every error maps to a fixed `ERR: <phrase>` response and
//! never closes the session.

use crate::object::codec::{deserialize, serialize};
use crate::object::{now_micros, Field};
use crate::snapshot;
use crate::store::{Store, StoreError};
use std::fmt;
use std::path::Path;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Resolver failures, one per user-visible error phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    UnknownCommand,
    EmptyQuery,
    MissingTokens,
    MismatchType,
    TypeOverflow,
    KeyNotFound,
    KeyReplacementExist,
    SaveFailed,
    InvalidObject,
    InvalidMetadata,
    NoKeysFound,
    UnknownArgument,
    ExceededSpaceLimit,
}

impl QueryError {
    /// The fixed phrase carried in the `ERR:` response.
    pub fn phrase(&self) -> &'static str {
        match self {
            QueryError::UnknownCommand => "command does not exist",
            QueryError::EmptyQuery => "empty query",
            QueryError::MissingTokens => "tokens missing",
            QueryError::MismatchType => "incompatible types",
            QueryError::TypeOverflow => "value too large for type",
            QueryError::KeyNotFound => "key not found",
            QueryError::KeyReplacementExist => "new name correspond to existent key",
            QueryError::SaveFailed => "persistent saving is failed",
            QueryError::InvalidObject => "serialized object is invalid.",
            QueryError::InvalidMetadata => "metadata is corrupted.",
            QueryError::NoKeysFound => "no keys found.",
            QueryError::UnknownArgument => "invalid argument.",
            QueryError::ExceededSpaceLimit => "excedeed db space limit.",
        }
    }

    /// Full response payload for this error.
    pub fn response(&self) -> Vec<u8> {
        format!("ERR: {}", self.phrase()).into_bytes()
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

impl std::error::Error for QueryError {}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ExceededSpaceLimit => QueryError::ExceededSpaceLimit,
            StoreError::KeyNotFound => QueryError::KeyNotFound,
            StoreError::KeyReplacementExist => QueryError::KeyReplacementExist,
            StoreError::TypeOverflow => QueryError::TypeOverflow,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a successful resolution.
pub enum Outcome {
    /// Response payload to transmit to the originating session.
    Payload(Vec<u8>),
    /// `DOWN`: snapshot and stop; no response is sent.
    Shutdown,
}

/// Executor-side state the resolver operates on.
pub struct ResolverCtx<'a> {
    pub store: &'a mut Store,
    /// Snapshot target for `SAVE`.
    pub snapshot_path: &'a Path,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokenizing
// ─────────────────────────────────────────────────────────────────────────────

/// Splits at the first space: `(token, remainder-after-the-space)`.
/// The remainder is verbatim and may be empty; `None` when no space exists.
fn split_once_space(input: &[u8]) -> (&[u8], Option<&[u8]>) {
    match input.iter().position(|&c| c == b' ') {
        Some(i) => (&input[..i], Some(&input[i + 1..])),
        None => (input, None),
    }
}

/// First token of `args`, for single-key commands; trailing text is ignored.
fn key_token(args: &[u8]) -> Result<&[u8], QueryError> {
    let (key, _) = split_once_space(args);
    if key.is_empty() {
        return Err(QueryError::MissingTokens);
    }
    Ok(key)
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

fn parse_f64(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

/// Renders a decimal, forcing one fractional digit on integral values so
/// `GET` output keeps the type visible (`1` → `1.0`).
fn fmt_decimal(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Parses and resolves one query line.
pub fn resolve(ctx: &mut ResolverCtx<'_>, line: &[u8]) -> Result<Outcome, QueryError> {
    // Only the leading side is trimmed: RESTORE carries binary args that
    // must reach the codec verbatim.
    let trimmed = trim_ascii_start(line);
    if trimmed.is_empty() {
        return Err(QueryError::EmptyQuery);
    }

    let (command, args) = split_once_space(trimmed);
    let command = command.to_ascii_uppercase();
    let args = args.unwrap_or(b"");

    let payload = match command.as_slice() {
        b"PING" => b"pong".to_vec(),
        b"ISET" => set_integer(ctx.store, args)?,
        b"DSET" => set_decimal(ctx.store, args)?,
        b"SSET" => set_string(ctx.store, args)?,
        b"UPDATE" => update_numeric(ctx.store, args)?,
        b"RENAME" => rename(ctx.store, args)?,
        b"GET" => get(ctx.store, args)?,
        b"TYPE" => type_name(ctx.store, args)?,
        b"CHECK" => check(ctx.store, args)?,
        b"COUNT" => ctx.store.len().to_string().into_bytes(),
        b"LIST" => list(ctx.store)?,
        b"TOUCH" => touch(ctx.store, args)?,
        b"HEAD" => position_op(ctx.store, args, Store::swap_with_head)?,
        b"TAIL" => position_op(ctx.store, args, Store::swap_with_tail)?,
        b"SHEAD" => position_op(ctx.store, args, Store::move_to_head)?,
        b"STAIL" => position_op(ctx.store, args, Store::move_to_tail)?,
        b"SORT" => {
            ctx.store.prefetch();
            b"OK".to_vec()
        }
        b"FREQ" => metadata_counter(ctx.store, args, MetadataKind::Freq)?,
        b"LAST" => metadata_counter(ctx.store, args, MetadataKind::Last)?,
        b"IDLE" => idle(ctx.store, args)?,
        b"LEN" => len(ctx.store, args)?,
        b"SIZE" => size(ctx.store, args)?,
        b"MEM" => mem(args)?,
        b"DB" => db(ctx.store, args)?,
        b"DUMP" => dump(ctx.store, args)?,
        b"RESTORE" => restore(ctx.store, args)?,
        b"ERASE" => {
            ctx.store.clear();
            b"OK".to_vec()
        }
        b"DEL" => {
            ctx.store.remove(key_token(args)?)?;
            b"OK".to_vec()
        }
        b"SAVE" => {
            snapshot::save(ctx.snapshot_path, ctx.store)
                .map_err(|_| QueryError::SaveFailed)?;
            b"OK".to_vec()
        }
        b"COPY" => copy(ctx.store, args)?,
        b"DOWN" => return Ok(Outcome::Shutdown),
        _ => return Err(QueryError::UnknownCommand),
    };

    Ok(Outcome::Payload(payload))
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

// ─────────────────────────────────────────────────────────────────────────────
// Writes
// ─────────────────────────────────────────────────────────────────────────────

fn set_integer(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let (key, value) = split_once_space(args);
    let value = value.filter(|v| !v.is_empty()).ok_or(QueryError::MissingTokens)?;
    if key.is_empty() {
        return Err(QueryError::MissingTokens);
    }
    let value = parse_i64(value).ok_or(QueryError::MismatchType)?;
    store.put(key, Field::Integer(value))?;
    Ok(b"OK".to_vec())
}

fn set_decimal(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let (key, value) = split_once_space(args);
    let value = value.filter(|v| !v.is_empty()).ok_or(QueryError::MissingTokens)?;
    if key.is_empty() {
        return Err(QueryError::MissingTokens);
    }
    let value = parse_f64(value).ok_or(QueryError::MismatchType)?;
    store.put(key, Field::Decimal(value))?;
    Ok(b"OK".to_vec())
}

fn set_string(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let (key, value) = split_once_space(args);
    let value = value.ok_or(QueryError::MissingTokens)?;
    if key.is_empty() {
        return Err(QueryError::MissingTokens);
    }
    store.put(key, Field::String(value.to_vec()))?;
    Ok(b"OK".to_vec())
}

fn update_numeric(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let (key, delta) = split_once_space(args);
    let delta = delta.filter(|v| !v.is_empty()).ok_or(QueryError::MissingTokens)?;
    if key.is_empty() {
        return Err(QueryError::MissingTokens);
    }

    let i = store.search(key).ok_or(QueryError::KeyNotFound)?;
    let obj = store.at_mut(i);
    match &mut obj.field {
        Field::Integer(v) => {
            let d = parse_i64(delta).ok_or(QueryError::MismatchType)?;
            *v = v.saturating_add(d);
        }
        Field::Decimal(v) => {
            let d = parse_f64(delta).ok_or(QueryError::MismatchType)?;
            *v += d;
        }
        Field::String(_) => return Err(QueryError::MismatchType),
    }
    obj.metadata.bump();
    Ok(b"OK".to_vec())
}

fn rename(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let (old, new) = split_once_space(args);
    let new = new.filter(|v| !v.is_empty()).ok_or(QueryError::MissingTokens)?;
    if old.is_empty() {
        return Err(QueryError::MissingTokens);
    }
    let (new, _) = split_once_space(new);
    store.rename(old, new)?;
    Ok(b"OK".to_vec())
}

// ─────────────────────────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────────────────────────

fn get(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    let obj = store.get(key).ok_or(QueryError::KeyNotFound)?;
    Ok(match &obj.field {
        Field::Integer(v) => v.to_string().into_bytes(),
        Field::Decimal(v) => fmt_decimal(*v).into_bytes(),
        Field::String(s) => {
            let mut out = Vec::with_capacity(s.len() + 2);
            out.push(b'"');
            out.extend_from_slice(s);
            out.push(b'"');
            out
        }
    })
}

fn type_name(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    let i = store.search(key).ok_or(QueryError::KeyNotFound)?;
    Ok(store.at(i).field.type_name().as_bytes().to_vec())
}

fn check(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    let found = store.search(key).is_some();
    Ok(if found { b"1".to_vec() } else { b"0".to_vec() })
}

fn list(store: &Store) -> Result<Vec<u8>, QueryError> {
    if store.is_empty() {
        return Err(QueryError::NoKeysFound);
    }
    Ok(store.list_keys().join(&b' '))
}

fn touch(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    store.get(key).ok_or(QueryError::KeyNotFound)?;
    Ok(b"OK".to_vec())
}

fn position_op(
    store: &mut Store,
    args: &[u8],
    op: fn(&mut Store, &[u8]) -> Result<(), StoreError>,
) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    op(store, key)?;
    Ok(b"OK".to_vec())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

enum MetadataKind {
    Freq,
    Last,
}

/// `FREQ key` / `LAST key` report the counter; with a trailing number they
/// overwrite it and report the new value.
fn metadata_counter(
    store: &mut Store,
    args: &[u8],
    kind: MetadataKind,
) -> Result<Vec<u8>, QueryError> {
    let (key, value) = split_once_space(args);
    if key.is_empty() {
        return Err(QueryError::MissingTokens);
    }
    let i = store.search(key).ok_or(QueryError::KeyNotFound)?;

    let slot = match kind {
        MetadataKind::Freq => &mut store.at_mut(i).metadata.access_times,
        MetadataKind::Last => &mut store.at_mut(i).metadata.last_access,
    };
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *slot = parse_i64(value).ok_or(QueryError::MismatchType)?;
    }
    Ok(slot.to_string().into_bytes())
}

fn idle(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    let i = store.search(key).ok_or(QueryError::KeyNotFound)?;
    let idle = now_micros() - store.at(i).metadata.last_access;
    if idle < 0 {
        return Err(QueryError::InvalidMetadata);
    }
    Ok(idle.to_string().into_bytes())
}

fn len(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    let i = store.search(key).ok_or(QueryError::KeyNotFound)?;
    let n = match &store.at(i).field {
        Field::String(s) => s.len(),
        _ => 8,
    };
    Ok(n.to_string().into_bytes())
}

/// In-memory footprint estimate: fixed record overhead plus key and payload.
fn size(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    let i = store.search(key).ok_or(QueryError::KeyNotFound)?;
    let obj = store.at(i);
    let payload = match &obj.field {
        Field::String(s) => s.len() as u64,
        _ => 8,
    };
    let total = 56 + obj.key.len() as u64 + payload;
    Ok(total.to_string().into_bytes())
}

// ─────────────────────────────────────────────────────────────────────────────
// Introspection
// ─────────────────────────────────────────────────────────────────────────────

fn mem(args: &[u8]) -> Result<Vec<u8>, QueryError> {
    use crate::memtrack;
    let arg = key_token(args).map_err(|_| QueryError::UnknownArgument)?;
    let value = match arg.to_ascii_uppercase().as_slice() {
        b"LIVE" => memtrack::live(),
        b"PEAK" => memtrack::peak(),
        b"TOTAL" => memtrack::total(),
        b"ALLOC" => memtrack::alloc_count(),
        b"FREE" => memtrack::free_count(),
        b"RESET-PEAK" => {
            memtrack::reset_peak();
            0
        }
        b"RESET-TOTAL" => {
            memtrack::reset_total();
            0
        }
        b"RESET-COUNT" => {
            memtrack::reset_count();
            0
        }
        _ => return Err(QueryError::UnknownArgument),
    };
    Ok(value.to_string().into_bytes())
}

fn db(store: &Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let arg = key_token(args).map_err(|_| QueryError::UnknownArgument)?;
    Ok(match arg.to_ascii_uppercase().as_slice() {
        b"NAME" => store.name().as_bytes().to_vec(),
        b"CAP" => store.capacity().to_string().into_bytes(),
        b"SIZE" => store.used().to_string().into_bytes(),
        _ => return Err(QueryError::UnknownArgument),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialization commands
// ─────────────────────────────────────────────────────────────────────────────

fn dump(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let key = key_token(args)?;
    let i = store.search(key).ok_or(QueryError::KeyNotFound)?;
    serialize(store.at(i)).map_err(|_| QueryError::InvalidObject)
}

fn restore(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let obj = deserialize(args).map_err(|_| QueryError::InvalidObject)?;
    store.insert_object(obj)?;
    Ok(b"OK".to_vec())
}

/// `COPY src dst` duplicates through the canonical serialization so the
/// copy carries identical field bytes and metadata.
fn copy(store: &mut Store, args: &[u8]) -> Result<Vec<u8>, QueryError> {
    let (src, dst) = split_once_space(args);
    let dst = dst.filter(|v| !v.is_empty()).ok_or(QueryError::MissingTokens)?;
    if src.is_empty() {
        return Err(QueryError::MissingTokens);
    }
    let (dst, _) = split_once_space(dst);

    let i = store.search(src).ok_or(QueryError::KeyNotFound)?;
    let bytes = serialize(store.at(i)).map_err(|_| QueryError::InvalidObject)?;
    let mut obj = deserialize(&bytes).map_err(|_| QueryError::InvalidObject)?;
    obj.key = dst.to_vec();
    store.insert_object(obj)?;
    Ok(b"OK".to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx_store() -> (Store, TempDir) {
        (Store::new("testdb", 64 * 1024), TempDir::new().unwrap())
    }

    fn run(store: &mut Store, dir: &TempDir, line: &[u8]) -> Result<Vec<u8>, QueryError> {
        let path = dir.path().join("testdb.raptodb");
        let mut ctx = ResolverCtx {
            store,
            snapshot_path: &path,
        };
        match resolve(&mut ctx, line)? {
            Outcome::Payload(p) => Ok(p),
            Outcome::Shutdown => Ok(Vec::new()),
        }
    }

    #[test]
    fn string_set_get_type_len() {
        let (mut s, d) = ctx_store();
        assert_eq!(run(&mut s, &d, b"SSET name Alice").unwrap(), b"OK");
        assert_eq!(run(&mut s, &d, b"GET name").unwrap(), b"\"Alice\"");
        assert_eq!(run(&mut s, &d, b"TYPE name").unwrap(), b"string");
        assert_eq!(run(&mut s, &d, b"LEN name").unwrap(), b"5");
    }

    #[test]
    fn integer_update_saturates_and_rejects_decimals() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET x 10").unwrap();
        assert_eq!(run(&mut s, &d, b"UPDATE x 3").unwrap(), b"OK");
        assert_eq!(run(&mut s, &d, b"GET x").unwrap(), b"13");
        assert_eq!(
            run(&mut s, &d, b"UPDATE x 0.5").unwrap_err(),
            QueryError::MismatchType
        );
    }

    #[test]
    fn decimal_get_forces_fractional_digit() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"DSET y 1.0").unwrap();
        assert_eq!(run(&mut s, &d, b"GET y").unwrap(), b"1.0");
        run(&mut s, &d, b"UPDATE y 0.5").unwrap();
        assert_eq!(run(&mut s, &d, b"GET y").unwrap(), b"1.5");
    }

    #[test]
    fn list_reflects_promotion() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET a 1").unwrap();
        run(&mut s, &d, b"ISET b 2").unwrap();
        run(&mut s, &d, b"ISET c 3").unwrap();
        assert_eq!(run(&mut s, &d, b"LIST").unwrap(), b"c b a");
        run(&mut s, &d, b"GET a").unwrap();
        assert_eq!(run(&mut s, &d, b"LIST").unwrap(), b"c a b");
    }

    #[test]
    fn command_matching_is_case_insensitive() {
        let (mut s, d) = ctx_store();
        assert_eq!(run(&mut s, &d, b"ping").unwrap(), b"pong");
        assert_eq!(run(&mut s, &d, b"Ping").unwrap(), b"pong");
    }

    #[test]
    fn empty_query_is_rejected() {
        let (mut s, d) = ctx_store();
        assert_eq!(run(&mut s, &d, b"").unwrap_err(), QueryError::EmptyQuery);
        assert_eq!(run(&mut s, &d, b"   ").unwrap_err(), QueryError::EmptyQuery);
    }

    #[test]
    fn unknown_command_phrase() {
        let (mut s, d) = ctx_store();
        let err = run(&mut s, &d, b"NOPE").unwrap_err();
        assert_eq!(err, QueryError::UnknownCommand);
        assert_eq!(err.response(), b"ERR: command does not exist");
    }

    #[test]
    fn missing_tokens_on_partial_set() {
        let (mut s, d) = ctx_store();
        assert_eq!(
            run(&mut s, &d, b"ISET lonely").unwrap_err(),
            QueryError::MissingTokens
        );
    }

    #[test]
    fn rename_and_del() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET a 1").unwrap();
        run(&mut s, &d, b"ISET b 2").unwrap();
        assert_eq!(
            run(&mut s, &d, b"RENAME a b").unwrap_err(),
            QueryError::KeyReplacementExist
        );
        assert_eq!(run(&mut s, &d, b"RENAME a c").unwrap(), b"OK");
        assert_eq!(run(&mut s, &d, b"DEL c").unwrap(), b"OK");
        assert_eq!(
            run(&mut s, &d, b"GET c").unwrap_err(),
            QueryError::KeyNotFound
        );
    }

    #[test]
    fn check_and_count() {
        let (mut s, d) = ctx_store();
        assert_eq!(run(&mut s, &d, b"CHECK nothing").unwrap(), b"0");
        run(&mut s, &d, b"ISET k 1").unwrap();
        assert_eq!(run(&mut s, &d, b"CHECK k").unwrap(), b"1");
        assert_eq!(run(&mut s, &d, b"COUNT").unwrap(), b"1");
    }

    #[test]
    fn freq_reads_and_writes_counter() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET k 1").unwrap();
        assert_eq!(run(&mut s, &d, b"FREQ k").unwrap(), b"1");
        assert_eq!(run(&mut s, &d, b"FREQ k 42").unwrap(), b"42");
        assert_eq!(run(&mut s, &d, b"FREQ k").unwrap(), b"42");
        assert_eq!(
            run(&mut s, &d, b"FREQ k abc").unwrap_err(),
            QueryError::MismatchType
        );
    }

    #[test]
    fn idle_reports_nonnegative_and_detects_future_timestamps() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET k 1").unwrap();
        let idle: i64 = String::from_utf8(run(&mut s, &d, b"IDLE k").unwrap())
            .unwrap()
            .parse()
            .unwrap();
        assert!(idle >= 0);
        let future = (now_micros() + 60_000_000).to_string();
        run(&mut s, &d, format!("LAST k {future}").as_bytes()).unwrap();
        assert_eq!(
            run(&mut s, &d, b"IDLE k").unwrap_err(),
            QueryError::InvalidMetadata
        );
    }

    #[test]
    fn size_formula() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"SSET name Alice").unwrap();
        // 56 + 4 (key) + 5 (payload)
        assert_eq!(run(&mut s, &d, b"SIZE name").unwrap(), b"65");
        run(&mut s, &d, b"ISET num 7").unwrap();
        // 56 + 3 + 8
        assert_eq!(run(&mut s, &d, b"SIZE num").unwrap(), b"67");
    }

    #[test]
    fn db_introspection() {
        let (mut s, d) = ctx_store();
        assert_eq!(run(&mut s, &d, b"DB NAME").unwrap(), b"testdb");
        assert_eq!(
            run(&mut s, &d, b"DB CAP").unwrap(),
            (64 * 1024).to_string().into_bytes()
        );
        run(&mut s, &d, b"ISET k 1").unwrap();
        assert_eq!(run(&mut s, &d, b"DB SIZE").unwrap(), b"27");
        assert_eq!(
            run(&mut s, &d, b"DB WHAT").unwrap_err(),
            QueryError::UnknownArgument
        );
    }

    #[test]
    fn mem_rejects_unknown_argument() {
        let (mut s, d) = ctx_store();
        assert!(run(&mut s, &d, b"MEM LIVE").is_ok());
        assert_eq!(run(&mut s, &d, b"MEM RESET-PEAK").unwrap(), b"0");
        assert_eq!(
            run(&mut s, &d, b"MEM BOGUS").unwrap_err(),
            QueryError::UnknownArgument
        );
    }

    #[test]
    fn dump_restore_round_trip() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"SSET k hello world").unwrap();
        let dumped = run(&mut s, &d, b"DUMP k").unwrap();
        run(&mut s, &d, b"DEL k").unwrap();

        let mut line = b"RESTORE ".to_vec();
        line.extend_from_slice(&dumped);
        assert_eq!(run(&mut s, &d, &line).unwrap(), b"OK");
        assert_eq!(run(&mut s, &d, b"GET k").unwrap(), b"\"hello world\"");
    }

    #[test]
    fn restore_rejects_garbage() {
        let (mut s, d) = ctx_store();
        assert_eq!(
            run(&mut s, &d, b"RESTORE xx").unwrap_err(),
            QueryError::InvalidObject
        );
    }

    #[test]
    fn copy_duplicates_value_and_metadata() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET src 9").unwrap();
        run(&mut s, &d, b"FREQ src 5").unwrap();
        assert_eq!(run(&mut s, &d, b"COPY src dst").unwrap(), b"OK");
        assert_eq!(run(&mut s, &d, b"GET dst").unwrap(), b"9");
        assert_eq!(run(&mut s, &d, b"FREQ dst").unwrap(), b"5");
    }

    #[test]
    fn erase_empties_the_store() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET a 1").unwrap();
        assert_eq!(run(&mut s, &d, b"ERASE").unwrap(), b"OK");
        assert_eq!(run(&mut s, &d, b"LIST").unwrap_err(), QueryError::NoKeysFound);
    }

    #[test]
    fn save_writes_snapshot_file() {
        let (mut s, d) = ctx_store();
        run(&mut s, &d, b"ISET k 1").unwrap();
        assert_eq!(run(&mut s, &d, b"SAVE").unwrap(), b"OK");
        assert!(d.path().join("testdb.raptodb").exists());
    }

    #[test]
    fn head_tail_variants() {
        let (mut s, d) = ctx_store();
        for line in [&b"ISET a 1"[..], b"ISET b 2", b"ISET c 3", b"ISET e 4"] {
            run(&mut s, &d, line).unwrap();
        }
        assert_eq!(run(&mut s, &d, b"LIST").unwrap(), b"e c b a");
        run(&mut s, &d, b"HEAD a").unwrap();
        assert_eq!(run(&mut s, &d, b"LIST").unwrap(), b"a c b e");
        run(&mut s, &d, b"SHEAD e").unwrap();
        assert_eq!(run(&mut s, &d, b"LIST").unwrap(), b"e a c b");
        run(&mut s, &d, b"STAIL e").unwrap();
        assert_eq!(run(&mut s, &d, b"LIST").unwrap(), b"a c b e");
        assert_eq!(
            run(&mut s, &d, b"TAIL zz").unwrap_err(),
            QueryError::KeyNotFound
        );
    }
}
