//! Session (component F): a refcounted, authenticated handle bundling a
//! user identity, a granted capability mode, and a session key used to
//! render and parse the session cookie.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use efs_core::{EfsError, Result};

use crate::mode::Mode;

/// Length in bytes of a session key.
pub const SESSION_KEY_LEN: usize = 32;

/// Length in hex characters of a session key as carried in a cookie.
pub const SESSION_KEY_HEX: usize = SESSION_KEY_LEN * 2;

struct Inner {
    session_id: u64,
    session_key: Mutex<[u8; SESSION_KEY_LEN]>,
    user_id: u64,
    mode: Mode,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // This only runs once the last `Session` handle (the last `Arc`
        // strong reference) is gone, matching "last release zeroes the
        // session key".
        if let Ok(mut key) = self.session_key.lock() {
            key.fill(0);
        }
    }
}

/// An authenticated handle. Cloning is `retain`: it bumps the underlying
/// reference count rather than duplicating key material. The session key
/// is zeroed when the last clone is dropped.
#[derive(Clone)]
pub struct Session(Arc<Inner>);

impl Session {
    /// Create a session bound to `session_id`/`session_key`, register it
    /// with `cache`, and return the caller's own reference. `mode` of zero
    /// is rejected: a session always carries at least one capability bit.
    pub fn create(
        cache: &SessionCache,
        session_id: u64,
        session_key: [u8; SESSION_KEY_LEN],
        user_id: u64,
        mode: Mode,
    ) -> Result<Self> {
        if mode == 0 {
            return Err(EfsError::InvalidArgument("session mode must be nonzero".into()));
        }
        let session = Session(Arc::new(Inner { session_id, session_key: Mutex::new(session_key), user_id, mode }));
        cache.register(session.retain());
        Ok(session)
    }

    /// Hand out a new reference to the same session, incrementing its
    /// refcount.
    #[must_use]
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Give up this reference. Equivalent to dropping the handle; named to
    /// match the originating API's explicit `retain`/`release` pair.
    pub fn release(self) {
        drop(self);
    }

    /// The session's id.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        self.0.session_id
    }

    /// The user this session authenticates as.
    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.0.user_id
    }

    /// The session's granted capability bitmask.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.0.mode
    }

    /// Render `s=<sessionID>:<lowercase-hex-key>`.
    #[must_use]
    pub fn copy_cookie(&self) -> String {
        let key = self.0.session_key.lock().expect("session key mutex poisoned");
        format!("s={}:{}", self.0.session_id, hex::encode(*key))
    }
}

/// Parse a cookie rendered by [`Session::copy_cookie`] back into its
/// `(sessionID, sessionKey)` pair.
pub fn parse_cookie(cookie: &str) -> Result<(u64, [u8; SESSION_KEY_LEN])> {
    let rest =
        cookie.strip_prefix("s=").ok_or_else(|| EfsError::InvalidArgument("cookie missing s= prefix".into()))?;
    let (id_str, key_hex) = rest
        .split_once(':')
        .ok_or_else(|| EfsError::InvalidArgument("cookie missing id/key separator".into()))?;
    let session_id: u64 =
        id_str.parse().map_err(|_| EfsError::InvalidArgument("cookie session id is not numeric".into()))?;
    if key_hex.len() != SESSION_KEY_HEX {
        return Err(EfsError::InvalidArgument("cookie key has the wrong length".into()));
    }
    let bytes = hex::decode(key_hex).map_err(|_| EfsError::InvalidArgument("cookie key is not hex".into()))?;
    let mut key = [0u8; SESSION_KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok((session_id, key))
}

/// A collaborator holding live sessions for lookup by id (e.g. from an
/// incoming cookie). Injected at `Repo` construction rather than a
/// process-wide singleton.
#[derive(Default)]
pub struct SessionCache {
    sessions: Mutex<HashMap<u64, Session>>,
}

impl SessionCache {
    /// Construct an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the cache's own reference to `session`.
    pub fn register(&self, session: Session) {
        self.sessions.lock().expect("session cache mutex poisoned").insert(session.session_id(), session);
    }

    /// Look up a live session by id, returning a new reference to the
    /// caller.
    #[must_use]
    pub fn lookup(&self, session_id: u64) -> Option<Session> {
        self.sessions.lock().expect("session cache mutex poisoned").get(&session_id).map(Session::retain)
    }

    /// Drop the cache's own reference to a session.
    pub fn forget(&self, session_id: u64) {
        self.sessions.lock().expect("session cache mutex poisoned").remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; SESSION_KEY_LEN] {
        [byte; SESSION_KEY_LEN]
    }

    #[test]
    fn zero_mode_is_rejected() {
        let cache = SessionCache::new();
        assert!(matches!(Session::create(&cache, 1, key(1), 1, 0), Err(EfsError::InvalidArgument(_))));
    }

    #[test]
    fn cookie_round_trips_through_parse_cookie() {
        let cache = SessionCache::new();
        let session_key = key(0xab);
        let session = Session::create(&cache, 42, session_key, 7, crate::mode::MODE_READ).unwrap();

        let cookie = session.copy_cookie();
        let (session_id, parsed_key) = parse_cookie(&cookie).unwrap();
        assert_eq!(session_id, 42);
        assert_eq!(parsed_key, session_key);
    }

    #[test]
    fn cache_lookup_hands_out_a_new_reference() {
        let cache = SessionCache::new();
        let session = Session::create(&cache, 1, key(1), 1, crate::mode::MODE_READ).unwrap();
        session.release();

        let looked_up = cache.lookup(1).expect("cache still holds its own reference");
        assert_eq!(looked_up.session_id(), 1);
    }

    #[test]
    fn forget_removes_the_cache_entry() {
        let cache = SessionCache::new();
        let session = Session::create(&cache, 1, key(1), 1, crate::mode::MODE_READ).unwrap();
        session.release();
        cache.forget(1);
        assert!(cache.lookup(1).is_none());
    }
}
