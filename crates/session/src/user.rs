//! `create_user`: account creation gated by the repo's registration mode.

use std::time::{SystemTime, UNIX_EPOCH};

use efs_core::{EfsError, Result};
use kvstore::{keys, Db, PutOutcome, Table, Txn, TxnMode};

use crate::repo::Repo;
use crate::session::Session;

/// Minimum username length in bytes.
pub const USER_MIN: usize = 2;
/// Maximum username length in bytes.
pub const USER_MAX: usize = 32;
/// Minimum password length in bytes (no minimum: an empty password is
/// syntactically valid at this layer; policy enforcement is a caller
/// concern).
pub const PASS_MIN: usize = 0;
/// Maximum password length in bytes.
pub const PASS_MAX: usize = 72;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Create a new user, recording `caller`'s user id as the new user's
/// parent. Requires `repo.registration_mode()` to be nonzero — a disabled
/// registration mode is an unsupported-mode argument, not a capability the
/// caller's session lacks, so it is reported as
/// [`EfsError::InvalidArgument`] rather than [`EfsError::CapabilityDenied`]
/// (the latter is reserved for a session whose own mode bitmask lacks a
/// required bit). Validates `USER_MIN/USER_MAX` and `PASS_MIN/PASS_MAX`
/// length bounds, hashes the password with bcrypt, and performs both
/// no-overwrite inserts (`username -> userID`, `userID -> user record`)
/// inside one read-write transaction so a duplicate username leaves no
/// partial state.
pub async fn create_user(repo: &Repo, caller: &Session, username: &str, password: &str) -> Result<u64> {
    if username.len() < USER_MIN || username.len() > USER_MAX {
        return Err(EfsError::InvalidArgument(format!(
            "username must be {USER_MIN}..={USER_MAX} bytes, got {}",
            username.len()
        )));
    }
    if password.len() > PASS_MAX {
        return Err(EfsError::InvalidArgument(format!("password must be at most {PASS_MAX} bytes")));
    }
    if repo.registration_mode() == 0 {
        return Err(EfsError::InvalidArgument("registration is disabled for this repository".into()));
    }

    let passhash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| EfsError::InvalidArgument(format!("password hash: {e}")))?;

    let mut txn = repo.db().begin(TxnMode::ReadWrite).await?;
    let user_id = txn.next_id(Table::UserByID).await?;

    let name_key = keys::user_id_by_name_key(username);
    match txn.put(name_key, keys::user_id_val(user_id), true).await {
        Ok(PutOutcome::Inserted) => {}
        Ok(PutOutcome::Existed(_)) => {
            txn.abort();
            return Err(EfsError::Duplicate);
        }
        Err(e) => {
            txn.abort();
            return Err(e);
        }
    }

    let user_key = keys::user_by_id_key(user_id);
    let user_val = keys::user_by_id_val(username, &passhash, repo.registration_mode(), caller.user_id(), now_ms());
    if let Err(e) = txn.put(user_key, user_val, false).await {
        txn.abort();
        return Err(e);
    }

    txn.commit().await?;
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::MODE_READ;
    use crate::session::{Session, SessionCache};
    use kvstore::MemDb;

    fn repo_with_registration(mode: u32) -> Repo {
        Repo::new(std::env::temp_dir(), Box::new(MemDb::new()), mode)
    }

    fn root_session(cache: &SessionCache) -> Session {
        Session::create(cache, 1, [0u8; 32], 0, MODE_READ).unwrap()
    }

    #[tokio::test]
    async fn bounds_accept_minimum_username_and_empty_password() {
        let repo = repo_with_registration(MODE_READ);
        let cache = SessionCache::new();
        let caller = root_session(&cache);
        let user_id = create_user(&repo, &caller, "ab", "").await.unwrap();
        assert_eq!(user_id, 1);
    }

    #[tokio::test]
    async fn username_below_minimum_is_rejected() {
        let repo = repo_with_registration(MODE_READ);
        let cache = SessionCache::new();
        let caller = root_session(&cache);
        assert!(matches!(create_user(&repo, &caller, "a", "x").await, Err(EfsError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn duplicate_username_fails_and_leaves_store_unchanged() {
        let repo = repo_with_registration(MODE_READ);
        let cache = SessionCache::new();
        let caller = root_session(&cache);
        create_user(&repo, &caller, "alice", "first").await.unwrap();

        let err = create_user(&repo, &caller, "alice", "second").await.unwrap_err();
        assert!(matches!(err, EfsError::Duplicate));

        let txn = repo.db().begin(TxnMode::ReadOnly).await.unwrap();
        let val = txn.get(&keys::user_id_by_name_key("alice")).await.unwrap().unwrap();
        let user_id = keys::user_id_val_unpack(&val).unwrap();
        let rec = txn.get(&keys::user_by_id_key(user_id)).await.unwrap().unwrap();
        let (_, passhash, ..) = keys::user_by_id_val_unpack(&rec).unwrap();
        assert!(bcrypt::verify("first", &passhash).unwrap());
    }

    #[tokio::test]
    async fn registration_closed_is_invalid_argument() {
        let repo = repo_with_registration(0);
        let cache = SessionCache::new();
        let caller = root_session(&cache);
        assert!(matches!(create_user(&repo, &caller, "ab", "x").await, Err(EfsError::InvalidArgument(_))));
    }
}
