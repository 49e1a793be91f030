//! The logical key namespaces from spec.md §6, each prefixed by a varint
//! table id, plus the packing/unpacking helpers for each row.

use crate::codec::{get_str, get_varint, put_str, put_varint};

/// One logical key namespace ("table"), tagged by a small varint id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum Table {
    FileByID,
    FileIDByInfo,
    FileIDAndURI,
    URIAndFileID,
    UserByID,
    UserIDByName,
    TargetURIAndMetaFileID,
    MetaFileIDFieldAndValue,
}

impl Table {
    fn tag(self) -> u64 {
        match self {
            Table::FileByID => 0,
            Table::FileIDByInfo => 1,
            Table::FileIDAndURI => 2,
            Table::URIAndFileID => 3,
            Table::UserByID => 4,
            Table::UserIDByName => 5,
            Table::TargetURIAndMetaFileID => 6,
            Table::MetaFileIDFieldAndValue => 7,
        }
    }

    fn prefix(self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varint(&mut out, self.tag());
        out
    }
}

/// `FileByID`: varint fileID -> (internalHash, type, size).
#[must_use]
pub fn file_by_id_key(file_id: u64) -> Vec<u8> {
    let mut out = Table::FileByID.prefix();
    put_varint(&mut out, file_id);
    out
}

/// Pack the `FileByID` value: `(internalHash, type, size)`.
#[must_use]
pub fn file_by_id_val(internal_hash: &str, file_type: &str, size: u64) -> Vec<u8> {
    let mut out = Vec::new();
    put_str(&mut out, internal_hash);
    put_str(&mut out, file_type);
    put_varint(&mut out, size);
    out
}

/// Unpack the `FileByID` value.
#[must_use]
pub fn file_by_id_val_unpack(val: &[u8]) -> Option<(String, String, u64)> {
    let (internal_hash, rest) = get_str(val)?;
    let (file_type, rest) = get_str(rest)?;
    let (size, _) = get_varint(rest)?;
    Some((internal_hash, file_type, size))
}

/// `FileIDByInfo`: (internalHash, type) -> varint fileID.
#[must_use]
pub fn file_id_by_info_key(internal_hash: &str, file_type: &str) -> Vec<u8> {
    let mut out = Table::FileIDByInfo.prefix();
    put_str(&mut out, internal_hash);
    put_str(&mut out, file_type);
    out
}

/// Pack a bare `fileID` value (used as `FileIDByInfo`'s value).
#[must_use]
pub fn file_id_val(file_id: u64) -> Vec<u8> {
    let mut out = Vec::new();
    put_varint(&mut out, file_id);
    out
}

/// Unpack a bare `fileID` value.
#[must_use]
pub fn file_id_val_unpack(val: &[u8]) -> Option<u64> {
    get_varint(val).map(|(n, _)| n)
}

/// `FileIDAndURI`: (varint fileID, URI) -> empty.
#[must_use]
pub fn file_id_and_uri_key(file_id: u64, uri: &str) -> Vec<u8> {
    let mut out = Table::FileIDAndURI.prefix();
    put_varint(&mut out, file_id);
    put_str(&mut out, uri);
    out
}

/// Prefix covering every entry in the `URIAndFileID` table, for callers
/// (e.g. a filtered scan) that need to walk all URIs rather than one.
#[must_use]
pub fn uri_and_file_id_table_prefix() -> Vec<u8> {
    Table::URIAndFileID.prefix()
}

/// `URIAndFileID`: (URI, varint fileID) -> empty.
#[must_use]
pub fn uri_and_file_id_key(uri: &str, file_id: u64) -> Vec<u8> {
    let mut out = Table::URIAndFileID.prefix();
    put_str(&mut out, uri);
    put_varint(&mut out, file_id);
    out
}

/// Prefix covering every `URIAndFileID` entry for one URI, for a range scan.
#[must_use]
pub fn uri_and_file_id_prefix(uri: &str) -> Vec<u8> {
    let mut out = Table::URIAndFileID.prefix();
    put_str(&mut out, uri);
    out
}

/// Unpack a `URIAndFileID` key into `(uri, fileID)`.
#[must_use]
pub fn uri_and_file_id_key_unpack(key: &[u8]) -> Option<(String, u64)> {
    let (_tag, rest) = get_varint(key)?;
    let (uri, rest) = get_str(rest)?;
    let (file_id, _) = get_varint(rest)?;
    Some((uri, file_id))
}

/// `UserByID`: varint userID -> (username, passhash, mode, parent, createdAt).
#[must_use]
pub fn user_by_id_key(user_id: u64) -> Vec<u8> {
    let mut out = Table::UserByID.prefix();
    put_varint(&mut out, user_id);
    out
}

/// Pack the `UserByID` value.
#[must_use]
pub fn user_by_id_val(
    username: &str,
    passhash: &str,
    mode: u32,
    parent_user_id: u64,
    created_at_ms: u64,
) -> Vec<u8> {
    let mut out = Vec::new();
    put_str(&mut out, username);
    put_str(&mut out, passhash);
    put_varint(&mut out, u64::from(mode));
    put_varint(&mut out, parent_user_id);
    put_varint(&mut out, created_at_ms);
    out
}

/// Unpack the `UserByID` value.
#[must_use]
pub fn user_by_id_val_unpack(val: &[u8]) -> Option<(String, String, u32, u64, u64)> {
    let (username, rest) = get_str(val)?;
    let (passhash, rest) = get_str(rest)?;
    let (mode, rest) = get_varint(rest)?;
    let (parent, rest) = get_varint(rest)?;
    let (created_at, _) = get_varint(rest)?;
    Some((username, passhash, mode as u32, parent, created_at))
}

/// `UserIDByName`: username -> varint userID.
#[must_use]
pub fn user_id_by_name_key(username: &str) -> Vec<u8> {
    let mut out = Table::UserIDByName.prefix();
    put_str(&mut out, username);
    out
}

/// Pack a bare `userID` value (used as `UserIDByName`'s value).
#[must_use]
pub fn user_id_val(user_id: u64) -> Vec<u8> {
    let mut out = Vec::new();
    put_varint(&mut out, user_id);
    out
}

/// Unpack a bare `userID` value.
#[must_use]
pub fn user_id_val_unpack(val: &[u8]) -> Option<u64> {
    get_varint(val).map(|(n, _)| n)
}

/// `TargetURIAndMetaFileID`: (URI, varint metaFileID) -> empty.
#[must_use]
pub fn target_uri_and_meta_file_id_key(target_uri: &str, meta_file_id: u64) -> Vec<u8> {
    let mut out = Table::TargetURIAndMetaFileID.prefix();
    put_str(&mut out, target_uri);
    put_varint(&mut out, meta_file_id);
    out
}

/// Prefix covering every `TargetURIAndMetaFileID` entry for one target URI.
#[must_use]
pub fn target_uri_and_meta_file_id_prefix(target_uri: &str) -> Vec<u8> {
    let mut out = Table::TargetURIAndMetaFileID.prefix();
    put_str(&mut out, target_uri);
    out
}

/// Unpack a `TargetURIAndMetaFileID` key into `(targetUri, metaFileID)`.
#[must_use]
pub fn target_uri_and_meta_file_id_key_unpack(key: &[u8]) -> Option<(String, u64)> {
    let (_tag, rest) = get_varint(key)?;
    let (uri, rest) = get_str(rest)?;
    let (meta_file_id, _) = get_varint(rest)?;
    Some((uri, meta_file_id))
}

/// `MetaFileIDFieldAndValue`: (varint metaFileID, field, value) -> empty.
#[must_use]
pub fn meta_file_id_field_and_value_key(meta_file_id: u64, field: &str, value: &str) -> Vec<u8> {
    let mut out = Table::MetaFileIDFieldAndValue.prefix();
    put_varint(&mut out, meta_file_id);
    put_str(&mut out, field);
    put_str(&mut out, value);
    out
}

/// Prefix covering every value for one `(metaFileID, field)` pair.
#[must_use]
pub fn meta_file_id_field_prefix(meta_file_id: u64, field: &str) -> Vec<u8> {
    let mut out = Table::MetaFileIDFieldAndValue.prefix();
    put_varint(&mut out, meta_file_id);
    put_str(&mut out, field);
    out
}

/// Unpack a `MetaFileIDFieldAndValue` key into `(metaFileID, field, value)`.
#[must_use]
pub fn meta_file_id_field_and_value_key_unpack(key: &[u8]) -> Option<(u64, String, String)> {
    let (_tag, rest) = get_varint(key)?;
    let (meta_file_id, rest) = get_varint(rest)?;
    let (field, rest) = get_str(rest)?;
    let (value, _) = get_str(rest)?;
    Some((meta_file_id, field, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_info_key_round_trips_value() {
        let val = file_by_id_val("deadbeef", "text/plain; charset=utf-8", 6);
        let (hash, ty, size) = file_by_id_val_unpack(&val).unwrap();
        assert_eq!(hash, "deadbeef");
        assert_eq!(ty, "text/plain; charset=utf-8");
        assert_eq!(size, 6);
    }

    #[test]
    fn uri_and_file_id_key_round_trips() {
        let key = uri_and_file_id_key("hash://sha256/deadbeef", 42);
        let (uri, file_id) = uri_and_file_id_key_unpack(&key).unwrap();
        assert_eq!(uri, "hash://sha256/deadbeef");
        assert_eq!(file_id, 42);
    }

    #[test]
    fn prefix_is_a_true_prefix_of_full_key() {
        let prefix = uri_and_file_id_prefix("hash://sha256/deadbeef");
        let key = uri_and_file_id_key("hash://sha256/deadbeef", 42);
        assert!(key.starts_with(&prefix));
    }
}
