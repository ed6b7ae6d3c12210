//! Decodes a fetched `.torrent` metainfo (or a bare magnet URI) into
//! [`anime_core::model::TorrentInfo`]: display name plus v1/v2 info-hashes.
//!
//! BEP-3 defines the v1 info-hash as the SHA-1 of the bencoded `info` dictionary exactly as
//! it appears in the file. BEP-52 defines the v2 hash as the SHA-256 of the same dictionary
//! for a torrent whose `info` carries `"meta version": 2`. Re-encoding the parsed `info`
//! struct with `serde_bencode` reproduces the original bytes because bencode dictionary keys
//! are serialized in sorted order, which is also what every `.torrent` creator emits.

use anime_core::model::TorrentInfo;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{DownloadError, Result};

#[derive(Debug, Deserialize, Serialize)]
struct File {
    path: Vec<String>,
    length: i64,
}

#[derive(Debug, Deserialize, Serialize)]
struct Info {
    name: String,
    pieces: ByteBuf,
    #[serde(rename = "piece length")]
    piece_length: i64,
    #[serde(default)]
    length: Option<i64>,
    #[serde(default)]
    files: Option<Vec<File>>,
    #[serde(default)]
    #[serde(rename = "meta version")]
    meta_version: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Metainfo {
    info: Info,
}

/// Parse the raw bytes of a `.torrent` file into [`TorrentInfo`].
///
/// # Errors
///
/// Returns [`DownloadError::MetainfoDecode`] if `bytes` is not a valid bencoded
/// dictionary, or [`DownloadError::MissingInfoDict`] if it lacks an `info` key.
pub fn parse_metainfo(bytes: &[u8]) -> Result<TorrentInfo> {
    let metainfo: Metainfo = serde_bencode::from_bytes(bytes).map_err(DownloadError::MetainfoDecode)?;
    let info_bytes = serde_bencode::to_bytes(&metainfo.info).map_err(DownloadError::MetainfoDecode)?;

    let info_hash_v1 = hex::encode(Sha1::digest(&info_bytes));
    let info_hash_v2 = if metainfo.info.meta_version == Some(2) {
        Some(hex::encode(Sha256::digest(&info_bytes)))
    } else {
        None
    };

    Ok(TorrentInfo {
        name: metainfo.info.name,
        info_hash_v1: Some(info_hash_v1),
        info_hash_v2,
        magnet_uri: None,
        raw_bytes: bytes.to_vec(),
    })
}

/// Parse a `magnet:` URI directly, without fetching metainfo bytes. Only the `xt`
/// (info-hash) and `dn` (display name) parameters are consulted.
///
/// # Errors
///
/// Returns [`DownloadError::MagnetMissingInfoHash`] if no `urn:btih:`/`urn:btmh:` `xt`
/// parameter is present.
pub fn parse_magnet(uri: &str) -> Result<TorrentInfo> {
    let parsed = Url::parse(uri).map_err(|_| DownloadError::MagnetMissingInfoHash)?;
    let mut name = None;
    let mut info_hash_v1 = None;
    let mut info_hash_v2 = None;

    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "dn" => name = Some(value.into_owned()),
            "xt" => {
                if let Some(hash) = value.strip_prefix("urn:btih:") {
                    info_hash_v1 = Some(hash.to_lowercase());
                } else if let Some(hash) = value.strip_prefix("urn:btmh:") {
                    info_hash_v2 = Some(hash.to_lowercase());
                }
            }
            _ => {}
        }
    }

    if info_hash_v1.is_none() && info_hash_v2.is_none() {
        return Err(DownloadError::MagnetMissingInfoHash);
    }

    Ok(TorrentInfo {
        name: name.unwrap_or_else(|| info_hash_v1.clone().or_else(|| info_hash_v2.clone()).unwrap_or_default()),
        info_hash_v1,
        info_hash_v2,
        magnet_uri: Some(uri.to_string()),
        raw_bytes: Vec::new(),
    })
}
