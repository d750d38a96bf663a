//! Canonical byte encoding for keys, entries, values, and events.
//!
//! The encoding is a deterministic function of the typed structure: a
//! variant tag byte followed by fixed-width big-endian scalars and
//! length-prefixed variable fields. It backs three things:
//!
//! - TTL key derivation (SHA-256 over an encoded key);
//! - size metering (encoded length stands in for on-disk entry size);
//! - success-preimage hashing for invoke results.
//!
//! It is not a wire format: nothing outside this repository parses it, and
//! there is deliberately no decoder.

use crate::entry::{Entry, EntryExt, EntryPayload};
use crate::event::{ContractEvent, EventType};
use crate::key::{AccountId, AssetCode, EntryKey};
use crate::val::Val;

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, b: &[u8]) {
    put_u32(out, b.len() as u32);
    out.extend_from_slice(b);
}

fn put_account(out: &mut Vec<u8>, id: &AccountId) {
    out.extend_from_slice(&id.0);
}

fn put_asset(out: &mut Vec<u8>, asset: &AssetCode) {
    out.extend_from_slice(&asset.code);
    put_account(out, &asset.issuer);
}

fn put_val(out: &mut Vec<u8>, val: &Val) {
    match val {
        Val::Void => out.push(0),
        Val::Bool(b) => {
            out.push(1);
            out.push(*b as u8);
        }
        Val::U32(v) => {
            out.push(2);
            put_u32(out, *v);
        }
        Val::U64(v) => {
            out.push(3);
            put_u64(out, *v);
        }
        Val::I64(v) => {
            out.push(4);
            put_i64(out, *v);
        }
        Val::Symbol(s) => {
            out.push(5);
            put_bytes(out, s.as_bytes());
        }
        Val::Bytes(b) => {
            out.push(6);
            put_bytes(out, b);
        }
        Val::Vec(items) => {
            out.push(7);
            put_u32(out, items.len() as u32);
            for item in items {
                put_val(out, item);
            }
        }
    }
}

fn put_key(out: &mut Vec<u8>, key: &EntryKey) {
    match key {
        EntryKey::Account { account_id } => {
            out.push(0);
            put_account(out, account_id);
        }
        EntryKey::Trustline { account_id, asset } => {
            out.push(1);
            put_account(out, account_id);
            put_asset(out, asset);
        }
        EntryKey::Offer { seller, offer_id } => {
            out.push(2);
            put_account(out, seller);
            put_i64(out, *offer_id);
        }
        EntryKey::Data { account_id, name } => {
            out.push(3);
            put_account(out, account_id);
            put_bytes(out, name.as_bytes());
        }
        EntryKey::ClaimableBalance { balance_id } => {
            out.push(4);
            out.extend_from_slice(balance_id.as_bytes());
        }
        EntryKey::ContractData {
            contract,
            key,
            durability,
        } => {
            out.push(5);
            out.extend_from_slice(contract.0.as_bytes());
            put_val(out, key);
            out.push(*durability as u8);
        }
        EntryKey::ContractCode { hash } => {
            out.push(6);
            out.extend_from_slice(hash.as_bytes());
        }
        EntryKey::Ttl { key_hash } => {
            out.push(7);
            out.extend_from_slice(key_hash.as_bytes());
        }
    }
}

fn put_payload(out: &mut Vec<u8>, payload: &EntryPayload) {
    match payload {
        EntryPayload::Account(e) => {
            out.push(0);
            put_account(out, &e.account_id);
            put_i64(out, e.balance);
            put_i64(out, e.seq_num);
            put_u32(out, e.num_sub_entries);
        }
        EntryPayload::Trustline(e) => {
            out.push(1);
            put_account(out, &e.account_id);
            put_asset(out, &e.asset);
            put_i64(out, e.balance);
            put_i64(out, e.limit);
        }
        EntryPayload::Offer(e) => {
            out.push(2);
            put_account(out, &e.seller);
            put_i64(out, e.offer_id);
            put_i64(out, e.amount);
            put_u32(out, e.price_n as u32);
            put_u32(out, e.price_d as u32);
        }
        EntryPayload::Data(e) => {
            out.push(3);
            put_account(out, &e.account_id);
            put_bytes(out, e.name.as_bytes());
            put_bytes(out, &e.value);
        }
        EntryPayload::ClaimableBalance(e) => {
            out.push(4);
            out.extend_from_slice(e.balance_id.as_bytes());
            put_i64(out, e.amount);
        }
        EntryPayload::ContractData(e) => {
            out.push(5);
            out.extend_from_slice(e.contract.0.as_bytes());
            put_val(out, &e.key);
            out.push(e.durability as u8);
            put_val(out, &e.val);
        }
        EntryPayload::ContractCode(e) => {
            out.push(6);
            out.extend_from_slice(e.hash.as_bytes());
            put_bytes(out, &e.code);
        }
        EntryPayload::Ttl(e) => {
            out.push(7);
            out.extend_from_slice(e.key_hash.as_bytes());
            put_u32(out, e.live_until_ledger_seq);
        }
    }
}

fn put_ext(out: &mut Vec<u8>, ext: &EntryExt) {
    match ext {
        EntryExt::V0 => out.push(0),
        EntryExt::V1 { sponsor } => {
            out.push(1);
            match sponsor {
                None => out.push(0),
                Some(id) => {
                    out.push(1);
                    put_account(out, id);
                }
            }
        }
    }
}

/// Encode a key to its canonical bytes.
pub fn encode_key(key: &EntryKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    put_key(&mut out, key);
    out
}

/// Encode an entry (payload, extension, last-modified) to canonical bytes.
pub fn encode_entry(entry: &Entry) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    put_u32(&mut out, entry.last_modified_ledger_seq);
    put_payload(&mut out, &entry.payload);
    put_ext(&mut out, &entry.ext);
    out
}

/// Encode a contract event to canonical bytes.
pub fn encode_event(event: &ContractEvent) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.push(match event.event_type {
        EventType::Contract => 0,
        EventType::System => 1,
        EventType::Diagnostic => 2,
    });
    match &event.contract_id {
        None => out.push(0),
        Some(id) => {
            out.push(1);
            out.extend_from_slice(id.0.as_bytes());
        }
    }
    put_u32(&mut out, event.topics.len() as u32);
    for topic in &event.topics {
        put_val(&mut out, topic);
    }
    put_val(&mut out, &event.data);
    out
}

/// Encode a value to canonical bytes.
pub fn encode_val(val: &Val) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    put_val(&mut out, val);
    out
}

/// Canonical encoded size of a key, used for key-byte metering.
pub fn key_size(key: &EntryKey) -> u32 {
    encode_key(key).len() as u32
}

/// Canonical encoded size of an entry, used for read/write-byte metering.
pub fn entry_size(entry: &Entry) -> u32 {
    encode_entry(entry).len() as u32
}

/// Canonical encoded size of an event, used for event-byte metering.
pub fn event_size(event: &ContractEvent) -> u32 {
    encode_event(event).len() as u32
}
