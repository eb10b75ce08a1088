use crate::model::{empty_signature_fragment, Address, Bundle, Transaction};
use crate::trytes::pad_trytes;

pub(crate) fn pad_address(prefix: &str) -> Address {
    Address::parse(&pad_trytes(prefix, 81)).unwrap()
}

pub(crate) fn tx_hash(bundle_prefix: &str, index: i64) -> String {
    let index = (b'A' + index as u8) as char;
    pad_trytes(&format!("{}TX{}", bundle_prefix, index), 81)
}

pub(crate) fn transaction(
    bundle_prefix: &str,
    current_index: i64,
    last_index: i64,
    address: &Address,
    value: i64,
) -> Transaction {
    let trunk = if current_index < last_index {
        tx_hash(bundle_prefix, current_index + 1)
    } else {
        pad_trytes("TRUNK", 81)
    };
    let mut trx = Transaction {
        hash: tx_hash(bundle_prefix, current_index),
        signature_fragment: empty_signature_fragment(),
        address: address.clone(),
        value,
        obsolete_tag: pad_trytes("", 27),
        timestamp: 1_526_000_000,
        current_index,
        last_index,
        bundle: pad_trytes(bundle_prefix, 81),
        trunk,
        branch: pad_trytes("BRANCH", 81),
        tag: pad_trytes("PACIFICSOUND", 27),
        attachment_timestamp: 1_526_000_000_000,
        attachment_timestamp_lower_bound: 0,
        attachment_timestamp_upper_bound: 3_812_798_742_493,
        nonce: pad_trytes("NONCE", 27),
        trytes: String::new(),
    };
    trx.trytes = trx.encode().unwrap();
    trx
}

/// Builds a valid bundle whose transaction `i` carries `legs[i]`.
pub(crate) fn bundle(bundle_prefix: &str, legs: &[(&Address, i64)]) -> Bundle {
    let last_index = legs.len() as i64 - 1;
    let transactions = legs
        .iter()
        .enumerate()
        .map(|(index, (address, value))| {
            transaction(bundle_prefix, index as i64, last_index, address, *value)
        })
        .collect();
    Bundle::new(transactions).unwrap()
}
