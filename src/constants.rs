use crate::derivation::AddressDeriver;
use crate::model::{empty_signature_fragment, AccountSnapshot, Address, Bundle};
use itertools::Itertools;
use std::fmt::Write;

const BANNER: &str = "//
// MIT License
//
// Generated by gen_constants from a running node. Do not edit by hand.
//

#pragma once

#include <string>
";

const FRAGMENT_LINE_LENGTH: usize = 94;

/// A reconciled transfer, printed as `BUNDLE_<n>_*`.
#[derive(Debug, Clone)]
pub struct TransferBundle {
    pub label: String,
    pub bundle: Bundle,
}

/// Bundles of a configured account, `account` is 1-based.
#[derive(Debug, Clone)]
pub struct AccountBundles {
    pub account: usize,
    pub bundles: Vec<Bundle>,
}

#[derive(Debug, Clone, Copy)]
pub struct Constants<'a> {
    pub accounts: &'a [AccountSnapshot],
    pub transfers: &'a [TransferBundle],
    pub account_bundles: &'a [AccountBundles],
    pub pow_level: u32,
}

/// Best known checksummed form of `address`, falling back to the raw hash.
fn checksummed(address: &Address, deriver: &dyn AddressDeriver) -> String {
    if address.checksum().is_some() {
        return address.with_checksum();
    }
    match deriver.checksum(address) {
        Some(resolved) => resolved.with_checksum(),
        None => {
            tracing::debug!("no checksum known for {}", address);
            address.hash().to_string()
        }
    }
}

fn string_const(out: &mut String, name: &str, value: &str) -> std::fmt::Result {
    writeln!(out, "static const std::string {} = \"{}\";", name, value)
}

fn int_const(out: &mut String, name: &str, value: i64) -> std::fmt::Result {
    writeln!(out, "static const int64_t {} = {};", name, value)
}

fn section(out: &mut String, lines: &[&str]) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "//!")?;
    for line in lines {
        writeln!(out, "//! {}", line)?;
    }
    writeln!(out, "//!")
}

fn render_account(
    out: &mut String,
    number: usize,
    snapshot: &AccountSnapshot,
    deriver: &dyn AddressDeriver,
) -> std::fmt::Result {
    section(out, &[&format!("Account {}", number)])?;
    string_const(out, &format!("ACCOUNT_{}_SEED", number), snapshot.seed.as_str())?;
    int_const(out, &format!("ACCOUNT_{}_FUND", number), snapshot.balance)?;

    for (index, address) in snapshot.addresses.iter().enumerate() {
        let prefix = format!("ACCOUNT_{}_ADDRESS_{}", number, index + 1);
        writeln!(out)?;
        string_const(out, &format!("{}_HASH", prefix), &checksummed(address, deriver))?;
        string_const(
            out,
            &format!("{}_HASH_WITHOUT_CHECKSUM", prefix),
            address.hash(),
        )?;
        int_const(out, &format!("{}_FUND", prefix), address.balance.unwrap_or(0))?;
    }
    Ok(())
}

fn render_transfer(
    out: &mut String,
    number: usize,
    transfer: &TransferBundle,
    deriver: &dyn AddressDeriver,
) -> std::fmt::Result {
    section(out, &[&format!("Bundle {}", number), &transfer.label])?;
    string_const(out, &format!("BUNDLE_{}_HASH", number), transfer.bundle.hash())?;

    for (index, trx) in transfer.bundle.transactions().iter().enumerate() {
        let prefix = format!("BUNDLE_{}_TRX_{}", number, index + 1);
        writeln!(out)?;
        string_const(out, &format!("{}_HASH", prefix), &trx.hash)?;
        string_const(
            out,
            &format!("{}_ADDRESS", prefix),
            &checksummed(&trx.address, deriver),
        )?;
        string_const(
            out,
            &format!("{}_ADDRESS_WITHOUT_CHECKSUM", prefix),
            trx.address.hash(),
        )?;
        string_const(out, &format!("{}_TRYTES", prefix), &trx.trytes)?;
        string_const(
            out,
            &format!("{}_SIGNATURE_FRAGMENT", prefix),
            &trx.signature_fragment,
        )?;
        int_const(out, &format!("{}_CURRENT_INDEX", prefix), trx.current_index)?;
        int_const(out, &format!("{}_LAST_INDEX", prefix), trx.last_index)?;
        string_const(out, &format!("{}_NONCE", prefix), &trx.nonce)?;
        string_const(out, &format!("{}_TAG", prefix), &trx.tag)?;
        int_const(out, &format!("{}_TS", prefix), trx.timestamp)?;
        string_const(out, &format!("{}_TRUNK", prefix), &trx.trunk)?;
        string_const(out, &format!("{}_BRANCH", prefix), &trx.branch)?;
        int_const(out, &format!("{}_VALUE", prefix), trx.value)?;
    }
    Ok(())
}

fn render_account_bundles(out: &mut String, listing: &AccountBundles) -> std::fmt::Result {
    section(
        out,
        &[&format!("Account {} Detailed transactions", listing.account)],
    )?;
    for (bundle_index, bundle) in listing.bundles.iter().enumerate() {
        for (trx_index, trx) in bundle.transactions().iter().enumerate() {
            writeln!(out)?;
            string_const(
                out,
                &format!(
                    "ACCOUNT_{}_BUNDLE_{}_TRX_{}_TRYTES",
                    listing.account,
                    bundle_index + 1,
                    trx_index + 1
                ),
                &trx.trytes,
            )?;
        }
    }
    Ok(())
}

fn render_misc(out: &mut String, pow_level: u32) -> std::fmt::Result {
    section(out, &["Misc"])?;
    let fragment = empty_signature_fragment();
    let lines = fragment
        .as_bytes()
        .chunks(FRAGMENT_LINE_LENGTH)
        .map(|chunk| format!("    \"{}\"", String::from_utf8_lossy(chunk)))
        .join("\n");
    writeln!(out)?;
    writeln!(out, "static const std::string EMPTY_SIGNATURE_FRAGMENT =")?;
    writeln!(out, "{};", lines)?;
    writeln!(out)?;
    writeln!(out, "static const int POW_LEVEL = {};", pow_level)
}

/// Renders the C++ constants header. Identical inputs give identical output.
pub fn render(constants: &Constants, deriver: &dyn AddressDeriver) -> anyhow::Result<String> {
    let mut out = String::from(BANNER);
    for (index, snapshot) in constants.accounts.iter().enumerate() {
        render_account(&mut out, index + 1, snapshot, deriver)?;
    }
    for (index, transfer) in constants.transfers.iter().enumerate() {
        render_transfer(&mut out, index + 1, transfer, deriver)?;
    }
    for listing in constants.account_bundles.iter() {
        render_account_bundles(&mut out, listing)?;
    }
    render_misc(&mut out, constants.pow_level)?;
    Ok(out)
}
