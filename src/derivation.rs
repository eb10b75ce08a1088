use crate::error::{QueryError, QueryResult};
use crate::model::{Address, Seed};
use std::collections::HashMap;

/// Key derivation boundary: seed + index + security level to address, and
/// checksum lookup for addresses the deriver knows about.
pub trait AddressDeriver: Send + Sync {
    fn derive(&self, seed: &Seed, index: u64, security: u8) -> QueryResult<Address>;

    fn checksum(&self, address: &Address) -> Option<Address>;
}

/// Addresses derived ahead of time and listed per seed, in derivation order.
#[derive(Default, Clone, Debug)]
pub struct AddressBook {
    by_seed: HashMap<Seed, Vec<Address>>,
    checksums: HashMap<Address, String>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, seed: &Seed, addresses: Vec<Address>) {
        for address in addresses.iter() {
            if let Some(checksum) = address.checksum() {
                self.checksums
                    .insert(address.clone(), checksum.to_string());
            }
        }
        self.by_seed.entry(seed.clone()).or_default().extend(addresses);
    }
}

impl AddressDeriver for AddressBook {
    fn derive(&self, seed: &Seed, index: u64, security: u8) -> QueryResult<Address> {
        let address = self
            .by_seed
            .get(seed)
            .and_then(|addresses| addresses.get(index as usize))
            .ok_or_else(|| {
                QueryError::InvalidInput(format!(
                    "no address listed for seed {}... at index {}",
                    seed.short(),
                    index
                ))
            })?;
        Ok(address
            .clone()
            .with_key_index(index)
            .with_security_level(security))
    }

    fn checksum(&self, address: &Address) -> Option<Address> {
        let checksum = self.checksums.get(address)?;
        Address::parse(&format!("{}{}", address.hash(), checksum)).ok()
    }
}
