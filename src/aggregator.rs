use crate::error::{QueryError, QueryResult};
use crate::model::{AccountSnapshot, Bundle, Seed};
use crate::node::{AccountData, NodeApi};

/// Point-in-time view of the first `horizon` addresses of `seed`.
///
/// Nothing is returned unless every query succeeds and the node answers with
/// exactly one address (and one balance) per derivation index.
pub async fn aggregate(
    node: &dyn NodeApi,
    seed: &Seed,
    horizon: usize,
) -> QueryResult<AccountSnapshot> {
    if horizon == 0 {
        return Err(QueryError::InvalidInput(
            "horizon must be at least 1".to_string(),
        ));
    }
    tracing::info!("aggregating account {}... over {} addresses", seed.short(), horizon);

    let AccountData {
        balance,
        addresses,
        bundles,
    } = node.get_account_data(seed, horizon).await?;
    if addresses.len() != horizon {
        return Err(QueryError::query_failure(
            "getAccountData",
            format!(
                "expected {} addresses, node returned {}",
                horizon,
                addresses.len()
            ),
        ));
    }

    let balances = node.get_balances(&addresses).await?;
    if balances.len() != addresses.len() {
        return Err(QueryError::query_failure(
            "getBalances",
            format!(
                "asked for {} balances, got {}",
                addresses.len(),
                balances.len()
            ),
        ));
    }

    let mut ordered = Vec::with_capacity(horizon);
    for (index, (address, address_balance)) in addresses.into_iter().zip(balances).enumerate() {
        if address.key_index.map_or(false, |key_index| key_index != index as u64) {
            return Err(QueryError::query_failure(
                "getAccountData",
                format!("address {} is out of derivation order", address),
            ));
        }
        ordered.push(
            address
                .with_key_index(index as u64)
                .with_balance(address_balance),
        );
    }

    tracing::debug!(
        "account {}... holds {} over {} bundles",
        seed.short(),
        balance,
        bundles.len()
    );
    Ok(AccountSnapshot {
        seed: seed.clone(),
        balance,
        addresses: ordered,
        bundles,
    })
}

pub async fn account_bundles(
    node: &dyn NodeApi,
    seed: &Seed,
    horizon: usize,
) -> QueryResult<Vec<Bundle>> {
    Ok(aggregate(node, seed, horizon).await?.bundles)
}

#[cfg(test)]
mod tests {
    use crate::aggregator::{account_bundles, aggregate};
    use crate::error::QueryError;
    use crate::model::Seed;
    use crate::node::{AccountData, MemoryNode};
    use crate::test_utils::{bundle, pad_address};

    fn account_node(seed: &Seed) -> MemoryNode {
        let node = MemoryNode::new();
        let addresses: Vec<_> = ["ADDRA", "ADDRB", "ADDRC"]
            .iter()
            .map(|prefix| pad_address(prefix))
            .collect();
        node.set_balance(&addresses[0], 100);
        node.set_balance(&addresses[2], 58);
        let funding = bundle(
            "FUNDING",
            &[(&addresses[0], 100), (&pad_address("GENESIS"), -100)],
        );
        node.set_account(
            seed,
            AccountData {
                balance: 158,
                addresses,
                bundles: vec![funding],
            },
        );
        node
    }

    #[tokio::test]
    async fn returns_horizon_addresses_in_order() {
        let seed = Seed::parse("SEEDA").unwrap();
        let node = account_node(&seed);

        let snapshot = aggregate(&node, &seed, 3).await.unwrap();
        assert_eq!(snapshot.balance, 158);
        assert_eq!(snapshot.addresses.len(), 3);
        for (index, address) in snapshot.addresses.iter().enumerate() {
            assert_eq!(address.key_index, Some(index as u64));
            assert_eq!(address.hash().len(), 81);
        }
        let balances: Vec<_> = snapshot
            .addresses
            .iter()
            .map(|address| address.balance)
            .collect();
        assert_eq!(balances, vec![Some(100), Some(0), Some(58)]);
        assert_eq!(snapshot.bundles.len(), 1);

        let shorter = aggregate(&node, &seed, 2).await.unwrap();
        assert_eq!(shorter.addresses, snapshot.addresses[..2].to_vec());
    }

    #[tokio::test]
    async fn zero_horizon_is_rejected() {
        let seed = Seed::parse("SEEDA").unwrap();
        let node = account_node(&seed);
        assert!(matches!(
            aggregate(&node, &seed, 0).await,
            Err(QueryError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn short_answer_is_a_query_failure() {
        let seed = Seed::parse("SEEDA").unwrap();
        let node = account_node(&seed);
        let err = aggregate(&node, &seed, 4).await.unwrap_err();
        assert!(err.is_retryable(), "{:?}", err);
    }

    #[tokio::test]
    async fn unreachable_node_yields_no_snapshot() {
        let seed = Seed::parse("SEEDA").unwrap();
        let node = account_node(&seed);
        node.set_offline(true);
        assert!(matches!(
            aggregate(&node, &seed, 3).await,
            Err(QueryError::QueryFailure { .. })
        ));
        assert!(account_bundles(&node, &seed, 3).await.is_err());
    }
}
