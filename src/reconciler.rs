use crate::error::{QueryError, QueryResult};
use crate::model::{Address, Bundle, Seed};
use crate::node::NodeApi;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Head transaction sits at `destination` and carries exactly `expected_value`.
pub fn matches_transfer(bundle: &Bundle, destination: &Address, expected_value: i64) -> bool {
    let head = bundle.head();
    head.address == *destination && head.value == expected_value
}

/* outcome of resolving one candidate hash */
enum Candidate {
    Matched(Bundle),
    Rejected,
    Unresolved,
}

struct Scan<'a> {
    destination: &'a Address,
    expected_value: i64,
    candidates: usize,
    skipped: usize,
}

impl<'a> Scan<'a> {
    fn new(destination: &'a Address, expected_value: i64, candidates: usize) -> Self {
        Self {
            destination,
            expected_value,
            candidates,
            skipped: 0,
        }
    }

    fn classify(&mut self, hash: &str, resolved: QueryResult<Vec<Bundle>>) -> Candidate {
        match resolved {
            Ok(bundles) => bundles
                .into_iter()
                .find(|bundle| matches_transfer(bundle, self.destination, self.expected_value))
                .map(Candidate::Matched)
                .unwrap_or(Candidate::Rejected),
            Err(err) => {
                tracing::warn!("skipping candidate {:?}: {}", hash, err);
                self.skipped += 1;
                Candidate::Unresolved
            }
        }
    }

    fn not_found(self) -> QueryError {
        QueryError::BundleNotFound {
            address: self.destination.to_string(),
            value: self.expected_value,
            candidates: self.candidates,
            skipped: self.skipped,
        }
    }
}

/// Finds the bundle of a past transfer of `expected_value` to `destination`.
///
/// Candidates are the transactions the node lists for `destination`, tried in
/// the order the node returned them; the first bundle whose head matches wins.
/// Candidates that fail to resolve are skipped.
pub async fn find_bundle(
    node: &dyn NodeApi,
    seed: &Seed,
    destination: &Address,
    expected_value: i64,
) -> QueryResult<Bundle> {
    let hashes = node.find_transactions(destination).await?;
    tracing::info!(
        "reconciling {}i to {} for account {}...: {} candidates",
        expected_value,
        destination,
        seed.short(),
        hashes.len()
    );

    let mut scan = Scan::new(destination, expected_value, hashes.len());
    for hash in hashes.iter() {
        let resolved = node.get_bundles(hash).await;
        match scan.classify(hash, resolved) {
            Candidate::Matched(bundle) => {
                tracing::debug!("bundle {} matched through {}", bundle.hash(), hash);
                return Ok(bundle);
            }
            Candidate::Rejected | Candidate::Unresolved => continue,
        }
    }
    Err(scan.not_found())
}

/// Same selection as [`find_bundle`], with candidate bundles resolved
/// concurrently. The winner is still picked by the node's hash order.
pub async fn find_bundle_concurrent(
    node: Arc<dyn NodeApi>,
    seed: &Seed,
    destination: &Address,
    expected_value: i64,
) -> QueryResult<Bundle> {
    let hashes = node.find_transactions(destination).await?;
    tracing::info!(
        "reconciling {}i to {} for account {}...: {} candidates, resolving concurrently",
        expected_value,
        destination,
        seed.short(),
        hashes.len()
    );

    let mut tasks = JoinSet::new();
    for (position, hash) in hashes.iter().cloned().enumerate() {
        let node = Arc::clone(&node);
        tasks.spawn(async move {
            let resolved = node.get_bundles(&hash).await;
            (position, resolved)
        });
    }

    let mut slots: Vec<Option<QueryResult<Vec<Bundle>>>> = hashes.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, resolved)) => slots[position] = Some(resolved),
            Err(err) => tracing::warn!("bundle resolution task failed: {}", err),
        }
    }

    let mut scan = Scan::new(destination, expected_value, hashes.len());
    let mut matched: Vec<Bundle> = Vec::new();
    for (hash, slot) in hashes.iter().zip(slots) {
        let resolved = slot.unwrap_or_else(|| {
            Err(QueryError::query_failure("getBundles", "resolution task aborted"))
        });
        if let Candidate::Matched(bundle) = scan.classify(hash, resolved) {
            matched.push(bundle);
        }
    }

    if matched.len() > 1 {
        // first-seen wins; only stable while the node keeps its hash order
        tracing::debug!(
            "{} bundles match {}i to {}, keeping {}",
            matched.len(),
            expected_value,
            destination,
            matched[0].hash()
        );
    }
    match matched.into_iter().next() {
        Some(bundle) => Ok(bundle),
        None => Err(scan.not_found()),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::QueryError;
    use crate::model::{Address, Seed};
    use crate::node::{MemoryNode, NodeApi};
    use crate::reconciler::{find_bundle, find_bundle_concurrent, matches_transfer};
    use crate::test_utils::{bundle, pad_address, tx_hash};
    use std::sync::Arc;

    const ACCOUNT_2_SEED: &str =
        "S9YOBZWUIHQFGHQCUOFCKHFR99IJMSZNNHUDXRAGDZKLGEBGPNDWROALSUODRJNMFFQHDVNISRMVMPVNE";
    const E9LVP: &str =
        "E9LVPMKJIAGCIPVKMUOYTQMSYAUQDUMEYUUCLXRQUWJJ9JXRDXQNGIOUPQVIMIWHFIRXD9QSYOP9KG9BW";

    fn seed() -> Seed {
        Seed::parse(ACCOUNT_2_SEED).unwrap()
    }

    fn invariants_hold(found: &crate::model::Bundle, destination: &Address, value: i64) {
        assert_eq!(found.len() as i64, found.last_index() + 1);
        for (index, trx) in found.transactions().iter().enumerate() {
            assert_eq!(trx.current_index, index as i64);
            assert_eq!(trx.bundle, found.hash());
        }
        assert_eq!(found.head().address, *destination);
        assert_eq!(found.head().value, value);
    }

    #[tokio::test]
    async fn finds_transfer_of_42() {
        let destination = Address::parse(&format!("{}ARSINOJ9W", E9LVP)).unwrap();
        let source = pad_address("ACCOUNTTWO");
        let remainder = pad_address("REMAINDER");
        let node = MemoryNode::new();
        node.add_bundle(bundle(
            "TRANSFER",
            &[
                (&destination, 42),
                (&source, -100),
                (&source, 0),
                (&remainder, 58),
            ],
        ));

        let found = find_bundle(&node, &seed(), &destination, 42).await.unwrap();
        invariants_hold(&found, &destination, 42);
        assert_eq!(found.last_index(), 3);
        assert_eq!(found.head().hash, tx_hash("TRANSFER", 0));
    }

    #[tokio::test]
    async fn funding_marker_is_told_apart_by_value() {
        let destination = pad_address("FWPSS");
        let source = pad_address("SOURCE");
        let node = MemoryNode::new();
        node.add_bundle(bundle("PAYMENT", &[(&destination, 7), (&source, -7)]));
        node.add_bundle(bundle("MARKER", &[(&destination, 0)]));

        let marker = find_bundle(&node, &seed(), &destination, 0).await.unwrap();
        invariants_hold(&marker, &destination, 0);
        assert_eq!(marker.hash(), crate::trytes::pad_trytes("MARKER", 81));

        let payment = find_bundle(&node, &seed(), &destination, 7).await.unwrap();
        assert_eq!(payment.hash(), crate::trytes::pad_trytes("PAYMENT", 81));
    }

    #[tokio::test]
    async fn first_seen_candidate_wins_ties() {
        let destination = pad_address("TARGET");
        let source = pad_address("SOURCE");
        let node = Arc::new(MemoryNode::new());
        node.add_bundle(bundle("FIRST", &[(&destination, 42), (&source, -42)]));
        node.add_bundle(bundle("SECOND", &[(&destination, 42), (&source, -42)]));

        for _ in 0..3 {
            let found = find_bundle(node.as_ref(), &seed(), &destination, 42)
                .await
                .unwrap();
            assert_eq!(found.hash(), crate::trytes::pad_trytes("FIRST", 81));
        }
        // the second candidate is never resolved
        assert_eq!(node.bundle_queries(), 3);

        let concurrent = find_bundle_concurrent(node.clone(), &seed(), &destination, 42)
            .await
            .unwrap();
        assert_eq!(concurrent.hash(), crate::trytes::pad_trytes("FIRST", 81));
    }

    #[tokio::test]
    async fn repeated_queries_are_identical() {
        let destination = pad_address("TARGET");
        let source = pad_address("SOURCE");
        let node = MemoryNode::new();
        node.add_bundle(bundle("ONLY", &[(&destination, 42), (&source, -42)]));

        let first = find_bundle(&node, &seed(), &destination, 42).await.unwrap();
        let second = find_bundle(&node, &seed(), &destination, 42).await.unwrap();
        assert_eq!(first.hash(), second.hash());
        assert_eq!(first.transaction_hashes(), second.transaction_hashes());
    }

    #[tokio::test]
    async fn no_transactions_means_not_found() {
        let node = MemoryNode::new();
        let destination = pad_address("NOBODY");
        let err = find_bundle(&node, &seed(), &destination, 42)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::BundleNotFound {
                address: destination.to_string(),
                value: 42,
                candidates: 0,
                skipped: 0,
            }
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_node_is_a_query_failure() {
        let node = MemoryNode::new();
        node.set_offline(true);
        let err = find_bundle(&node, &seed(), &pad_address("TARGET"), 42)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::QueryFailure { .. }));
    }

    #[tokio::test]
    async fn unresolvable_candidates_are_skipped() {
        let destination = pad_address("TARGET");
        let source = pad_address("SOURCE");
        let node = Arc::new(MemoryNode::new());
        node.add_orphan_hash(&destination, "ORPHAN");
        node.add_bundle(bundle("BROKEN", &[(&destination, 42), (&source, -42)]));
        node.fail_bundle_query(&tx_hash("BROKEN", 0));
        node.add_bundle(bundle("GOOD", &[(&destination, 42), (&source, -42)]));

        let hashes = node.find_transactions(&destination).await.unwrap();
        assert_eq!(hashes.len(), 3);

        let found = find_bundle(node.as_ref(), &seed(), &destination, 42)
            .await
            .unwrap();
        assert_eq!(found.hash(), crate::trytes::pad_trytes("GOOD", 81));
        let concurrent = find_bundle_concurrent(node.clone(), &seed(), &destination, 42)
            .await
            .unwrap();
        assert_eq!(concurrent, found);
    }

    #[tokio::test]
    async fn non_tail_and_failing_candidates_count_as_skipped() {
        let destination = pad_address("TARGET");
        let source = pad_address("SOURCE");
        let node = MemoryNode::new();
        // destination only appears as a non-tail transaction
        node.add_bundle(bundle("INNER", &[(&source, -42), (&destination, 42)]));

        let err = find_bundle(&node, &seed(), &destination, 42)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::BundleNotFound {
                candidates: 1,
                skipped: 1,
                ..
            }
        ));
    }

    #[test]
    fn predicate_is_strict() {
        let destination = pad_address("TARGET");
        let source = pad_address("SOURCE");
        let transfer = bundle("PAYMENT", &[(&destination, 42), (&source, -42)]);
        assert!(matches_transfer(&transfer, &destination, 42));
        assert!(!matches_transfer(&transfer, &destination, 0));
        assert!(!matches_transfer(&transfer, &source, -42));
    }
}
