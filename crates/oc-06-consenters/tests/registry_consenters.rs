//! # Consenters Behind the Registry
//!
//! Runs the real consenters under `MultiChainRegistry`: broadcast in, blocks
//! out through deliver, chain creation switching consensus type.

use oc_03_ledger::RamLedgerFactory;
use oc_05_multichain::{
    creation_envelope, seek_envelope, BroadcastHandler, BroadcastStatus, Consenter,
    DeliverHandler, GenesisBlockFactory, MultiChainRegistry, SeekBehavior, SeekInfo, SeekStart,
};
use oc_06_consenters::{LocalQuorum, QuorumConsenter, ReplicaSet, SoloConsenter, QUORUM, SOLO};
use shared_crypto::{create_signed_envelope, LocalSigner};
use shared_types::{policy_names, BatchSize, BlockMetadataIndex, ChainConfig, HeaderType, PolicyDefinition};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn chain_config(chain_id: &str, consensus_type: &str, admin: &LocalSigner) -> ChainConfig {
    let admin_key = *admin.public_key().as_bytes();
    let mut policies = BTreeMap::new();
    policies.insert(policy_names::WRITERS.to_string(), PolicyDefinition::AnySignature);
    policies.insert(
        policy_names::ADMINS.to_string(),
        PolicyDefinition::NOutOf {
            n: 1,
            identities: vec![admin_key],
        },
    );
    policies.insert(
        policy_names::CHAIN_CREATORS.to_string(),
        PolicyDefinition::NOutOf {
            n: 1,
            identities: vec![admin_key],
        },
    );
    ChainConfig {
        chain_id: chain_id.to_string(),
        sequence: 0,
        consensus_type: consensus_type.to_string(),
        batch_size: BatchSize {
            max_message_count: 2,
            ..BatchSize::default()
        },
        batch_timeout_ms: 50,
        ingress_policy: policy_names::WRITERS.into(),
        egress_policy: String::new(),
        modification_policy: policy_names::ADMINS.into(),
        chain_creation_policies: vec![],
        creation_policy: Some(policy_names::CHAIN_CREATORS.into()),
        policies,
    }
}

struct Orderer {
    admin: LocalSigner,
    registry: MultiChainRegistry,
    broadcast: BroadcastHandler,
    deliver: DeliverHandler,
}

fn orderer() -> Orderer {
    let admin = LocalSigner::generate();
    let mut system = chain_config("system", SOLO, &admin);
    system.creation_policy = None;
    system.chain_creation_policies = vec![policy_names::CHAIN_CREATORS.to_string()];

    let factory = Arc::new(RamLedgerFactory::new(1_000));
    let genesis = GenesisBlockFactory::from_config(&system, &[&admin], &admin)
        .unwrap()
        .block()
        .unwrap();
    MultiChainRegistry::bootstrap(factory.as_ref(), genesis).unwrap();

    let quorum = Arc::new(LocalQuorum::generate(4));
    let replicas = ReplicaSet::new(quorum.identities()).unwrap();
    let mut consenters: HashMap<String, Arc<dyn Consenter>> = HashMap::new();
    consenters.insert(SOLO.into(), Arc::new(SoloConsenter));
    consenters.insert(QUORUM.into(), Arc::new(QuorumConsenter::new(quorum, replicas)));

    let registry =
        MultiChainRegistry::new(factory, consenters, Arc::new(LocalSigner::generate())).unwrap();
    Orderer {
        admin,
        broadcast: BroadcastHandler::new(registry.clone()),
        deliver: DeliverHandler::new(registry.clone()),
        registry,
    }
}

fn from_oldest() -> SeekInfo {
    SeekInfo {
        start: SeekStart::Oldest,
        stop: None,
        behavior: SeekBehavior::BlockUntilReady,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn test_solo_broadcast_then_deliver() {
    let node = orderer();
    let request = seek_envelope("system", &from_oldest(), &node.admin).unwrap();
    let mut cursor = node.deliver.deliver(&request).unwrap();
    assert_eq!(cursor.next().await.unwrap().unwrap().number(), 0);

    for body in [b"one", b"two"] {
        let env =
            create_signed_envelope(HeaderType::Message, "system", body.to_vec(), &node.admin)
                .unwrap();
        assert_eq!(node.broadcast.handle(env), BroadcastStatus::Success);
    }

    let block = tokio::time::timeout(Duration::from_secs(5), cursor.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(block.number(), 1);
    assert_eq!(block.data.envelopes.len(), 2);
    assert!(block.metadata(BlockMetadataIndex::Signatures).is_ok());

    node.registry.halt_all().await;
}

#[tokio::test]
async fn test_runtime_created_chain_runs_on_quorum() {
    let node = orderer();
    let config = chain_config("ledger-b", QUORUM, &node.admin);
    let config_tx = GenesisBlockFactory::from_config(&config, &[&node.admin], &node.admin)
        .unwrap()
        .config_tx()
        .clone();
    let request = creation_envelope(&config_tx, "system", &node.admin).unwrap();
    assert_eq!(node.broadcast.handle(request), BroadcastStatus::Success);

    // The creation block is cut by the solo timer on the system chain
    let mut created = None;
    for _ in 0..100 {
        created = node.registry.get_chain("ledger-b");
        if created.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(created.is_some(), "chain was never created");

    let env =
        create_signed_envelope(HeaderType::Message, "ledger-b", b"tx".to_vec(), &node.admin)
            .unwrap();
    assert_eq!(node.broadcast.handle(env), BroadcastStatus::Success);

    let request = seek_envelope("ledger-b", &from_oldest(), &node.admin).unwrap();
    let mut cursor = node.deliver.deliver(&request).unwrap();
    assert_eq!(cursor.next().await.unwrap().unwrap().number(), 0);
    let block = tokio::time::timeout(Duration::from_secs(5), cursor.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(block.metadata(BlockMetadataIndex::Orderer).is_ok());

    node.registry.halt_all().await;
}
