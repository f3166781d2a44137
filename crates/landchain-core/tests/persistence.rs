use landchain_core::{valid_chain, Blockchain, ChainError, ChainStore, LandRecord};
use tempfile::tempdir;

const DIFFICULTY: u32 = 1;

#[test]
fn open_creates_and_persists_genesis() {
    let dir = tempdir().unwrap();
    let store = ChainStore::new(dir.path().join("chain_data.json"));

    let chain = Blockchain::open(store.clone(), DIFFICULTY).unwrap();
    assert_eq!(chain.len(), 1);

    let snapshot = store.load().unwrap().expect("genesis persisted");
    assert_eq!(snapshot.chain, chain.blocks());
}

#[test]
fn reopen_restores_chain_pending_and_nodes() {
    let dir = tempdir().unwrap();
    let store = ChainStore::new(dir.path().join("chain_data.json"));

    let (blocks, pending) = {
        let mut chain = Blockchain::open(store.clone(), DIFFICULTY).unwrap();
        chain
            .new_transaction(LandRecord::new("P-1", "Budi", "Sari", "Bandung"))
            .unwrap();
        chain.mine("node-a").unwrap();
        chain
            .new_transaction(LandRecord::new("P-2", "Ayu", "Rina", "Bogor"))
            .unwrap();
        chain.register_node("http://127.0.0.1:5001").unwrap();
        (chain.blocks().to_vec(), chain.pending().to_vec())
    };

    let reopened = Blockchain::open(store, DIFFICULTY).unwrap();
    assert_eq!(reopened.blocks(), blocks.as_slice());
    assert_eq!(reopened.pending(), pending.as_slice());
    assert!(reopened.nodes().contains("127.0.0.1:5001"));
}

#[test]
fn corrupt_file_falls_back_to_fresh_genesis() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chain_data.json");
    std::fs::write(&path, b"{\"chain\": [").unwrap();

    let chain = Blockchain::open(ChainStore::new(&path), DIFFICULTY).unwrap();
    assert_eq!(chain.len(), 1);

    let reloaded = ChainStore::new(&path).load().unwrap().unwrap();
    assert!(valid_chain(&reloaded.chain, DIFFICULTY).is_ok());
    assert_eq!(
        std::fs::read(path.with_extension("json.corrupt")).unwrap(),
        b"{\"chain\": ["
    );
}

#[test]
fn tampered_file_falls_back_to_fresh_genesis() {
    let dir = tempdir().unwrap();
    let store = ChainStore::new(dir.path().join("chain_data.json"));
    {
        let mut chain = Blockchain::open(store.clone(), DIFFICULTY).unwrap();
        chain
            .new_transaction(LandRecord::new("P-1", "Budi", "Sari", "Bandung"))
            .unwrap();
        chain.mine("node-a").unwrap();
    }

    let mut snapshot = store.load().unwrap().unwrap();
    snapshot.chain[1].data.records[0].pemilik_baru = "Mallory".into();
    store.save(&snapshot).unwrap();

    let chain = Blockchain::open(store.clone(), DIFFICULTY).unwrap();
    assert_eq!(chain.len(), 1);
    assert!(store.path().with_extension("json.corrupt").exists());
}

#[test]
fn raising_difficulty_refuses_to_open_and_keeps_file() {
    let dir = tempdir().unwrap();
    let store = ChainStore::new(dir.path().join("chain_data.json"));
    {
        let mut chain = Blockchain::open(store.clone(), DIFFICULTY).unwrap();
        for _ in 0..3 {
            chain.mine("node-a").unwrap();
        }
    }
    let before = std::fs::read(store.path()).unwrap();

    // block 2 is mined with proof 3, whose digest has a single leading zero
    let err = Blockchain::open(store.clone(), 2).unwrap_err();
    assert!(matches!(
        err,
        ChainError::BelowDifficulty {
            index: 2,
            difficulty: 2,
            ..
        }
    ));
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
    assert!(!store.path().with_extension("json.corrupt").exists());

    assert_eq!(Blockchain::open(store, DIFFICULTY).unwrap().len(), 4);
}

#[test]
fn failed_save_leaves_ledger_unchanged() {
    let dir = tempdir().unwrap();
    let store = ChainStore::new(dir.path().join("chain_data.json"));
    let mut chain = Blockchain::open(store.clone(), DIFFICULTY).unwrap();
    let genesis = chain.blocks().to_vec();

    let blocker = store.path().with_extension("json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let record = LandRecord::new("P-1", "Budi", "Sari", "Bandung");
    assert!(matches!(
        chain.new_transaction(record.clone()),
        Err(ChainError::Store(_))
    ));
    assert!(chain.pending().is_empty());

    assert!(chain.mine("node-a").is_err());
    assert_eq!(chain.blocks(), genesis.as_slice());

    assert!(chain.register_node("127.0.0.1:5001").is_err());
    assert!(chain.nodes().is_empty());

    let longer = Blockchain::new(DIFFICULTY)
        .and_then(|mut other| other.mine("peer").map(|_| other))
        .unwrap();
    assert!(chain.replace_chain(longer.blocks().to_vec()).is_err());
    assert_eq!(chain.blocks(), genesis.as_slice());

    // once the disk recovers, a retry queues the record exactly once
    std::fs::remove_dir(&blocker).unwrap();
    assert_eq!(chain.new_transaction(record).unwrap(), 2);
    assert_eq!(chain.pending().len(), 1);
    let stored = store.load().unwrap().unwrap();
    assert_eq!(stored.pending, chain.pending());
    assert_eq!(stored.chain, genesis);
}
