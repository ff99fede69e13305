//! Integration tests for the wallet manager
//!
//! These tests validate the manager against a real temporary wallet directory:
//! - Wallet name validation
//! - Create / lock / unlock lifecycle and auto-open on unlock
//! - Sliding unlock timeout (manual clock)
//! - Key aggregation and first-match-wins signing
//! - Wallet directory lock exclusivity

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tt_wallet_manager::{
    Action, ChainId, Clock, Hash32, KdfParams, KeyType, PrivateKey, PublicKey, SignedTransaction,
    Signature, Transaction, WalletApi, WalletError, WalletManager, WalletManagerConfig,
    UNLOCKED_MARKER,
};

/* =========================================================================================
 * HELPERS
 * ====================================================================================== */

#[derive(Clone)]
struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        )))
    }

    fn advance(&self, secs: u64) {
        let mut now = self.0.lock().unwrap();
        *now += chrono::Duration::from_std(Duration::from_secs(secs)).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn config(dir: &Path) -> WalletManagerConfig {
    WalletManagerConfig::default()
        .with_wallet_dir(dir)
        .with_unlock_timeout(None)
        .with_kdf(KdfParams::light())
        .with_platform_probe(false)
}

fn manager(dir: &Path) -> WalletManager {
    WalletManager::new(config(dir)).unwrap()
}

fn manager_with_clock(dir: &Path, clock: &ManualClock) -> WalletManager {
    WalletManager::with_clock(config(dir), Arc::new(clock.clone())).unwrap()
}

/// In-memory wallet that counts signing attempts
struct CountingWallet {
    keys: BTreeMap<PublicKey, PrivateKey>,
    locked: bool,
    sign_calls: Arc<AtomicUsize>,
}

impl CountingWallet {
    fn with_key(key: PrivateKey, sign_calls: Arc<AtomicUsize>) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(key.public_key().clone(), key);
        Self {
            keys,
            locked: false,
            sign_calls,
        }
    }
}

impl WalletApi for CountingWallet {
    fn set_password(&mut self, _password: &str) -> tt_wallet_manager::Result<()> {
        Ok(())
    }
    fn check_password(&self, password: &str) -> tt_wallet_manager::Result<()> {
        if password == "pw" {
            Ok(())
        } else {
            Err(WalletError::BadPassword)
        }
    }
    fn unlock(&mut self, password: &str) -> tt_wallet_manager::Result<()> {
        self.check_password(password)?;
        self.locked = false;
        Ok(())
    }
    fn lock(&mut self) {
        self.locked = true;
    }
    fn is_locked(&self) -> bool {
        self.locked
    }
    fn list_keys(&self) -> tt_wallet_manager::Result<BTreeMap<PublicKey, PrivateKey>> {
        Ok(self.keys.clone())
    }
    fn list_public_keys(&self) -> tt_wallet_manager::Result<BTreeSet<PublicKey>> {
        Ok(self.keys.keys().cloned().collect())
    }
    fn import_key(&mut self, key: PrivateKey) -> tt_wallet_manager::Result<PublicKey> {
        let pk = key.public_key().clone();
        self.keys.insert(pk.clone(), key);
        Ok(pk)
    }
    fn remove_key(&mut self, key: &PublicKey) -> tt_wallet_manager::Result<()> {
        self.keys.remove(key);
        Ok(())
    }
    fn create_key(&mut self, key_type: KeyType) -> tt_wallet_manager::Result<PublicKey> {
        self.import_key(PrivateKey::generate(key_type))
    }
    fn try_sign_digest(
        &self,
        digest: &Hash32,
        key: &PublicKey,
    ) -> tt_wallet_manager::Result<Option<Signature>> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        match self.keys.get(key) {
            Some(k) if !self.locked => k.sign(digest).map(Some),
            _ => Ok(None),
        }
    }
    fn load_wallet_file(&mut self) -> tt_wallet_manager::Result<()> {
        Ok(())
    }
    fn save_wallet_file(&mut self) -> tt_wallet_manager::Result<()> {
        Ok(())
    }
}

fn sample_tx() -> SignedTransaction {
    SignedTransaction::new(Transaction {
        expiration: 1_717_243_200,
        ref_block_num: 7,
        actions: vec![Action {
            name: "transfer".into(),
            data: b"alice->bob:10".to_vec(),
        }],
        fee: 1,
        nonce: 99,
    })
}

/* =========================================================================================
 * NAME VALIDATION
 * ====================================================================================== */

#[test]
fn test_invalid_names_rejected_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());

    for name in ["", "a/b", "a\\b", "..", "../escape", "sp ace", "x:y"] {
        assert!(
            matches!(mgr.create(name), Err(WalletError::InvalidName(_))),
            "create({name:?})"
        );
        assert!(
            matches!(mgr.open(name), Err(WalletError::InvalidName(_))),
            "open({name:?})"
        );
    }
    assert!(!dir.path().join("escape.wallet").exists());
}

#[test]
fn test_valid_names_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    for name in ["alice", "Bob_2", "node-1.hot", "x"] {
        mgr.create(name).unwrap();
        assert!(dir.path().join(format!("{name}.wallet")).is_file());
    }
}

/* =========================================================================================
 * LIFECYCLE
 * ====================================================================================== */

#[test]
fn test_create_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());

    let password = mgr.create("alice").unwrap();
    assert!(password.starts_with("PW"));
    assert_eq!(mgr.list_wallets(), vec![format!("alice{}", UNLOCKED_MARKER)]);

    mgr.lock("alice").unwrap();
    assert_eq!(mgr.list_wallets(), vec!["alice".to_string()]);
    mgr.unlock("alice", &password).unwrap();
    assert_eq!(mgr.list_wallets(), vec!["alice *".to_string()]);
}

#[test]
fn test_double_create_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    mgr.create("alice").unwrap();
    assert!(matches!(
        mgr.create("alice"),
        Err(WalletError::WalletAlreadyExists { .. })
    ));

    // a second manager sees the file too
    let mut other = manager(dir.path());
    assert!(matches!(
        other.create("alice"),
        Err(WalletError::WalletAlreadyExists { .. })
    ));
}

#[test]
fn test_open_missing_wallet_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    assert!(matches!(
        mgr.open("ghost"),
        Err(WalletError::WalletNonexistent(_))
    ));
    assert!(mgr.list_wallets().is_empty());
}

#[test]
fn test_open_leaves_wallet_locked() {
    let dir = tempfile::tempdir().unwrap();
    let password = manager(dir.path()).create("carol").unwrap();

    let mut mgr = manager(dir.path());
    mgr.open("carol").unwrap();
    assert_eq!(mgr.list_wallets(), vec!["carol".to_string()]);
    assert!(matches!(
        mgr.get_public_keys(),
        Err(WalletError::AllWalletsLocked)
    ));
    mgr.unlock("carol", &password).unwrap();
    assert!(matches!(
        mgr.unlock("carol", &password),
        Err(WalletError::WalletAlreadyUnlocked(_))
    ));
}

#[test]
fn test_open_replaces_registered_wallet() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let password = mgr.create("alice").unwrap();
    mgr.create("bob").unwrap();
    assert_eq!(mgr.list_wallets(), vec!["alice *".to_string(), "bob *".to_string()]);

    mgr.open("alice").unwrap();
    // one entry, reloaded locked, moved to the end of the scan order
    assert_eq!(mgr.list_wallets(), vec!["bob *".to_string(), "alice".to_string()]);
    mgr.unlock("alice", &password).unwrap();
    assert_eq!(mgr.list_wallets(), vec!["bob *".to_string(), "alice *".to_string()]);
}

#[test]
fn test_lock_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    mgr.create("alice").unwrap();

    mgr.lock("alice").unwrap();
    mgr.lock("alice").unwrap();
    assert_eq!(mgr.list_wallets(), vec!["alice".to_string()]);
    assert!(matches!(
        mgr.lock("nobody"),
        Err(WalletError::WalletNonexistent(_))
    ));
}

#[test]
fn test_unlock_auto_opens_registered_file() {
    let dir = tempfile::tempdir().unwrap();
    let password = manager(dir.path()).create("bob").unwrap();

    let mut fresh = manager(dir.path());
    assert!(!fresh.is_registered("bob"));
    fresh.unlock("bob", &password).unwrap();
    assert!(fresh.is_registered("bob"));
    assert_eq!(fresh.list_wallets(), vec!["bob *".to_string()]);
}

#[test]
fn test_unlock_auto_open_with_wrong_password_stays_locked() {
    let dir = tempfile::tempdir().unwrap();
    manager(dir.path()).create("bob").unwrap();

    let mut fresh = manager(dir.path());
    assert!(matches!(
        fresh.unlock("bob", "PWnot-the-password"),
        Err(WalletError::BadPassword)
    ));
    assert!(fresh.list_wallets().iter().all(|w| !w.ends_with(UNLOCKED_MARKER)));
    assert!(matches!(
        fresh.get_public_keys(),
        Err(WalletError::AllWalletsLocked)
    ));
}

#[test]
fn test_unlock_without_file_is_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    assert!(matches!(
        mgr.unlock("nobody", "pw"),
        Err(WalletError::WalletNonexistent(_))
    ));
}

#[test]
fn test_create_replaces_stale_registration() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let old_pw = mgr.create("alice").unwrap();
    mgr.create_key("alice", "ed25519").unwrap();

    std::fs::remove_file(dir.path().join("alice.wallet")).unwrap();
    let new_pw = mgr.create("alice").unwrap();
    assert_ne!(old_pw, new_pw);
    assert_eq!(mgr.list_wallets().len(), 1);
    assert!(mgr.get_public_keys().unwrap().is_empty());
}

/* =========================================================================================
 * KEYS
 * ====================================================================================== */

#[test]
fn test_key_operations_require_registered_unlocked_wallet() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let key = PrivateKey::generate(KeyType::Ed25519).to_string();

    assert!(matches!(
        mgr.import_key("none", &key),
        Err(WalletError::WalletNonexistent(_))
    ));
    assert!(matches!(
        mgr.create_key("none", "ed25519"),
        Err(WalletError::WalletNonexistent(_))
    ));
    assert!(matches!(
        mgr.list_keys("none", "pw"),
        Err(WalletError::WalletNonexistent(_))
    ));

    let password = mgr.create("w").unwrap();
    mgr.lock("w").unwrap();
    assert!(matches!(mgr.import_key("w", &key), Err(WalletError::WalletLocked(_))));
    assert!(matches!(mgr.create_key("w", "ed25519"), Err(WalletError::WalletLocked(_))));
    assert!(matches!(mgr.list_keys("w", &password), Err(WalletError::WalletLocked(_))));
    assert!(matches!(
        mgr.remove_key("w", &password, "PUB_ED25519_00"),
        Err(WalletError::WalletLocked(_))
    ));
}

#[test]
fn test_import_list_remove_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let password = mgr.create("w").unwrap();

    let key = PrivateKey::generate(KeyType::Ed25519);
    let pk = mgr.import_key("w", &key.to_string()).unwrap();
    assert_eq!(&pk, key.public_key());

    let listed = mgr.list_keys("w", &password).unwrap();
    assert_eq!(listed.get(&pk), Some(&key));
    assert!(matches!(
        mgr.list_keys("w", "wrong"),
        Err(WalletError::BadPassword)
    ));

    assert!(matches!(
        mgr.remove_key("w", "wrong", &pk.to_string()),
        Err(WalletError::BadPassword)
    ));
    assert!(mgr.get_public_keys().unwrap().contains(&pk));

    mgr.remove_key("w", &password, &pk.to_string()).unwrap();
    assert!(!mgr.get_public_keys().unwrap().contains(&pk));
}

#[test]
fn test_keys_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (password, pk) = {
        let mut mgr = manager(dir.path());
        let password = mgr.create("persist").unwrap();
        let pk = mgr.create_key("persist", "FALCON512").unwrap();
        (password, pk)
    };

    let mut mgr = manager(dir.path());
    mgr.unlock("persist", &password).unwrap();
    assert_eq!(mgr.get_public_keys().unwrap(), BTreeSet::from([pk]));
}

#[test]
fn test_aggregation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let chain = ChainId::from_network("tt-testnet");

    assert!(matches!(mgr.get_public_keys(), Err(WalletError::NoWalletsAvailable)));
    assert!(matches!(
        mgr.get_my_signatures(&chain),
        Err(WalletError::NoWalletsAvailable)
    ));

    mgr.create("a").unwrap();
    mgr.create("b").unwrap();
    mgr.lock_all();
    assert!(matches!(mgr.get_public_keys(), Err(WalletError::AllWalletsLocked)));
    assert!(matches!(
        mgr.get_my_signatures(&chain),
        Err(WalletError::AllWalletsLocked)
    ));
}

#[test]
fn test_get_public_keys_unions_unlocked_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    mgr.create("a").unwrap();
    mgr.create("b").unwrap();
    let ka = mgr.create_key("a", "").unwrap();
    let kb = mgr.create_key("b", "").unwrap();

    assert_eq!(mgr.get_public_keys().unwrap(), BTreeSet::from([ka.clone(), kb]));
    mgr.lock("b").unwrap();
    assert_eq!(mgr.get_public_keys().unwrap(), BTreeSet::from([ka]));
}

#[test]
fn test_get_my_signatures_collapses_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let chain = ChainId::from_network("tt-mainnet");
    mgr.create("a").unwrap();
    mgr.create("b").unwrap();

    // same Ed25519 key in both wallets -> identical deterministic signature
    let shared = PrivateKey::generate(KeyType::Ed25519);
    let pk = mgr.import_key("a", &shared.to_string()).unwrap();
    mgr.import_key("b", &shared.to_string()).unwrap();
    let other = mgr.create_key("b", "ed25519").unwrap();

    let sigs = mgr.get_my_signatures(&chain).unwrap();
    assert_eq!(sigs.len(), 2);
    assert!(sigs.iter().any(|s| pk.verify(chain.as_bytes(), s)));
    assert!(sigs.iter().any(|s| other.verify(chain.as_bytes(), s)));
}

/* =========================================================================================
 * SIGNING
 * ====================================================================================== */

#[test]
fn test_sign_transaction_collects_all_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let chain = ChainId::from_network("tt-testnet");
    mgr.create("a").unwrap();
    mgr.create("b").unwrap();
    let ka = mgr.create_key("a", "ed25519").unwrap();
    let kb = mgr.create_key("b", "falcon512").unwrap();

    let mut tx = sample_tx();
    let prior = PrivateKey::generate(KeyType::Ed25519);
    tx.signatures.push(prior.sign(&tx.sig_digest(&chain).unwrap()).unwrap());
    let original = tx.clone();

    let keys = BTreeSet::from([ka.clone(), kb.clone()]);
    let signed = mgr.sign_transaction(&tx, &keys, &chain).unwrap();

    assert_eq!(tx, original);
    assert_eq!(signed.signatures.len(), 3);
    assert_eq!(signed.signatures[0], original.signatures[0]);
    assert!(signed.signed_by(&chain, &ka).unwrap());
    assert!(signed.signed_by(&chain, &kb).unwrap());
    assert!(signed.signed_by(&chain, prior.public_key()).unwrap());
}

#[test]
fn test_sign_transaction_missing_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let chain = ChainId::from_network("tt-testnet");
    mgr.create("a").unwrap();
    let ka = mgr.create_key("a", "ed25519").unwrap();
    let stranger = PrivateKey::generate(KeyType::Ed25519).public_key().clone();

    let keys = BTreeSet::from([ka.clone(), stranger.clone()]);
    match mgr.sign_transaction(&sample_tx(), &keys, &chain) {
        Err(WalletError::MissingPublicKey(k)) => assert_eq!(k, stranger.to_string()),
        other => panic!("expected MissingPublicKey, got {:?}", other),
    }

    // key held by a locked wallet does not count
    mgr.lock("a").unwrap();
    let only_a = BTreeSet::from([ka]);
    assert!(matches!(
        mgr.sign_transaction(&sample_tx(), &only_a, &chain),
        Err(WalletError::MissingPublicKey(_))
    ));
}

#[test]
fn test_sign_digest_first_match_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let shared = PrivateKey::generate(KeyType::Ed25519);
    let pk = shared.public_key().clone();

    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));
    mgr.own_and_use_wallet(
        "first",
        Box::new(CountingWallet::with_key(shared.clone(), first_calls.clone())),
    )
    .unwrap();
    mgr.own_and_use_wallet(
        "second",
        Box::new(CountingWallet::with_key(shared, second_calls.clone())),
    )
    .unwrap();

    let digest = [0x11u8; 32];
    let sig = mgr.sign_digest(&digest, &pk).unwrap();
    assert!(pk.verify(&digest, &sig));
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    let missing = PrivateKey::generate(KeyType::Ed25519).public_key().clone();
    assert!(matches!(
        mgr.sign_digest(&digest, &missing),
        Err(WalletError::MissingPublicKey(_))
    ));
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sign_digest_skips_locked_wallets() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    let key = PrivateKey::generate(KeyType::Ed25519);
    let pk = key.public_key().clone();

    let locked_calls = Arc::new(AtomicUsize::new(0));
    let mut locked = CountingWallet::with_key(key.clone(), locked_calls.clone());
    locked.lock();
    mgr.own_and_use_wallet("locked", Box::new(locked)).unwrap();
    let open_calls = Arc::new(AtomicUsize::new(0));
    mgr.own_and_use_wallet("open", Box::new(CountingWallet::with_key(key, open_calls.clone())))
        .unwrap();

    mgr.sign_digest(&[2u8; 32], &pk).unwrap();
    assert_eq!(locked_calls.load(Ordering::SeqCst), 0);
    assert_eq!(open_calls.load(Ordering::SeqCst), 1);
}

/* =========================================================================================
 * TIMEOUT
 * ====================================================================================== */

#[test]
fn test_timeout_sliding_window() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let mut mgr = manager_with_clock(dir.path(), &clock);
    mgr.create("alice").unwrap();
    mgr.set_timeout(Duration::from_secs(5)).unwrap();

    for _ in 0..4 {
        clock.advance(4);
        assert_eq!(mgr.list_wallets(), vec!["alice *".to_string()]);
    }

    clock.advance(5);
    assert_eq!(mgr.list_wallets(), vec!["alice".to_string()]);
}

#[test]
fn test_timeout_expiry_blocks_signing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let mut mgr = manager_with_clock(dir.path(), &clock);
    mgr.create("alice").unwrap();
    let pk = mgr.create_key("alice", "ed25519").unwrap();
    mgr.set_timeout(Duration::from_secs(60)).unwrap();

    clock.advance(61);
    assert!(matches!(
        mgr.sign_digest(&[0u8; 32], &pk),
        Err(WalletError::MissingPublicKey(_))
    ));
}

#[test]
fn test_timeout_disabled_never_locks() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let mut mgr = manager_with_clock(dir.path(), &clock);
    mgr.create("alice").unwrap();
    assert_eq!(mgr.timeout_remaining(), None);

    clock.advance(365 * 24 * 3600);
    assert_eq!(mgr.list_wallets(), vec!["alice *".to_string()]);

    mgr.set_timeout(Duration::from_secs(10)).unwrap();
    mgr.disable_timeout();
    clock.advance(3600);
    assert_eq!(mgr.list_wallets(), vec!["alice *".to_string()]);
}

#[test]
fn test_timeout_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());
    assert!(matches!(
        mgr.set_timeout(Duration::from_secs(u64::MAX)),
        Err(WalletError::TimeoutOverflow { .. })
    ));
}

#[test]
fn test_configured_timeout_applies_from_start() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let cfg = config(dir.path()).with_unlock_timeout(Some(Duration::from_secs(30)));
    let mut mgr = WalletManager::with_clock(cfg, Arc::new(clock.clone())).unwrap();
    assert_eq!(mgr.timeout_remaining(), Some(Duration::from_secs(30)));

    mgr.create("alice").unwrap();
    clock.advance(30);
    assert_eq!(mgr.list_wallets(), vec!["alice".to_string()]);
}

/* =========================================================================================
 * PLATFORM WALLET / DIRECTORY LOCK
 * ====================================================================================== */

#[test]
fn test_platform_wallet_probe() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = manager(dir.path());

    assert!(!mgr.register_platform_wallet(|| {
        Err(WalletError::PlatformWalletUnavailable("test".into()))
    }));
    assert!(mgr.list_wallets().is_empty());

    let calls = Arc::new(AtomicUsize::new(0));
    let key = PrivateKey::generate(KeyType::Ed25519);
    assert!(mgr.register_platform_wallet(|| {
        Ok(Box::new(CountingWallet::with_key(key, calls)) as Box<dyn WalletApi>)
    }));
    assert_eq!(mgr.list_wallets(), vec!["SecureEnclave *".to_string()]);
}

#[test]
fn test_directory_lock_exclusivity() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = manager(dir.path());
    let mut second = manager(dir.path());

    first.initialize_lock().unwrap();
    assert!(dir.path().join("wallet.lock").exists());
    assert!(matches!(
        second.initialize_lock(),
        Err(WalletError::DirectoryLockUnavailable { .. })
    ));
    assert!(!second.holds_lock());

    drop(first);
    assert!(!dir.path().join("wallet.lock").exists());
    second.initialize_lock().unwrap();
}
