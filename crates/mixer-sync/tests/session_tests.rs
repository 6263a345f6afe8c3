mod common;

use common::*;
use mixer_core::credential::CredentialGate;
use mixer_store::{Account, Store};
use mixer_sync::session::{self, login, SessionError};
use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use tempfile::{tempdir, TempDir};

fn program_hex(byte: &str) -> String {
    format!("0x{}", byte.repeat(32))
}

async fn unlocked_dir() -> (CredentialGate, Store, TempDir) {
    let dir = tempdir().unwrap();
    let gate = CredentialGate::in_dir(dir.path());
    gate.setup("pw").unwrap();
    let store = Store::open(&dir.path().join("mixer.db")).await.unwrap();
    (gate, store, dir)
}

#[tokio::test]
async fn wrong_passphrase_is_rejected_before_the_engine() {
    let (gate, store, _dir) = unlocked_dir().await;
    let engine = MockEngine::new();
    let err = login(&gate, &store, engine.as_ref(), "nope", Some(&program_hex("01")))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::WrongPassphrase));
    assert!(engine.activations.lock().is_empty());
}

#[tokio::test]
async fn first_login_needs_a_program() {
    let (gate, store, _dir) = unlocked_dir().await;
    let engine = MockEngine::new();
    let err = login(&gate, &store, engine.as_ref(), "pw", None).await.unwrap_err();
    assert!(matches!(err, SessionError::MissingProgram));
    let err = login(&gate, &store, engine.as_ref(), "pw", Some("0x12"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidProgram(_)));
}

#[tokio::test]
async fn engine_receives_accounts_and_tickets() {
    let (gate, store, _dir) = unlocked_dir().await;
    let engine = MockEngine::new();
    let alice = Account {
        address: id(0x0a).to_hex(),
        identity: "ss58-a".into(),
        name: "alice".into(),
    };
    store.add_account(&alice).await.unwrap();

    let first = login(&gate, &store, engine.as_ref(), "pw", Some(&program_hex("ab")))
        .await
        .unwrap();
    assert!(first.program_changed);
    store.add_index_tickets(&BTreeSet::from([3, 4])).await.unwrap();

    let again = login(&gate, &store, engine.as_ref(), "pw", None).await.unwrap();
    assert!(!again.program_changed);
    assert_eq!(again.config, first.config);

    let activations = engine.activations.lock().clone();
    assert_eq!(activations.len(), 2);
    assert_eq!(activations[0].addresses, vec![alice.address.clone()]);
    assert!(activations[0].tickets.is_empty());
    assert_eq!(activations[1].tickets, BTreeSet::from([3, 4]));
    assert_eq!(activations[1].password, "pw");
    assert_eq!(activations[1].program, first.config.pool_program);
}

#[tokio::test]
async fn switching_program_activates_with_no_tickets_then_resets() {
    let (gate, store, _dir) = unlocked_dir().await;
    let engine = MockEngine::new();
    login(&gate, &store, engine.as_ref(), "pw", Some(&program_hex("ab")))
        .await
        .unwrap();
    store.add_index_tickets(&BTreeSet::from([7])).await.unwrap();

    let same = login(&gate, &store, engine.as_ref(), "pw", Some(&program_hex("AB")))
        .await
        .unwrap();
    assert!(!same.program_changed);
    assert_eq!(store.last_index().await.unwrap(), 7);

    let switched = login(&gate, &store, engine.as_ref(), "pw", Some(&program_hex("cd")))
        .await
        .unwrap();
    assert!(switched.program_changed);
    let last = engine.activations.lock().last().cloned().unwrap();
    assert!(last.tickets.is_empty());
    assert_eq!(last.program, switched.config.pool_program);
    assert!(store.list_index_tickets().await.unwrap().is_empty());
    assert_eq!(
        store.load_settings().await.unwrap().pool_program,
        Some(program_hex("cd"))
    );
}

#[tokio::test]
async fn refused_activation_keeps_previous_program_and_state() {
    let (gate, store, _dir) = unlocked_dir().await;
    let engine = MockEngine::new();
    login(&gate, &store, engine.as_ref(), "pw", Some(&program_hex("ab")))
        .await
        .unwrap();
    store.add_index_tickets(&BTreeSet::from([2])).await.unwrap();

    engine.refuse_activation.store(true, Ordering::SeqCst);
    let err = login(&gate, &store, engine.as_ref(), "pw", Some(&program_hex("cd")))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Activation(_)));
    assert_eq!(store.list_index_tickets().await.unwrap(), BTreeSet::from([2]));
    assert_eq!(
        store.load_settings().await.unwrap().pool_program,
        Some(program_hex("ab"))
    );
}

#[tokio::test]
async fn unlock_writes_nothing_until_commit() {
    let (gate, store, _dir) = unlocked_dir().await;
    let session = session::unlock(&gate, &store, "pw", Some(&program_hex("ef")))
        .await
        .unwrap();
    assert!(session.program_changed);
    assert_eq!(store.load_settings().await.unwrap().pool_program, None);

    session::commit(&store, &session).await.unwrap();
    assert_eq!(
        store.load_settings().await.unwrap().pool_program,
        Some(program_hex("ef"))
    );
}
