use std::sync::{Arc, Mutex};

use lib::{identifiers::Identity, util::time::UnixMillis};

use crate::{
    database::MemoryStore,
    manager::Session,
    messages::{DisplayState, MessageDispatch},
};

/// Collects everything a session sends so a test can deliver it to the
/// other session (or inspect it) at its own pace.
pub struct CollectingDispatch {
    outbox: Arc<Mutex<Vec<String>>>,
}

impl CollectingDispatch {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let outbox = Arc::new(Mutex::new(Vec::new()));

        (
            Self {
                outbox: outbox.clone(),
            },
            outbox,
        )
    }
}

impl MessageDispatch for CollectingDispatch {
    fn send(&self, text: &str) {
        self.outbox
            .lock()
            .expect("Mutex poisoning is safe")
            .push(text.to_string());
    }
}

pub type TestStore = Arc<Mutex<MemoryStore>>;
pub type TestSession = Session<TestStore, CollectingDispatch>;

pub struct TestPeer {
    pub session: TestSession,
    pub outbox: Arc<Mutex<Vec<String>>>,
    pub store: TestStore,
}

/// A session over a shared in-memory store, with a generated identity.
pub async fn test_peer(name: &str) -> TestPeer {
    let store: TestStore = Arc::new(Mutex::new(MemoryStore::new()));
    let (dispatch, outbox) = CollectingDispatch::new();

    let mut session =
        Session::open(Identity::new(name), store.clone(), dispatch).expect("session opens");
    session
        .ensure_identity()
        .await
        .expect("identity generation works");

    TestPeer {
        session,
        outbox,
        store,
    }
}

/// Drains `from`'s outbox into `to`, returning what the renderer would have
/// been told for each message.
pub fn deliver_all(from: &TestPeer, to: &mut TestPeer, at: UnixMillis) -> Vec<DisplayState> {
    let messages: Vec<String> = from
        .outbox
        .lock()
        .expect("Mutex poisoning is safe")
        .drain(..)
        .collect();

    messages
        .iter()
        .map(|message| to.session.receive(message, at))
        .collect()
}

/// Both peers announce a certificate and receive the other's.
pub fn exchange_certificates(alice: &mut TestPeer, bob: &mut TestPeer) {
    alice
        .session
        .announce_certificate()
        .expect("alice has an identity");
    bob.session
        .announce_certificate()
        .expect("bob has an identity");

    let now = UnixMillis::now();
    let to_bob = deliver_all(alice, bob, now);
    let to_alice = deliver_all(bob, alice, now);

    assert!(
        to_bob
            .iter()
            .chain(to_alice.iter())
            .all(|state| matches!(state, DisplayState::Control { .. })),
        "certificate announcements should register as control messages"
    );
}
