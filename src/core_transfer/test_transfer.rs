use crate::config::{NodeConfig, VfsConfig};
use crate::core_accounting::{AccountRegistry, UserAccount};
use crate::core_channel::negotiator::{NegotiatedChannel, PretRequest, TransferDirection};
use crate::core_channel::port_pool::PassivePortPool;
use crate::core_event::EventBus;
use crate::core_network::stream::ControlStream;
use crate::core_node::registry::NodeRegistry;
use crate::core_node::selector::NodeSelector;
use crate::core_node::testutil::{crc32, FakeNode};
use crate::core_node::NodeHandle;
use crate::core_tls::ChannelSecurity;
use crate::core_transfer::orchestrator::{TransferCommand, TransferOrchestrator};
use crate::core_transfer::reconciler::Reconciler;
use crate::core_vfs::{VfsCatalog, VfsError};
use crate::session::Session;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

struct Rig {
    fake: FakeNode,
    catalog: Arc<VfsCatalog>,
    registry: Arc<NodeRegistry>,
    accounts: Arc<AccountRegistry>,
    events: Arc<EventBus>,
    orchestrator: TransferOrchestrator,
}

fn account(username: &str, ratio: f64, credits: u64) -> UserAccount {
    UserAccount {
        username: username.to_string(),
        password_hash: "x".to_string(),
        group: "users".to_string(),
        ratio,
        credits,
        uploaded_bytes: 0,
        downloaded_bytes: 0,
        uploads: 0,
        downloads: 0,
    }
}

async fn rig(require_protected_data: bool) -> Rig {
    let fake = FakeNode::start().await;
    let handle = Arc::new(NodeHandle::from_config(
        &NodeConfig {
            name: "landing".to_string(),
            address: fake.address.to_string(),
            tls: false,
            tls_name: None,
            accepts_uploads: true,
        },
        Arc::new(ChannelSecurity::disabled()),
    ));
    let registry = Arc::new(NodeRegistry::from_handles(vec![handle]));
    let catalog = Arc::new(VfsCatalog::new(&VfsConfig {
        sections: vec!["incoming".to_string()],
        upload_allow: vec![],
        download_deny: vec![],
    }));
    let accounts = Arc::new(AccountRegistry::in_memory(vec![
        account("alice", 3.0, 1_000_000),
        account("broke", 3.0, 10),
    ]));
    let events = Arc::new(EventBus::new());
    let orchestrator = TransferOrchestrator::new(
        Arc::clone(&catalog),
        Arc::clone(&registry),
        Arc::clone(&accounts),
        Arc::clone(&events),
        require_protected_data,
        Duration::from_secs(30),
    );
    Rig {
        fake,
        catalog,
        registry,
        accounts,
        events,
        orchestrator,
    }
}

fn session_for(user: &str) -> Session {
    let mut session = Session::new("127.0.0.1:50000".parse().unwrap());
    session.username = user.to_string();
    session.is_authenticated = true;
    session
}

/// Registers a completed file on the landing node in the catalog.
fn seed_file(rig: &Rig, path: &str, size: u64, crc: Option<u32>) {
    rig.catalog.register_pending(path, "alice", "landing").unwrap();
    rig.catalog
        .finalize_upload(path, size, crc, Duration::from_secs(1))
        .unwrap();
}

async fn control_pair() -> (ControlStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();
    (ControlStream::Plain(server), client)
}

async fn read_replies(ctrl: ControlStream, mut client: TcpStream) -> String {
    drop(ctrl);
    let mut replies = String::new();
    client.read_to_string(&mut replies).await.unwrap();
    replies
}

/// Simulates the client side of a PORT negotiation for an upload: bind a
/// listener, record it as the active peer, and push the payload when the
/// node dials in.
async fn active_sender(session: &mut Session, payload: Vec<u8>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    session.channel.set_active(
        session.control_peer.ip(),
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, port),
    );
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        sock.write_all(&payload).await.unwrap();
        let _ = sock.shutdown().await;
    });
}

/// Client side of a PORT negotiation for a download; resolves to whatever
/// the node sent.
async fn active_receiver(session: &mut Session) -> JoinHandle<Vec<u8>> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    session.channel.set_active(
        session.control_peer.ip(),
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, port),
    );
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    })
}

#[tokio::test]
async fn stor_then_retr_round_trips_bytes_and_checksum() {
    let rig = rig(false).await;
    let mut rx = rig.events.subscribe();
    let payload = b"a body worth keeping".to_vec();
    let expected_crc = crc32(&payload);

    let mut session = session_for("alice");
    active_sender(&mut session, payload.clone()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/song.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("150 Opening data connection."));
    assert!(replies.contains("226 Transfer complete."));
    assert!(replies.contains(&format!("CRC32 {:08X}.", expected_crc)));

    assert_eq!(rig.fake.file("/incoming/song.bin").unwrap(), payload);
    let meta = rig.catalog.lookup_plain_file("/incoming/song.bin").unwrap();
    assert_eq!(meta.size, payload.len() as u64);
    assert_eq!(meta.crc32, Some(expected_crc));
    assert_eq!(
        rig.accounts.get("alice").unwrap().credits,
        1_000_000 + 3 * payload.len() as u64
    );

    // Channel state must be idle again before the next negotiation.
    assert_eq!(session.channel.negotiated(), NegotiatedChannel::None);

    let collector = active_receiver(&mut session).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Retr, "/incoming/song.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("226 Transfer complete."));
    assert!(replies.contains(&format!("CRC32 {:08X}.", expected_crc)));
    assert_eq!(collector.await.unwrap(), payload);
    assert_eq!(
        rig.accounts.get("alice").unwrap().credits,
        1_000_000 + 2 * payload.len() as u64
    );

    let stored = rx.recv().await.unwrap();
    assert_eq!(stored.direction, TransferDirection::Upload);
    assert!(stored.success && stored.clean);
    let fetched = rx.recv().await.unwrap();
    assert_eq!(fetched.direction, TransferDirection::Download);
    assert!(fetched.success && fetched.clean);
    assert_eq!(fetched.bytes, payload.len() as u64);
}

#[tokio::test]
async fn appe_is_rejected_as_not_implemented() {
    let rig = rig(false).await;
    let mut session = session_for("alice");
    active_sender(&mut session, b"x".to_vec()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Appe, "/incoming/a.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.starts_with("502 APPE not implemented."));
    assert!(!replies.contains("150"));
    assert_eq!(session.channel.negotiated(), NegotiatedChannel::None);
}

#[tokio::test]
async fn retr_without_credit_never_contacts_the_node() {
    let rig = rig(false).await;
    seed_file(&rig, "/incoming/big.bin", 100, None);
    // Any node contact would fail loudly from here on.
    rig.fake.refuse_everything();

    let mut session = session_for("broke");
    let _collector = active_receiver(&mut session).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Retr, "/incoming/big.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert_eq!(replies, "550 Not enough credits.\r\n");
}

#[tokio::test]
async fn stor_contradicting_the_manifest_is_deleted_and_uncredited() {
    let rig = rig(false).await;
    rig.fake
        .insert_file("/incoming/set.sfv", b"track01.bin 00000001\r\n");
    seed_file(&rig, "/incoming/set.sfv", 22, None);
    let before = rig.accounts.get("alice").unwrap();

    let mut session = session_for("alice");
    active_sender(&mut session, b"whatever bytes".to_vec()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/track01.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("550-CRC32 mismatch"));
    assert!(replies.contains("550 Upload rejected"));

    assert!(matches!(
        rig.catalog.lookup_plain_file("/incoming/track01.bin"),
        Err(VfsError::NotFound(_))
    ));
    assert!(rig.fake.file("/incoming/track01.bin").is_none());
    let after = rig.accounts.get("alice").unwrap();
    assert_eq!(after.credits, before.credits);
    assert_eq!(after.uploads, 0);
}

#[tokio::test]
async fn stor_matching_the_manifest_is_clean() {
    let rig = rig(false).await;
    let payload = b"verified content".to_vec();
    let manifest = format!("track02.bin {:08X}\r\n", crc32(&payload));
    rig.fake.insert_file("/incoming/set.sfv", manifest.as_bytes());
    seed_file(&rig, "/incoming/set.sfv", manifest.len() as u64, None);

    let mut session = session_for("alice");
    active_sender(&mut session, payload.clone()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/track02.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("matches the manifest"));
    assert!(replies.contains("226 Transfer complete."));
    assert_eq!(rig.accounts.get("alice").unwrap().uploads, 1);
}

#[tokio::test]
async fn transfer_not_matching_the_pret_grant_is_refused() {
    let rig = rig(false).await;
    seed_file(&rig, "/incoming/a.bin", 4, None);
    let selector = NodeSelector::new(Arc::clone(&rig.registry));

    let mut session = session_for("alice");
    session
        .channel
        .pre_transfer_negotiate(
            PretRequest::Download("/incoming/a.bin".to_string()),
            &rig.catalog,
            &selector,
        )
        .unwrap();
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/b.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.starts_with("503 "));
    assert!(!replies.contains("150"));
    assert!(session.channel.pre_selection().is_none());
}

#[tokio::test]
async fn unprotected_transfer_is_refused_when_policy_requires_tls() {
    let rig = rig(true).await;
    seed_file(&rig, "/incoming/a.bin", 4, None);
    let mut session = session_for("alice");
    let _collector = active_receiver(&mut session).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Retr, "/incoming/a.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.starts_with("530 Encrypted data channel required"));
}

#[tokio::test]
async fn node_refusal_cleans_up_the_placeholder() {
    let rig = rig(false).await;
    rig.fake.refuse_everything();
    let mut session = session_for("alice");
    active_sender(&mut session, b"doomed".to_vec()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/gone.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("450 Storage node refused"));
    assert!(matches!(
        rig.catalog.lookup_plain_file("/incoming/gone.bin"),
        Err(VfsError::NotFound(_))
    ));
}

#[tokio::test]
async fn upload_over_an_unexpected_node_file_is_a_desync() {
    let rig = rig(false).await;
    // The node has bytes the catalog knows nothing about.
    rig.fake.insert_file("/incoming/ghost.bin", b"stale");
    let mut session = session_for("alice");
    active_sender(&mut session, b"new data".to_vec()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/ghost.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("426 Transfer failed; storage node desynchronized."));
    assert!(matches!(
        rig.catalog.lookup_plain_file("/incoming/ghost.bin"),
        Err(VfsError::NotFound(_))
    ));
}

#[tokio::test]
async fn download_of_a_file_the_node_lost_is_a_desync() {
    let rig = rig(false).await;
    seed_file(&rig, "/incoming/lost.bin", 64, None);
    let mut session = session_for("alice");
    let _collector = active_receiver(&mut session).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Retr, "/incoming/lost.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("426 Transfer failed; storage node desynchronized."));
    // The catalog entry stays; only uploads clean up after themselves.
    assert!(rig.catalog.lookup_plain_file("/incoming/lost.bin").is_ok());
}

#[tokio::test]
async fn pret_pasv_stor_uses_the_node_hosted_listener() {
    let rig = rig(false).await;
    let selector = NodeSelector::new(Arc::clone(&rig.registry));
    let pool = Arc::new(PassivePortPool::new(41030, 41034));
    let payload = b"passive payload".to_vec();

    let mut session = session_for("alice");
    session
        .channel
        .pre_transfer_negotiate(
            PretRequest::Upload("/incoming/p.bin".to_string()),
            &rig.catalog,
            &selector,
        )
        .unwrap();
    let external = session
        .channel
        .begin_passive(&pool, Ipv4Addr::LOCALHOST, &rig.registry)
        .await
        .unwrap();
    let push = payload.clone();
    tokio::spawn(async move {
        let mut sock = TcpStream::connect(external).await.unwrap();
        sock.write_all(&push).await.unwrap();
        let _ = sock.shutdown().await;
    });

    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/p.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("226 Transfer complete."));
    assert_eq!(rig.fake.file("/incoming/p.bin").unwrap(), payload);
    assert_eq!(pool.available(), pool.capacity());
}

#[tokio::test]
async fn rest_resumes_an_interrupted_upload_at_its_stored_size() {
    let rig = rig(false).await;
    rig.fake.insert_file("/incoming/part.bin", b"ABCD");
    seed_file(&rig, "/incoming/part.bin", 4, Some(1));

    let mut session = session_for("alice");
    session.channel.set_restart_offset(4);
    active_sender(&mut session, b"EFGH".to_vec()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/part.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.contains("226 Transfer complete. 4 bytes"));
    assert_eq!(rig.fake.file("/incoming/part.bin").unwrap(), b"ABCDEFGH");
    let meta = rig.catalog.lookup_plain_file("/incoming/part.bin").unwrap();
    assert_eq!(meta.size, 8);
    // The tail checksum says nothing about the whole file.
    assert_eq!(meta.crc32, None);
}

#[tokio::test]
async fn rest_offset_beyond_the_stored_size_is_refused() {
    let rig = rig(false).await;
    rig.fake.insert_file("/incoming/part.bin", b"ABCD");
    seed_file(&rig, "/incoming/part.bin", 4, None);

    let mut session = session_for("alice");
    session.channel.set_restart_offset(9);
    active_sender(&mut session, b"EFGH".to_vec()).await;
    let (mut ctrl, client) = control_pair().await;
    rig.orchestrator
        .execute(&mut ctrl, &mut session, TransferCommand::Stor, "/incoming/part.bin")
        .await
        .unwrap();
    let replies = read_replies(ctrl, client).await;
    assert!(replies.starts_with("503 Restart offset"));
    assert_eq!(rig.fake.file("/incoming/part.bin").unwrap(), b"ABCD");
}

#[tokio::test]
async fn download_checksum_mismatches_only_warn() {
    let rig = rig(false).await;
    seed_file(&rig, "/incoming/odd.bin", 8, Some(5));
    let reconciler = Reconciler::new(Arc::clone(&rig.catalog), Arc::clone(&rig.registry));
    let report = reconciler
        .reconcile(TransferDirection::Download, 7, "/incoming/odd.bin")
        .await;
    assert!(report.clean);
    assert!(report.comments[0].contains("cached CRC32"));
    assert!(rig.catalog.lookup_plain_file("/incoming/odd.bin").is_ok());
}

#[tokio::test]
async fn manifest_on_an_offline_node_is_a_soft_warning() {
    let rig = rig(false).await;
    seed_file(&rig, "/incoming/set.sfv", 20, None);
    rig.registry.get("landing").unwrap().mark_offline("test");
    let reconciler = Reconciler::new(Arc::clone(&rig.catalog), Arc::clone(&rig.registry));
    let report = reconciler
        .reconcile(TransferDirection::Upload, 9, "/incoming/track.bin")
        .await;
    assert!(report.clean);
    assert!(report.comments[0].contains("unavailable"));
}
