use crate::config::{NodeConfig, VfsConfig};
use crate::core_channel::error::ChannelError;
use crate::core_channel::negotiator::{
    ActiveAdvice, ChannelState, NegotiatedChannel, PretGrant, PretRequest,
};
use crate::core_channel::port_pool::PassivePortPool;
use crate::core_node::registry::NodeRegistry;
use crate::core_node::selector::NodeSelector;
use crate::core_node::testutil::FakeNode;
use crate::core_node::NodeHandle;
use crate::core_tls::ChannelSecurity;
use crate::core_vfs::VfsCatalog;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn catalog() -> VfsCatalog {
    VfsCatalog::new(&VfsConfig {
        sections: vec!["incoming".to_string()],
        upload_allow: vec![],
        download_deny: vec![],
    })
}

fn lone_selector() -> NodeSelector {
    NodeSelector::new(Arc::new(NodeRegistry::from_handles(vec![])))
}

#[tokio::test]
async fn pasv_without_pret_never_binds_a_socket() {
    let pool = Arc::new(PassivePortPool::new(41000, 41004));
    let registry = NodeRegistry::from_handles(vec![]);
    let mut chan = ChannelState::new();
    let err = chan
        .begin_passive(&pool, Ipv4Addr::LOCALHOST, &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::SequenceError(_)));
    assert_eq!(pool.available(), pool.capacity());
    assert_eq!(chan.negotiated(), NegotiatedChannel::None);
}

#[tokio::test]
async fn pret_list_then_pasv_serves_from_the_master() {
    let pool = Arc::new(PassivePortPool::new(41010, 41019));
    let registry = NodeRegistry::from_handles(vec![]);
    let selector = lone_selector();
    let cat = catalog();
    let security = ChannelSecurity::disabled();
    let mut chan = ChannelState::new();
    chan.pre_transfer_negotiate(PretRequest::Listing, &cat, &selector)
        .unwrap();
    let external = chan
        .begin_passive(&pool, Ipv4Addr::LOCALHOST, &registry)
        .await
        .unwrap();
    assert!((41010..=41019).contains(&external.port()));
    assert_eq!(pool.available(), pool.capacity() - 1);

    let client = tokio::spawn(async move {
        let mut sock = TcpStream::connect(("127.0.0.1", external.port()))
            .await
            .unwrap();
        let mut body = String::new();
        sock.read_to_string(&mut body).await.unwrap();
        body
    });
    let mut data = chan.accept_or_connect(&security).await.unwrap();
    data.write_all(b"total 0\r\n").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    assert_eq!(client.await.unwrap(), "total 0\r\n");

    // The pooled port came back the moment the listener was consumed.
    assert_eq!(pool.available(), pool.capacity());
    chan.reset();
    chan.reset();
    assert_eq!(pool.available(), pool.capacity());
}

#[test]
fn port_cancels_prior_negotiation_and_flags_private_peers() {
    let cat = catalog();
    let selector = lone_selector();
    let mut chan = ChannelState::new();
    chan.set_restart_offset(512);
    chan.pre_transfer_negotiate(PretRequest::Listing, &cat, &selector)
        .unwrap();

    let advice = chan.set_active(
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)),
        SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 50), 2021),
    );
    assert_eq!(advice, ActiveAdvice::PrivateAddress);
    assert!(chan.pre_selection().is_none());
    assert_eq!(chan.resume_offset(), 0);
    assert!(matches!(chan.negotiated(), NegotiatedChannel::Active { .. }));

    let advice = chan.set_active(
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)),
        SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 50), 2021),
    );
    assert_eq!(advice, ActiveAdvice::Clean);
}

#[tokio::test]
async fn transfer_without_negotiation_is_refused() {
    let mut chan = ChannelState::new();
    let err = chan
        .accept_or_connect(&ChannelSecurity::disabled())
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::NotNegotiated));
}

#[tokio::test]
async fn active_connect_to_a_closed_port_fails_cleanly() {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = probe.local_addr().unwrap();
    drop(probe);

    let mut chan = ChannelState::new();
    chan.set_active(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, dead.port()),
    );
    let err = chan
        .accept_or_connect(&ChannelSecurity::disabled())
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::ConnectFailed(_)));
    assert_eq!(chan.negotiated(), NegotiatedChannel::None);
}

#[test]
fn pret_for_a_missing_file_leaves_no_state() {
    let cat = catalog();
    let selector = lone_selector();
    let mut chan = ChannelState::new();
    let err = chan
        .pre_transfer_negotiate(
            PretRequest::Download("/incoming/missing.bin".to_string()),
            &cat,
            &selector,
        )
        .unwrap_err();
    assert!(matches!(err, ChannelError::NotFound(_)));
    assert!(chan.pre_selection().is_none());
}

#[tokio::test]
async fn pret_stor_then_pasv_opens_the_listener_on_the_node() {
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
    let selector = NodeSelector::new(Arc::clone(&registry));
    let cat = catalog();
    let pool = Arc::new(PassivePortPool::new(41020, 41024));

    let mut chan = ChannelState::new();
    let grant = chan
        .pre_transfer_negotiate(
            PretRequest::Upload("/incoming/upload.bin".to_string()),
            &cat,
            &selector,
        )
        .unwrap();
    assert_eq!(grant, PretGrant::Node("landing".to_string()));

    let external = chan
        .begin_passive(&pool, Ipv4Addr::LOCALHOST, &registry)
        .await
        .unwrap();
    assert_ne!(external.port(), 0);
    match chan.negotiated() {
        NegotiatedChannel::NodeListener { node, .. } => assert_eq!(node, "landing"),
        other => panic!("unexpected channel: {:?}", other),
    }
    // The listener lives on the node; the master pool is untouched.
    assert_eq!(pool.available(), pool.capacity());
}

#[test]
fn restart_offset_applies_to_one_transfer_only() {
    let mut chan = ChannelState::new();
    chan.set_restart_offset(2048);
    assert_eq!(chan.take_resume_offset(), 2048);
    assert_eq!(chan.take_resume_offset(), 0);
}
