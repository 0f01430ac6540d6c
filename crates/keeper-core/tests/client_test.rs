//! Client behaviour against programmed session doubles.
//!
//! Covers:
//! - Lifecycle errors before start, after close and on double start
//! - Namespace prefixing and the one-time namespace ensure
//! - Default payloads, compression and ACL selection
//! - Retries of connection-level failures
//! - Recursive delete, parent creation and transactions

use std::{sync::Arc, thread, time::Duration};

use bytes::Bytes;
use keeper_core::{
    ANY_VERSION, ClientConfig, ClientState, CreateMode, DEFAULT_SESSION_TIMEOUT, Event, EventType,
    KeeperClient, KeeperError, MultiOp, MultiResponse, Session, Stat, close_quietly,
    creator_all_acl, event_channel, open_acl_unsafe, read_acl_unsafe,
};
use keeper_harness::{
    AclProviderDouble, CompressionDouble, ConnectionDouble, DialerDouble, EnsurePathHelperDouble,
    TestClient, with_client, with_client_and_namespace,
};

fn persistent() -> i32 {
    CreateMode::Persistent.flags()
}

#[test]
fn operations_before_start_are_rejected() {
    let client = ClientConfig::builder()
        .dialer(Arc::new(DialerDouble::new()))
        .connect_string("localhost:2181")
        .build()
        .expect("config should be complete");

    assert_eq!(client.get_data().for_path("/a"), Err(KeeperError::NotStarted));
    assert_eq!(client.sync("/a"), Err(KeeperError::NotStarted));
}

/// INVARIANT: A closed client never dials again and refuses every request.
#[test]
fn operations_after_close_are_rejected() {
    let dialer = DialerDouble::new();
    let conn = ConnectionDouble::new();
    let (events_tx, events) = event_channel();
    let session = Session { connection: Arc::new(conn.clone()), events };
    let _ = dialer.expect_dial("localhost:2181", DEFAULT_SESSION_TIMEOUT, false, Ok(session));
    let _ = conn.expect_close();

    let client = ClientConfig::builder()
        .dialer(Arc::new(dialer.clone()))
        .connect_string("localhost:2181")
        .build()
        .expect("config should be complete");
    client.start().expect("start should succeed");
    client.close().expect("close should succeed");
    client.close().expect("close is idempotent");

    assert_eq!(client.check_exists().for_path("/a"), Err(KeeperError::ConnectionClosed));
    assert_eq!(client.start(), Err(KeeperError::ConnectionClosed));

    events_tx.close();
    assert!(dialer.calls().verify().is_ok());
    assert!(conn.calls().verify().is_ok());
}

#[test]
fn quiet_close_stops_a_latent_client() {
    let client = ClientConfig::builder()
        .dialer(Arc::new(DialerDouble::new()))
        .connect_string("localhost:2181")
        .build()
        .expect("config should be complete");

    assert!(close_quietly(&client));
    assert_eq!(client.state(), ClientState::Stopped);
}

#[test]
fn second_start_is_rejected() {
    with_client(|client: KeeperClient| {
        assert_eq!(client.start(), Err(KeeperError::AlreadyStarted));
    });
}

#[test]
fn create_without_data_uses_default_payload() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ =
            conn.expect_create("/a", "default", persistent(), open_acl_unsafe(), Ok("/a".into()));

        assert_eq!(client.create().for_path("/a"), Ok("/a".to_string()));
    });
}

#[test]
fn create_passes_mode_and_explicit_acl() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let mode = CreateMode::EphemeralSequential;
        let _ = conn.expect_create(
            "/lock-",
            "me",
            mode.flags(),
            read_acl_unsafe(),
            Ok("/lock-0000000007".into()),
        );

        let created = client
            .create()
            .with_mode(mode)
            .with_acl(read_acl_unsafe())
            .for_path_with_data("/lock-", b"me");

        assert_eq!(created, Ok("/lock-0000000007".to_string()));
    });
}

#[test]
fn namespace_is_ensured_once_and_stripped() {
    with_client_and_namespace("ns", |conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_exists("/ns", Ok((false, None)));
        let _ = conn.expect_create("/ns", "", persistent(), open_acl_unsafe(), Ok("/ns".into()));
        let _ =
            conn.expect_create("/ns/a", "x", persistent(), open_acl_unsafe(), Ok("/ns/a".into()));
        let _ = conn.expect_get("/ns/a", Ok((Bytes::from_static(b"x"), None)));

        assert_eq!(client.create().for_path_with_data("/a", b"x"), Ok("/a".to_string()));
        assert_eq!(client.get_data().for_path("/a"), Ok((Bytes::from_static(b"x"), None)));
    });
}

#[test]
fn namespace_ensure_goes_through_helper() {
    TestClient::new().with_namespace("ns").with_ensure_path_helper().run(
        |conn: ConnectionDouble, helper: EnsurePathHelperDouble, client: KeeperClient| {
            let _ = helper.expect_ensure(&client, "/ns", true, Ok(()));
            let _ = conn.expect_sync("/ns/a", Ok("/ns/a".to_string()));

            assert_eq!(client.sync("/a"), Ok("/a".to_string()));
        },
    );
}

#[test]
fn failed_namespace_ensure_is_retried_on_next_operation() {
    TestClient::new().with_namespace("ns").with_ensure_path_helper().run(
        |conn: ConnectionDouble, helper: EnsurePathHelperDouble, client: KeeperClient| {
            let _ = helper.expect_ensure(&client, "/ns", true, Err(KeeperError::NoAuth));
            let _ = helper.expect_ensure(&client, "/ns", true, Ok(()));
            let _ = conn.expect_delete("/ns/a", ANY_VERSION, Ok(()));

            assert_eq!(client.delete().for_path("/a"), Err(KeeperError::NoAuth));
            assert_eq!(client.delete().for_path("/a"), Ok(()));
        },
    );
}

#[test]
fn compressed_create_and_decompressed_get() {
    with_client(
        |conn: ConnectionDouble, compression: CompressionDouble, client: KeeperClient| {
            let _ = compression.expect_compress("/a", "plain", Ok(Bytes::from_static(b"packed")));
            let _ = conn.expect_create(
                "/a",
                "packed",
                persistent(),
                open_acl_unsafe(),
                Ok("/a".into()),
            );
            let _ = conn.expect_get("/a", Ok((Bytes::from_static(b"packed"), None)));
            let _ = compression.expect_decompress("/a", "packed", Ok(Bytes::from_static(b"plain")));

            let created = client.create().compressed().for_path_with_data("/a", b"plain");
            assert_eq!(created, Ok("/a".to_string()));

            let (data, _) =
                client.get_data().decompressed().for_path("/a").expect("get should succeed");
            assert_eq!(data, Bytes::from_static(b"plain"));
        },
    );
}

#[test]
fn compression_failure_aborts_before_sending() {
    with_client(|compression: CompressionDouble, client: KeeperClient| {
        let failure = KeeperError::Compression("too large".to_string());
        let _ = compression.expect_compress("/a", "x", Err(failure.clone()));

        assert_eq!(client.set_data().compressed().for_path("/a", b"x"), Err(failure));
    });
}

#[test]
fn set_data_passes_version() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_set("/a", "v2", 1, Ok(Some(Stat::with_version(2))));

        let stat = client.set_data().with_version(1).for_path("/a", b"v2");

        assert_eq!(stat, Ok(Some(Stat::with_version(2))));
    });
}

#[test]
fn connection_loss_is_retried_once() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_get("/a", Err(KeeperError::ConnectionLoss));
        let _ = conn.expect_get("/a", Ok((Bytes::from_static(b"v"), None)));

        assert_eq!(client.get_data().for_path("/a"), Ok((Bytes::from_static(b"v"), None)));
        assert_eq!(conn.invocation_count("Get"), 2);
    });
}

#[test]
fn retries_stop_when_policy_is_exhausted() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_children("/a", Err(KeeperError::SessionExpired)).times(2);

        assert_eq!(client.get_children().for_path("/a"), Err(KeeperError::SessionExpired));
    });
}

#[test]
fn domain_errors_are_not_retried() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_exists("/a", Err(KeeperError::NoAuth));

        assert_eq!(client.check_exists().for_path("/a"), Err(KeeperError::NoAuth));
    });
}

#[test]
fn exists_maps_absent_node_to_none() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_exists("/a", Ok((false, None)));
        let _ = conn.expect_exists("/b", Ok((true, Some(Stat::with_version(3)))));

        assert_eq!(client.check_exists().for_path("/a"), Ok(None));
        assert_eq!(client.check_exists().for_path("/b"), Ok(Some(Stat::with_version(3))));
    });
}

#[test]
fn watch_delivers_node_event() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let (watch_tx, watch_rx) = event_channel();
        let _ = conn.expect_exists_w("/a", Ok((true, Some(Stat::default()), watch_rx)));

        let (stat, watch) = client.check_exists().watch_path("/a").expect("watch should be set");
        assert_eq!(stat, Some(Stat::default()));

        let fire = thread::spawn(move || watch_tx.send(Event::node(EventType::NodeDeleted, "/a")));
        let event = watch.recv_timeout(Duration::from_secs(5)).expect("watch should fire");
        assert_eq!(event, Event::node(EventType::NodeDeleted, "/a"));
        assert_eq!(fire.join().ok(), Some(Ok(())));
    });
}

#[test]
fn recursive_delete_removes_children_first() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_delete("/a", 5, Err(KeeperError::NotEmpty));
        let _ = conn.expect_children("/a", Ok((vec!["b".to_string()], None)));
        let _ = conn.expect_delete("/a/b", ANY_VERSION, Ok(()));
        let _ = conn.expect_delete("/a", 5, Ok(()));

        let deleted = client.delete().with_version(5).deleting_children_if_needed().for_path("/a");

        assert_eq!(deleted, Ok(()));
    });
}

#[test]
fn non_empty_delete_fails_without_recursion() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_delete("/a", ANY_VERSION, Err(KeeperError::NotEmpty));

        assert_eq!(client.delete().for_path("/a"), Err(KeeperError::NotEmpty));
    });
}

#[test]
fn creating_parents_ensures_each_ancestor() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_exists("/a", Ok((false, None)));
        let raced = Err(KeeperError::NodeExists);
        let _ = conn.expect_create("/a", "", persistent(), open_acl_unsafe(), raced);
        let _ = conn.expect_exists("/a/b", Ok((true, None)));
        let _ =
            conn.expect_create("/a/b/c", "x", persistent(), open_acl_unsafe(), Ok("/a/b/c".into()));

        let created =
            client.create().creating_parents_if_needed().for_path_with_data("/a/b/c", b"x");

        assert_eq!(created, Ok("/a/b/c".to_string()));
    });
}

#[test]
fn transaction_fills_acl_from_provider() {
    TestClient::new().with_namespace("ns").with_acl_provider().run(
        |conn: ConnectionDouble, acl: AclProviderDouble, client: KeeperClient| {
            let _ = acl.expect_acl_for_path("/ns", open_acl_unsafe());
            let _ = acl.expect_acl_for_path("/ns/job", creator_all_acl());
            let _ = conn.expect_exists("/ns", Ok((false, None)));
            let _ =
                conn.expect_create("/ns", "", persistent(), open_acl_unsafe(), Ok("/ns".into()));
            let _ = conn.expect_multi(
                vec![
                    MultiOp::Create {
                        path: "/ns/job".to_string(),
                        data: Bytes::from_static(b"task"),
                        flags: persistent(),
                        acl: creator_all_acl(),
                    },
                    MultiOp::SetData {
                        path: "/ns/counter".to_string(),
                        data: Bytes::from_static(b"1"),
                        version: 0,
                    },
                ],
                Ok(vec![
                    MultiResponse::created("/ns/job"),
                    MultiResponse::set(Stat::with_version(1)),
                ]),
            );

            let tx = client.in_transaction().create("/job", b"task").set_data("/counter", b"1", 0);
            assert_eq!(tx.len(), 2);

            let responses = tx.commit().expect("commit should succeed");
            assert_eq!(responses[0].created_path.as_deref(), Some("/job"));
            assert_eq!(responses[1].stat, Some(Stat::with_version(1)));
        },
    );
}

#[test]
fn acl_calls_pass_through() {
    with_client(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_get_acl("/a", Ok((open_acl_unsafe(), Some(Stat::default()))));
        let _ = conn.expect_set_acl("/a", read_acl_unsafe(), 0, Ok(Some(Stat::default())));

        assert_eq!(client.get_acl("/a"), Ok((open_acl_unsafe(), Some(Stat::default()))));
        assert_eq!(client.set_acl("/a", &read_acl_unsafe(), 0), Ok(Some(Stat::default())));
    });
}

#[test]
fn credentials_are_registered_on_start() {
    let harness = TestClient::new().configure(|builder| builder.authorization("digest", "user:pw"));
    let _ = harness.connection().expect_add_auth("digest", "user:pw", Ok(()));

    harness.run(|| {});
}

#[test]
fn rejected_credentials_fail_start() {
    let harness = TestClient::new().configure(|builder| builder.authorization("digest", "bad"));
    let _ = harness.connection().expect_add_auth("digest", "bad", Err(KeeperError::NoAuth));
    let _ = harness.connection().expect_close();

    let result = harness.try_run(|| {});

    assert_eq!(result, Err(keeper_harness::HarnessError::Client(KeeperError::NoAuth)));
}

#[test]
fn new_ensure_path_applies_namespace() {
    with_client_and_namespace("ns", |client: KeeperClient| {
        let handle = client.new_ensure_path("/a/b").expect("path should be valid");

        assert_eq!(handle.path(), "/ns/a/b");
        assert!(handle.makes_last());
    });
}

#[test]
fn invalid_paths_are_rejected_before_sending() {
    with_client(|client: KeeperClient| {
        let relative = client.get_data().for_path("relative");
        assert!(matches!(relative, Err(KeeperError::BadArguments(_))));
        assert!(matches!(client.sync("/a/"), Err(KeeperError::BadArguments(_))));
    });
}
