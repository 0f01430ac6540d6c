//! Snapshots of the sub-operations a transaction hands to the session.

use keeper_core::{ANY_VERSION, KeeperClient, MultiOp, MultiResponse};
use keeper_harness::{ConnectionDouble, TestClient};

#[test]
fn namespaced_transaction_is_recorded_with_full_paths() {
    let harness = TestClient::new().with_namespace("app");
    let connection = harness.connection().clone();

    harness.run(|conn: ConnectionDouble, client: KeeperClient| {
        let _ = conn.expect_exists("/app", Ok((true, None)));
        let _ = conn.expect_multi(
            vec![
                MultiOp::Check { path: "/app/lock".to_string(), version: 3 },
                MultiOp::Delete { path: "/app/lock/owner".to_string(), version: -1 },
            ],
            Ok(vec![MultiResponse::ok(), MultiResponse::ok()]),
        );

        let responses = client
            .in_transaction()
            .check("/lock", 3)
            .delete("/lock/owner", ANY_VERSION)
            .commit()
            .expect("commit should succeed");
        assert_eq!(responses.len(), 2);
    });

    insta::assert_json_snapshot!(connection.recorded_operations(), @r#"
    [
      {
        "Check": {
          "path": "/app/lock",
          "version": 3
        }
      },
      {
        "Delete": {
          "path": "/app/lock/owner",
          "version": -1
        }
      }
    ]
    "#);
}
