//! Integration tests for cloud providers
//!
//! The mock tests run everywhere. Tests against a real AWS account are
//! marked with `#[ignore]` and only do something when credentials are set.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no credentials required)
//! cargo test -p dwhpipe-cloud --test integration_tests
//!
//! # Run read-only AWS tests
//! AWS_ACCESS_KEY=... \
//! AWS_SECRET_KEY=... \
//! AWS_SESSION_TOKEN=... \
//! DWHPIPE_TEST_ROLE=dwhRole \
//! cargo test -p dwhpipe-cloud --features aws --test integration_tests -- --ignored
//! ```

use dwhpipe_cloud::mock::ops;
use dwhpipe_cloud::{
    ClusterProvider, ClusterSpec, ClusterStatus, IdentityProvider, IngressRule, MockProvider,
    NetworkProvider, ProviderError, RoleSpec, MOCK_SECURITY_GROUP_ID, S3_READ_ONLY_POLICY_ARN,
};
use dwhpipe_core::ClusterType;

// =============================================================================
// Helper Functions
// =============================================================================

/// Check if AWS credentials are available
fn has_aws_credentials() -> bool {
    dwhpipe_core::Credentials::from_env().is_ok()
}

fn cluster_spec(role_arn: &str) -> ClusterSpec {
    ClusterSpec {
        identifier: "dwhCluster".to_string(),
        cluster_type: ClusterType::MultiNode,
        node_type: "dc2.large".to_string(),
        number_of_nodes: 4,
        db_name: "dwh".to_string(),
        master_username: "dwhuser".to_string(),
        master_password: "Passw0rd".to_string(),
        port: 5439,
        iam_roles: vec![role_arn.to_string()],
    }
}

// =============================================================================
// Mock Provider Tests (No credentials required)
// =============================================================================

#[tokio::test]
async fn test_mock_role_then_cluster_workflow() {
    let provider = MockProvider::new()
        .with_status_script(vec![ClusterStatus::Creating, ClusterStatus::Available]);

    provider.create_role(&RoleSpec::for_redshift("dwhRole")).await.unwrap();
    provider
        .attach_role_policy("dwhRole", S3_READ_ONLY_POLICY_ARN)
        .await
        .unwrap();
    let arn = provider.get_role_arn("dwhRole").await.unwrap();

    provider.create_cluster(&cluster_spec(&arn)).await.unwrap();

    let creating = provider.describe_cluster("dwhCluster").await.unwrap();
    assert_eq!(creating.status, ClusterStatus::Creating);

    let available = provider.describe_cluster("dwhCluster").await.unwrap();
    assert_eq!(available.status, ClusterStatus::Available);
    assert_eq!(available.iam_roles, vec![arn]);
    assert_eq!(available.number_of_nodes, Some(4));

    let vpc_id = available.vpc_id.clone().unwrap();
    let group = provider.default_security_group(&vpc_id).await.unwrap();
    assert_eq!(group.group_id, MOCK_SECURITY_GROUP_ID);

    provider
        .authorize_ingress(&group, &IngressRule::tcp_from_anywhere(5439))
        .await
        .unwrap();

    assert_eq!(
        provider.calls().await,
        vec![
            ops::CREATE_ROLE,
            ops::ATTACH_ROLE_POLICY,
            ops::GET_ROLE,
            ops::CREATE_CLUSTER,
            ops::DESCRIBE_CLUSTERS,
            ops::DESCRIBE_CLUSTERS,
            ops::DESCRIBE_SECURITY_GROUPS,
            ops::AUTHORIZE_INGRESS,
        ]
    );
}

#[tokio::test]
async fn test_mock_teardown_workflow() {
    let provider = MockProvider::new()
        .with_role("dwhRole")
        .with_cluster("dwhCluster", ClusterStatus::Available)
        .with_delete_delay(2);
    provider
        .attach_role_policy("dwhRole", S3_READ_ONLY_POLICY_ARN)
        .await
        .unwrap();

    provider.delete_cluster("dwhCluster", true).await.unwrap();

    for _ in 0..2 {
        let status = provider.describe_cluster("dwhCluster").await.unwrap().status;
        assert_eq!(status, ClusterStatus::Deleting);
    }
    assert!(matches!(
        provider.describe_cluster("dwhCluster").await,
        Err(ProviderError::ClusterNotFound(_))
    ));

    provider
        .detach_role_policy("dwhRole", S3_READ_ONLY_POLICY_ARN)
        .await
        .unwrap();
    provider.delete_role("dwhRole").await.unwrap();
    assert!(provider.role("dwhRole").await.is_none());
}

#[tokio::test]
async fn test_mock_second_cluster_is_rejected() {
    let provider = MockProvider::new().with_role("dwhRole");
    let arn = provider.get_role_arn("dwhRole").await.unwrap();

    provider.create_cluster(&cluster_spec(&arn)).await.unwrap();
    let err = provider.create_cluster(&cluster_spec(&arn)).await.unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_mock_delete_missing_cluster() {
    let provider = MockProvider::new();
    let err = provider.delete_cluster("dwhCluster", true).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_mock_clone_shares_state() {
    let provider = MockProvider::new();
    let cloned = provider.clone();

    cloned.create_role(&RoleSpec::for_redshift("dwhRole")).await.unwrap();

    assert!(provider.get_role_arn("dwhRole").await.is_ok());
    assert_eq!(provider.call_count(ops::CREATE_ROLE).await, 1);
}

#[tokio::test]
async fn test_mock_injected_failure_is_per_operation() {
    let provider = MockProvider::new().with_role("dwhRole");
    provider
        .fail_on(
            ops::ATTACH_ROLE_POLICY,
            ProviderError::PermissionDenied("not authorized to perform iam:AttachRolePolicy".into()),
        )
        .await;

    assert!(matches!(
        provider.attach_role_policy("dwhRole", S3_READ_ONLY_POLICY_ARN).await,
        Err(ProviderError::PermissionDenied(_))
    ));
    assert!(provider.get_role_arn("dwhRole").await.is_ok());
}

// =============================================================================
// Real AWS Tests (Require credentials)
// =============================================================================

#[tokio::test]
#[ignore] // Run with: cargo test --features aws -- --ignored
async fn test_aws_get_role_arn() {
    if !has_aws_credentials() {
        return;
    }

    #[cfg(feature = "aws")]
    {
        use dwhpipe_cloud::AwsProvider;

        let credentials = dwhpipe_core::Credentials::from_env().unwrap();
        let role = std::env::var("DWHPIPE_TEST_ROLE").unwrap_or_else(|_| "dwhRole".to_string());
        let provider = AwsProvider::connect(&credentials, "us-west-2").await;

        match provider.get_role_arn(&role).await {
            Ok(arn) => {
                assert!(arn.starts_with("arn:aws:iam::"));
                println!("Role {} resolved to {}", role, arn);
            }
            Err(e) => println!("Role lookup failed: {}", e),
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_aws_describe_missing_cluster() {
    if !has_aws_credentials() {
        return;
    }

    #[cfg(feature = "aws")]
    {
        use dwhpipe_cloud::AwsProvider;

        let credentials = dwhpipe_core::Credentials::from_env().unwrap();
        let provider = AwsProvider::connect(&credentials, "us-west-2").await;

        let result = provider
            .describe_cluster("dwhpipe-cluster-that-does-not-exist")
            .await;
        assert!(matches!(result, Err(ProviderError::ClusterNotFound(_))));
    }
}
