//! End-to-end provisioning flows against the in-memory Compute API.

mod common;

use std::sync::Arc;

use common::{fast_provisioning, link, FakeCompute};
use lb_cert_provisioner::compute::{ComputeApi, ComputeError, SslCertificate};
use lb_cert_provisioner::provisioning::{ProvisionError, ProvisionRequest, Provisioner};

fn provisioner(fake: &Arc<FakeCompute>) -> Provisioner {
    let compute: Arc<dyn ComputeApi> = fake.clone();
    Provisioner::new(compute, &fast_provisioning())
}

fn request(domain: &str, lb: &str) -> ProvisionRequest {
    ProvisionRequest {
        domain: domain.to_string(),
        load_balancer_name: lb.to_string(),
    }
}

#[tokio::test]
async fn test_example_com_end_to_end() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.pending_polls = 2);

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    let cert = link("sslCertificates", "cert-example-com");
    assert_eq!(report.certificate, cert);
    assert!(report.certificate_created);
    assert!(report.backend_patched);
    assert!(report.url_map_updated);
    assert!(report.proxy_patched);

    assert_eq!(fake.backend("lb-1").ssl_certificates, vec![cert.clone()]);
    assert_eq!(
        fake.url_map("lb-1-map").host_rules[0].hosts,
        vec!["old.example.org", "example.com"]
    );
    assert_eq!(fake.proxy("lb-1-https-proxy").ssl_certificates, vec![cert]);

    // Four mutations, each polled through two RUNNING reports to DONE.
    assert_eq!(fake.calls("insert_ssl_certificate"), 1);
    assert_eq!(fake.calls("patch_backend_service"), 1);
    assert_eq!(fake.calls("patch_url_map"), 1);
    assert_eq!(fake.calls("patch_target_https_proxy"), 1);
    assert_eq!(fake.calls("get_global_operation"), 12);
}

#[tokio::test]
async fn test_existing_managed_certificate_is_reused() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    let existing = link("sslCertificates", "legacy-cert");
    fake.with_state(|s| {
        let mut cert = SslCertificate::managed("legacy-cert", "example.com");
        cert.self_link = Some(existing.clone());
        s.certificates.push(cert);
    });

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    assert!(!report.certificate_created);
    assert_eq!(report.certificate, existing);
    assert_eq!(fake.calls("insert_ssl_certificate"), 0);
    assert_eq!(fake.proxy("lb-1-https-proxy").ssl_certificates, vec![existing]);
}

#[tokio::test]
async fn test_certificate_for_other_domain_is_not_reused() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| {
        s.certificates.push(SslCertificate::managed("cert-other", "other.com"));
    });

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    assert!(report.certificate_created);
    assert_eq!(fake.calls("insert_ssl_certificate"), 1);
}

#[tokio::test]
async fn test_backend_already_has_certificate() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    let cert = link("sslCertificates", "cert-example-com");
    fake.with_state(|s| {
        let mut existing = SslCertificate::managed("cert-example-com", "example.com");
        existing.self_link = Some(cert.clone());
        s.certificates.push(existing);
        // Relative form of the same link.
        s.backend_services[0].ssl_certificates =
            vec!["projects/test-project/global/sslCertificates/cert-example-com".into()];
    });

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    assert!(!report.backend_patched);
    assert_eq!(fake.calls("patch_backend_service"), 0);
    assert!(report.proxy_patched);
}

#[tokio::test]
async fn test_second_identical_call_changes_nothing() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    let provisioner = provisioner(&fake);

    provisioner.provision(&request("example.com", "lb-1")).await.unwrap();
    let second = provisioner.provision(&request("example.com", "lb-1")).await.unwrap();

    assert!(!second.certificate_created);
    assert!(!second.backend_patched);
    assert!(!second.url_map_updated);
    assert!(!second.proxy_patched);

    assert_eq!(fake.calls("insert_ssl_certificate"), 1);
    assert_eq!(fake.calls("patch_backend_service"), 1);
    assert_eq!(fake.calls("patch_url_map"), 1);
    assert_eq!(fake.calls("patch_target_https_proxy"), 1);

    fake.with_state(|s| assert_eq!(s.certificates.len(), 1));
    assert_eq!(fake.backend("lb-1").ssl_certificates.len(), 1);
    assert_eq!(fake.url_map("lb-1-map").host_rules[0].hosts.len(), 2);
    assert_eq!(fake.proxy("lb-1-https-proxy").ssl_certificates.len(), 1);
}

#[tokio::test]
async fn test_proxy_fingerprint_conflict_is_resolved_by_rereading() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.proxy_conflicts = 2);

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    assert!(report.proxy_patched);
    assert_eq!(fake.calls("patch_target_https_proxy"), 3);
    assert_eq!(fake.calls("get_target_https_proxy"), 3);
    assert_eq!(
        fake.proxy("lb-1-https-proxy").ssl_certificates,
        vec![link("sslCertificates", "cert-example-com")]
    );
}

#[tokio::test]
async fn test_backend_fingerprint_conflict_is_resolved_by_rereading() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| {
        s.backend_conflicts = 1;
        s.backend_services[0].ssl_certificates = vec![link("sslCertificates", "cert-other")];
    });

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    assert!(report.backend_patched);
    assert_eq!(fake.calls("patch_backend_service"), 2);
    assert_eq!(
        fake.backend("lb-1").ssl_certificates,
        vec![link("sslCertificates", "cert-other"), link("sslCertificates", "cert-example-com")]
    );
}

#[tokio::test]
async fn test_concurrent_requests_keep_both_backend_certificates() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| {
        s.pending_polls = 1;
        s.backend_patch_failures = 1;
    });
    let provisioner = provisioner(&fake);

    let first = request("a.example.com", "lb-1");
    let second = request("b.example.com", "lb-1");
    let (a, b) = tokio::join!(provisioner.provision(&first), provisioner.provision(&second));
    a.unwrap();
    b.unwrap();

    let cert_a = link("sslCertificates", "cert-a-example-com");
    let cert_b = link("sslCertificates", "cert-b-example-com");
    let backend = fake.backend("lb-1").ssl_certificates;
    assert!(backend.contains(&cert_a), "backend lost {}", cert_a);
    assert!(backend.contains(&cert_b), "backend lost {}", cert_b);
    assert_eq!(backend.len(), 2);

    let proxy = fake.proxy("lb-1-https-proxy").ssl_certificates;
    assert!(proxy.contains(&cert_a) && proxy.contains(&cert_b));
    let hosts = fake.url_map("lb-1-map").host_rules[0].hosts.clone();
    assert!(hosts.iter().any(|h| h == "a.example.com"));
    assert!(hosts.iter().any(|h| h == "b.example.com"));
}

#[tokio::test]
async fn test_url_map_conflict_relists_and_keeps_concurrent_edit() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.url_map_conflicts = 1);

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    assert!(report.url_map_updated);
    assert_eq!(fake.calls("patch_url_map"), 2);
    // Stage lookup plus one re-list after the conflict.
    assert_eq!(fake.calls("list_url_maps"), 2);
    assert_eq!(
        fake.url_map("lb-1-map").host_rules[0].hosts,
        vec!["old.example.org", "edited.example.net", "example.com"]
    );
}

#[tokio::test]
async fn test_transient_backend_patch_failures_are_retried() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.backend_patch_failures = 3);

    let report = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    assert!(report.backend_patched);
    assert_eq!(fake.calls("patch_backend_service"), 4);
}

#[tokio::test]
async fn test_backend_patch_gives_up_after_retry_budget() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.backend_patch_failures = 100);

    let err = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Compute(ComputeError::Api { status: 503, .. })));
    assert_eq!(fake.calls("patch_backend_service"), 5);
    assert_eq!(fake.calls("list_url_maps"), 0);
}

#[tokio::test]
async fn test_backend_appearing_late_is_awaited() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.backend_missing_polls = 2);

    provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    // Three readiness probes, then one re-read before the patch.
    assert_eq!(fake.calls("get_backend_service"), 4);
}

#[tokio::test]
async fn test_unknown_load_balancer_is_not_found() {
    let fake = FakeCompute::with_load_balancer("lb-1");

    let err = provisioner(&fake)
        .provision(&request("example.com", "lb-missing"))
        .await
        .unwrap_err();

    match err {
        ProvisionError::NotFound(message) => assert_eq!(message, "Load balancer not found."),
        other => panic!("expected NotFound, got {:?}", other),
    }
    // Readiness budget spent, nothing patched.
    assert_eq!(fake.calls("get_backend_service"), 3);
    assert_eq!(fake.calls("patch_backend_service"), 0);
}

#[tokio::test]
async fn test_missing_url_map_is_not_found() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.url_maps.clear());

    let err = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap_err();

    match err {
        ProvisionError::NotFound(message) => assert_eq!(message, "URL map not found."),
        other => panic!("expected NotFound, got {:?}", other),
    }
    // Stages before the failure are not rolled back.
    assert_eq!(fake.backend("lb-1").ssl_certificates.len(), 1);
}

#[tokio::test]
async fn test_missing_proxy_is_not_found() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.proxies.clear());

    let err = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap_err();

    match err {
        ProvisionError::NotFound(message) => assert_eq!(message, "Target HTTPS proxy not found."),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_operation_error_fails_without_further_polls() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.failing_operation_type = Some("insert".into()));

    let err = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap_err();

    match err {
        ProvisionError::OperationFailed { detail, .. } => {
            assert_eq!(detail, "RESOURCE_NOT_READY: simulated failure")
        }
        other => panic!("expected OperationFailed, got {:?}", other),
    }
    assert_eq!(fake.calls("get_global_operation"), 1);
    assert_eq!(fake.calls("get_backend_service"), 0);
}

#[tokio::test]
async fn test_operation_stuck_running_times_out() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| s.pending_polls = 1_000);

    let err = provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Timeout { attempts: 10, .. }));
    assert_eq!(fake.calls("get_global_operation"), 10);
}

#[tokio::test]
async fn test_url_map_without_host_rules_gets_one() {
    let fake = FakeCompute::with_load_balancer("lb-1");
    fake.with_state(|s| {
        s.url_maps[0].host_rules.clear();
        s.url_maps[0].path_matchers.clear();
    });

    provisioner(&fake)
        .provision(&request("example.com", "lb-1"))
        .await
        .unwrap();

    let map = fake.url_map("lb-1-map");
    assert_eq!(map.host_rules.len(), 1);
    assert_eq!(map.host_rules[0].hosts, vec!["example.com"]);
    assert_eq!(map.host_rules[0].path_matcher, "lb-1-matcher");
    assert_eq!(map.path_matchers[0].default_service, Some(link("backendServices", "lb-1")));
}
