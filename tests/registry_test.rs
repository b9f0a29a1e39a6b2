//! Registry behaviour through the coordinator.

use std::sync::Arc;
use std::thread;

use mesh_coordinator::config::{MeshConfig, RegistryConfig};
use mesh_coordinator::{metadata_from_json, ErrorKind, MeshError, ServiceQuery, ServiceStatus};

mod common;
use common::{mesh, mesh_with, record, ScriptedProber, ServiceRecorder};

#[test]
fn test_ids_are_unique_across_names() {
    let mesh = mesh(ScriptedProber::new());
    mesh.register_service(record("api", "x", 1)).unwrap();

    let err = mesh.register_service(record("web", "x", 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(mesh.discover_services("web").unwrap().is_empty());
    assert_eq!(mesh.all_services().len(), 1);
}

#[test]
fn test_list_by_name_keeps_registration_order() {
    let mesh = mesh(ScriptedProber::new());
    for id in ["c", "a", "b"] {
        mesh.register_service(record("api", id, 1)).unwrap();
    }
    mesh.register_service(record("web", "w", 1)).unwrap();

    let ids: Vec<String> = mesh
        .discover_services("api")
        .unwrap()
        .into_iter()
        .map(|r| r.service_id)
        .collect();
    assert_eq!(ids, vec!["c", "a", "b"]);

    mesh.unregister_service("a").unwrap();
    mesh.register_service(record("api", "a", 1)).unwrap();
    let ids: Vec<String> = mesh
        .discover_services("api")
        .unwrap()
        .into_iter()
        .map(|r| r.service_id)
        .collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
    assert!(mesh.discover_services("nothing").unwrap().is_empty());
}

#[test]
fn test_empty_identifiers_rejected_everywhere() {
    let mesh = mesh(ScriptedProber::new());
    assert_eq!(
        mesh.register_service(record("", "a", 1)).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        mesh.register_service(record("api", "", 1)).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert!(matches!(mesh.unregister_service(""), Err(MeshError::InvalidArgument(_))));
    assert!(matches!(mesh.discover_services(""), Err(MeshError::InvalidArgument(_))));
    assert!(matches!(mesh.select_service("", None), Err(MeshError::InvalidArgument(_))));
    assert!(matches!(mesh.stop_health_monitoring(""), Err(MeshError::InvalidArgument(_))));
    assert!(matches!(mesh.circuit_breaker_status(""), Err(MeshError::InvalidArgument(_))));
    assert!(matches!(mesh.service_weights(""), Err(MeshError::InvalidArgument(_))));
}

#[test]
fn test_metadata_update() {
    let mesh = mesh(ScriptedProber::new());
    mesh.register_service(record("api", "a", 1)).unwrap();

    let metadata = metadata_from_json(r#"{"version":"1.2.0","zone":"eu"}"#).unwrap();
    mesh.update_service_metadata("a", metadata).unwrap();
    assert_eq!(mesh.service("a").unwrap().metadata["zone"], "eu");

    let err = mesh
        .update_service_metadata("missing", serde_json::Value::Null)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(metadata_from_json("{oops").unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_initial_status_is_configurable() {
    let config = MeshConfig {
        registry: RegistryConfig {
            initial_status: ServiceStatus::Unknown,
        },
        ..MeshConfig::default()
    };
    let mesh = mesh_with(ScriptedProber::new(), config);
    mesh.register_service(record("api", "a", 1)).unwrap();

    assert_eq!(mesh.service_health("a").unwrap().status, ServiceStatus::Unknown);
    // Unknown instances are not offered.
    assert_eq!(
        mesh.select_service("api", None).unwrap_err().kind(),
        ErrorKind::HealthCheckFailed
    );
}

#[test]
fn test_service_listener_sees_set_changes() {
    let mesh = mesh(ScriptedProber::new());
    let first = ServiceRecorder::default();
    let second = ServiceRecorder::default();

    mesh.set_service_listener(Some(Box::new(first.clone())));
    mesh.register_service(record("api", "a", 1)).unwrap();
    let _ = mesh.register_service(record("api", "a", 1));

    mesh.set_service_listener(Some(Box::new(second.clone())));
    mesh.unregister_service("a").unwrap();

    assert_eq!(first.events(), vec!["+a"]);
    assert_eq!(second.events(), vec!["-a"]);
}

#[test]
fn test_concurrent_registration_never_duplicates() {
    let mesh = Arc::new(mesh(ScriptedProber::new()));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let mesh = mesh.clone();
            thread::spawn(move || {
                let mut won = 0;
                for i in 0..50 {
                    let id = format!("svc-{i}");
                    let name = if t % 2 == 0 { "even" } else { "odd" };
                    if mesh.register_service(record(name, &id, 1)).is_ok() {
                        won += 1;
                    }
                }
                won
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 50);

    let all = mesh.all_services();
    assert_eq!(all.len(), 50);
    let even = mesh.discover_services("even").unwrap().len();
    let odd = mesh.discover_services("odd").unwrap().len();
    assert_eq!(even + odd, 50);
    assert_eq!(mesh.stats().total_services, 50);
}

#[test]
fn test_register_racing_unregister_leaves_no_breaker() {
    let mesh = Arc::new(mesh(ScriptedProber::new()));
    let registrar = {
        let mesh = mesh.clone();
        thread::spawn(move || {
            for i in 0..2000 {
                let _ = mesh.register_service(record("api", &format!("a{i}"), 1));
            }
        })
    };
    let remover = {
        let mesh = mesh.clone();
        thread::spawn(move || {
            for i in 0..2000 {
                let id = format!("a{i}");
                // Spin briefly so some removals land mid-registration.
                for _ in 0..50 {
                    if mesh.unregister_service(&id).is_ok() {
                        break;
                    }
                    std::hint::spin_loop();
                }
            }
        })
    };
    registrar.join().unwrap();
    remover.join().unwrap();

    for i in 0..2000 {
        let id = format!("a{i}");
        let registered = mesh.service(&id).is_ok();
        match mesh.circuit_breaker_status(&id) {
            Ok(_) => assert!(registered, "breaker left behind for {id}"),
            Err(e) => {
                assert!(!registered, "registered {id} has no breaker");
                assert_eq!(e.kind(), ErrorKind::NotFound);
            }
        }
        if registered {
            mesh.report_performance(&id, std::time::Duration::from_millis(1), true).unwrap();
        }
    }
}

#[test]
fn test_find_services_by_name_and_tags() {
    let mesh = mesh(ScriptedProber::new());
    let tags = |t: &str| metadata_from_json(t).unwrap();
    mesh.register_service(record("orders-api", "o1", 1).with_metadata(tags(r#"{"tags": ["eu", "canary"]}"#)))
        .unwrap();
    mesh.register_service(record("orders-api", "o2", 1).with_metadata(tags(r#"{"tags": ["eu"]}"#)))
        .unwrap();
    mesh.register_service(record("billing", "b1", 1).with_metadata(tags(r#"{"tags": ["canary"]}"#)))
        .unwrap();

    let ids = |query: ServiceQuery| -> Vec<String> {
        mesh.find_services(&query).into_iter().map(|r| r.service_id).collect()
    };
    assert_eq!(ids(ServiceQuery::new().with_tag("canary")), vec!["b1", "o1"]);
    assert_eq!(ids(ServiceQuery::new().name_contains("orders").with_tag("eu")), vec!["o1", "o2"]);
    assert!(ids(ServiceQuery::new().with_tag("us")).is_empty());
    assert_eq!(ids(ServiceQuery::new()).len(), 3);
}
