//! Error handling and edge case tests.

use location_registry::{
    is_available, Availability, LocationError, LocationService, Priority, RawRequest,
    ServiceConfig, SimulatedProvider, SubscriptionId, SubscriptionRequest,
};
use std::sync::Arc;
use std::time::Duration;

fn test_service() -> LocationService<SimulatedProvider> {
    let service =
        LocationService::new(Arc::new(SimulatedProvider::new()), ServiceConfig::default())
            .unwrap();
    service.activate(true).unwrap();
    service
}

fn request() -> SubscriptionRequest {
    SubscriptionRequest::new(Priority::BalancedPower, Duration::from_secs(10))
}

// --- Availability ---

#[test]
fn test_unavailable_provider_rejects_subscribe() {
    let service = test_service();
    service
        .provider()
        .set_availability(Availability::ServiceMissing);

    assert!(!service.is_available());
    let result = service.start_updates(request());
    assert!(matches!(
        result,
        Err(LocationError::ProviderUnavailable(Availability::ServiceMissing))
    ));
    assert_eq!(service.subscription_count(), 0);
}

#[test]
fn test_failed_availability_check_is_unavailable() {
    let provider = SimulatedProvider::new();
    provider.fail_availability_check("binder transaction failed");

    // Should return false, not panic
    assert!(!is_available(&provider));
}

#[test]
fn test_availability_check_can_be_disabled() {
    let service = LocationService::new(
        Arc::new(SimulatedProvider::new()),
        ServiceConfig {
            require_availability: false,
            ..Default::default()
        },
    )
    .unwrap();
    service.activate(true).unwrap();
    service.provider().set_availability(Availability::Disabled);

    assert!(service.start_updates(request()).is_ok());
}

// --- Invalid Requests ---

#[test]
fn test_invalid_raw_request_creates_no_state() {
    let service = test_service();

    let bad = [
        RawRequest {
            priority: 999,
            interval: 1000,
            ..Default::default()
        },
        RawRequest {
            priority: Priority::LOW_POWER_CODE,
            interval: -1,
            ..Default::default()
        },
        RawRequest {
            priority: Priority::LOW_POWER_CODE,
            expiration_duration: 5_000,
            expiration_time: 1_700_000_000_000,
            ..Default::default()
        },
    ];

    for raw in bad {
        let result = service.start_updates_raw(raw);
        assert!(
            matches!(result, Err(LocationError::InvalidArgument(_))),
            "accepted {:?}",
            raw
        );
    }

    assert_eq!(service.subscription_count(), 0);
    assert!(service.provider().active_requests().is_empty());

    // No ids were consumed by the failed calls
    let handle = service.start_updates(request()).unwrap();
    assert_eq!(handle.id, SubscriptionId(1));
}

#[test]
fn test_invalid_typed_request() {
    let service = test_service();

    let result = service.start_updates(request().with_num_updates(0));
    assert!(matches!(result, Err(LocationError::InvalidArgument(_))));

    let result = service.start_updates(request().expires_after(Duration::ZERO));
    assert!(matches!(result, Err(LocationError::InvalidArgument(_))));
}

// --- Lifecycle Errors ---

#[test]
fn test_subscribe_before_activate() {
    let service =
        LocationService::new(Arc::new(SimulatedProvider::new()), ServiceConfig::default())
            .unwrap();

    assert!(matches!(
        service.start_updates(request()),
        Err(LocationError::NotActive)
    ));
}

#[test]
fn test_subscribe_after_deactivate() {
    let service = test_service();
    service.activate(false).unwrap();

    assert!(matches!(
        service.start_updates(request()),
        Err(LocationError::NotActive)
    ));
}

#[test]
fn test_stop_unknown_id() {
    let service = test_service();

    // Should be a no-op, not an error
    assert!(!service.stop_updates(SubscriptionId(42)));
    assert!(!service.stop_updates(SubscriptionId(42)));
}

#[test]
fn test_activate_twice() {
    let service = test_service();
    service.activate(true).unwrap();
    assert!(service.is_active());
}

// --- Configuration ---

#[test]
fn test_invalid_config_rejected() {
    let result = LocationService::new(
        Arc::new(SimulatedProvider::new()),
        ServiceConfig {
            worker_name: String::new(),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(LocationError::Config(_))));

    let result = ServiceConfig::from_json(r#"{"subscriber_buffer": "lots"}"#);
    assert!(matches!(result, Err(LocationError::Config(_))));
}
