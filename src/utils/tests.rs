use super::error::{BusError, DispatchError, EmitError, ProvisionError, TransportError};
use super::logging;
use serial_test::serial;

#[test]
#[serial]
fn logging_filter_uses_configured_level_without_rust_log() {
    temp_env::with_var_unset("RUST_LOG", || {
        assert_eq!(logging::filter("debug").to_string(), "debug");
        assert_eq!(logging::filter(" warn ").to_string(), "warn");
    });
}

#[test]
#[serial]
fn logging_filter_prefers_rust_log() {
    temp_env::with_var("RUST_LOG", Some("error"), || {
        assert_eq!(logging::filter("debug").to_string(), "error");
    });
}

#[test]
#[serial]
fn logging_init_is_idempotent() {
    logging::init("info");
    assert!(!logging::init("debug"));
}

#[test]
fn config_errors_render_mandatory_messages() {
    assert_eq!(BusError::TopicRequired.to_string(), "topic is mandatory");
    assert_eq!(BusError::ChannelRequired.to_string(), "channel is mandatory");
    assert_eq!(BusError::HandlerRequired.to_string(), "handler is mandatory");
}

#[test]
fn provision_errors_are_transparent_through_bus_error() {
    let err: BusError = ProvisionError::NoNodes.into();
    assert_eq!(err.to_string(), "no nodes found");

    let err: BusError = ProvisionError::UnexpectedStatus(500).into();
    assert_eq!(err.to_string(), "unexpected status code: 500");
}

#[test]
fn reply_failure_is_a_dispatch_error() {
    let err: DispatchError = EmitError::Rejected("503 Service Unavailable".into()).into();
    assert!(matches!(err, DispatchError::Reply(EmitError::Rejected(_))));
    assert_eq!(
        err.to_string(),
        "failed to publish reply: publish rejected: 503 Service Unavailable"
    );
}

#[test]
fn transport_errors_compare_by_value() {
    let err: BusError = TransportError::InvalidTopicName("bad topic".into()).into();
    assert!(matches!(
        err,
        BusError::Transport(TransportError::InvalidTopicName(ref name)) if name == "bad topic"
    ));
}
