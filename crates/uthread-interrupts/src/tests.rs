use std::time::Duration;

use super::*;

// Each test runs on its own OS thread, so the signal mask it edits is private.

#[test]
fn test_disable_reports_prior_state() {
    enable();
    assert!(disable());
    assert!(!are_enabled());
    assert!(!disable());
    assert!(!enable());
    assert!(are_enabled());
}

#[test]
fn test_set_state_restores_exactly() {
    enable();
    let prior = disable();
    set_state(prior);
    assert!(are_enabled());

    disable();
    let prior = enable();
    set_state(prior);
    assert!(!are_enabled());
}

#[test]
fn test_guards_nest() {
    enable();
    {
        let outer = InterruptGuard::new();
        assert!(outer.prior());
        {
            let inner = InterruptGuard::new();
            assert!(!inner.prior());
            assert!(!are_enabled());
        }
        assert!(!are_enabled());
    }
    assert!(are_enabled());
}

#[test]
fn test_guard_keeps_disabled_state() {
    disable();
    {
        let _guard = InterruptGuard::new();
    }
    assert!(!are_enabled());
    enable();
}

#[test]
fn test_timer_config_defaults() {
    let config = TimerConfigBuilder::default().build().unwrap();
    assert_eq!(config.interval, Duration::from_millis(10));
    assert!(config.restart_syscalls);

    let config = TimerConfigBuilder::default()
        .interval(Duration::from_millis(2))
        .build()
        .unwrap();
    assert_eq!(config.interval, Duration::from_millis(2));
}

#[test]
fn test_init_rejects_zero_interval() {
    fn never() {}
    let config = TimerConfigBuilder::default()
        .interval(Duration::ZERO)
        .build()
        .unwrap();
    let err = init(&config, never).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}
