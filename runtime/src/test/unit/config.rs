use test_case::test_case;

use crate::{RuntimeConfig, parse_visible_devices};

#[test_case("0", &[0]; "single")]
#[test_case("2,0", &[2, 0]; "reordered")]
#[test_case(" 1 , 3 ", &[1, 3]; "whitespace")]
#[test_case("1,x,0", &[1]; "stops at invalid entry")]
#[test_case("", &[]; "empty hides all")]
#[test_case("-1", &[]; "negative hides all")]
fn test_parse_visible_devices(value: &str, expected: &[usize]) {
    assert_eq!(parse_visible_devices(value), expected);
}

#[test]
fn test_defaults() {
    let config = RuntimeConfig::default();
    assert_eq!(config, RuntimeConfig::builder().build());
    assert_eq!(config.accelerators, 1);
    assert_eq!(config.visible_accelerators(), vec![0]);
    assert_eq!(config.memory_limits().host, None);
}

#[test]
fn test_visibility_remaps_ordinals() {
    let config = RuntimeConfig::builder().accelerators(4).visible_devices(vec![3, 1]).build();

    assert_eq!(config.visible_accelerators(), vec![3, 1]);
    assert_eq!(config.physical_ordinal(0), Some(3));
    assert_eq!(config.physical_ordinal(1), Some(1));
    assert_eq!(config.physical_ordinal(2), None);
}

#[test]
fn test_visibility_drops_missing_and_repeated() {
    let config = RuntimeConfig::builder().accelerators(2).visible_devices(vec![1, 5, 1, 0]).build();
    assert_eq!(config.visible_accelerators(), vec![1, 0]);
}

#[test]
fn test_memory_limits() {
    let config = RuntimeConfig::builder().accelerator_memory(1024).host_memory(2048).build();
    let limits = config.memory_limits();
    assert_eq!(limits.accelerator, 1024);
    assert_eq!(limits.host, Some(2048));
}
