use portscan_sim::ports::{lookup, scan_ports};
use portscan_sim::types::{Risk, ScanType};

#[test]
fn every_preset_port_has_complete_metadata() {
    for t in [ScanType::Quick, ScanType::Standard, ScanType::Full] {
        for port in scan_ports(t) {
            let info = lookup(port);
            assert_eq!(info.port, port);
            assert!(matches!(info.risk, Risk::Low | Risk::Medium | Risk::High));
            assert!(!info.service.is_empty(), "port {port} has no service");
            assert!(!info.description.is_empty(), "port {port} has no description");
            assert!(!info.recommendation.is_empty(), "port {port} has no recommendation");
        }
    }
}

#[test]
fn quick_preset_is_fixed() {
    assert_eq!(
        scan_ports(ScanType::Quick),
        vec![21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 3306, 3389, 5432, 8080, 27017]
    );
    assert_eq!(scan_ports(ScanType::Quick), scan_ports(ScanType::Quick));
}

#[test]
fn full_preset_is_one_to_hundred() {
    let full = scan_ports(ScanType::Full);
    assert_eq!(full.len(), 100);
    assert_eq!(full.first(), Some(&1));
    assert_eq!(full.last(), Some(&100));
}

#[test]
fn lookup_extremes_never_fail() {
    assert_eq!(lookup(0).service, "Unknown");
    assert_eq!(lookup(65535).risk, Risk::Low);
    assert_eq!(lookup(27017).service, "MongoDB");
}
