use nmap_web_rs::target::is_valid_target;

#[test]
fn accepts_ips_and_domains() {
    for t in ["192.168.1.1", "8.8.8.8", "999.999.999.999", "example.com", "scanme.example"] {
        assert!(is_valid_target(t), "{t} should be accepted");
    }
}

#[test]
fn rejects_junk() {
    for t in ["not a host", "-bad.com", "", "256", "example", "1.2.3", "a.b.c.d", "ex ample.com"] {
        assert!(!is_valid_target(t), "{t} should be rejected");
    }
}
