use super::*;

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn replay_reaches_registered() {
    let lines = replay_lines(&args(&["line:true", "phone:true", "registration:true"])).unwrap();
    assert_eq!(lines[0], "start unauthenticated");
    assert!(lines[3].starts_with("registration:true -> user_registered [move]"), "{}", lines[3]);
    assert!(lines[3].ends_with("guard=Allow"));
}

#[test]
fn replay_reports_rejections() {
    let lines = replay_lines(&args(&["phone:true"])).unwrap();
    assert!(lines[1].contains("[rejected:"), "{}", lines[1]);
}

#[test]
fn replay_rejects_unknown_signal() {
    assert!(matches!(replay_lines(&args(&["line:maybe"])), Err(CliError::UnknownSignal(s)) if s == "line:maybe"));
}

#[test]
fn cookie_header_joins_present_values() {
    assert_eq!(cookie_header(None, None), None);
    assert_eq!(cookie_header(Some("s1"), None).as_deref(), Some("session=s1"));
    assert_eq!(cookie_header(Some("s1"), Some("true")).as_deref(), Some("session=s1; phone_authenticated=true"));
}
