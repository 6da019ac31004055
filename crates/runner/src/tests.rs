use super::*;

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[test]
fn parse_init_with_all_flags() {
    let cli = parse_args(&strings(&[
        "--storage-dir",
        "/tmp/pl",
        "init",
        "--name",
        "A & B",
        "--identity",
        "a@example.com",
        "--partner",
        "b@example.com",
        "--target-date-ms",
        "1900000000000",
    ]))
    .expect("parse");
    assert_eq!(cli.storage_dir, PathBuf::from("/tmp/pl"));
    match cli.command {
        Command::Init {
            name,
            identity,
            partner,
            target_date_ms,
        } => {
            assert_eq!(name, "A & B");
            assert_eq!(identity, "a@example.com");
            assert_eq!(partner, "b@example.com");
            assert_eq!(target_date_ms, Some(1_900_000_000_000));
        }
        other => panic!("expected init, got {other:?}"),
    }
}

#[test]
fn parse_turn_requires_root_and_message() {
    let cli = parse_args(&strings(&[
        "turn",
        "ROOT-001",
        "--identity",
        "a@example.com",
        "--message",
        "find a venue",
    ]))
    .expect("parse");
    match cli.command {
        Command::Turn { root, message, .. } => {
            assert_eq!(root, "ROOT-001");
            assert_eq!(message, "find a venue");
        }
        other => panic!("expected turn, got {other:?}"),
    }

    let err = parse_args(&strings(&["turn", "--identity", "a@example.com"]))
        .expect_err("missing root must fail");
    assert_eq!(err, "turn needs a root id");
}

#[test]
fn unknown_command_is_rejected() {
    let err = parse_args(&strings(&["frobnicate"])).expect_err("unknown command");
    assert_eq!(err, "unknown command: frobnicate");
}

#[test]
fn bad_integer_flag_is_rejected() {
    let err = parse_args(&strings(&[
        "init",
        "--name",
        "x",
        "--identity",
        "a",
        "--partner",
        "b",
        "--target-date-ms",
        "soon",
    ]))
    .expect_err("bad integer");
    assert_eq!(err, "--target-date-ms must be an integer");
}
