use assert_cmd::prelude::*;
use indoc::{formatdoc, indoc};
use std::process::Command;

const MAIN_HASH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaSSAA9999DCBA8765MLKJ4321000000000000aaaaaaaa0123456789abcdefghijABCDEFGHIJklaaaa";

#[test]
fn test_cli_forge() {
    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("forge")
        .args(["--hash3", "9494"])
        .args(["-t", "6a6b6c6d", "0x71727374", "65666768", "7a7b7c7d"])
        .args(["-p", "0123456789abcdefghijABCDEFGHIJkl"])
        .assert();
    assert.success().stdout(format!("{MAIN_HASH}\n"));
}

#[test]
fn test_cli_forge_rejects_bad_input() {
    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("forge")
        .args(["--hash3", "9494"])
        .args(["-t", "6a6b6c6d", "71727374", "65666768", "7a7b7c7d"])
        .args(["-p", "too short"])
        .assert();
    assert.failure().stderr(indoc! {"
        Error: main hash password is not alphanumeric
    "});

    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("forge")
        .args(["--hash3", "0101"])
        .args(["-t", "6a6b6c6d", "71727374", "65666768", "7a7b7c7d"])
        .args(["-p", "0123456789abcdefghijABCDEFGHIJkl"])
        .assert();
    assert.failure().stderr(indoc! {"
        Error: invalid sum byte 0x01, expected 0x60..=0xf4
    "});
}

#[test]
fn test_cli_parse() {
    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("parse")
        .arg(MAIN_HASH)
        .assert();
    assert.success().stdout(indoc! {"
        hash_1: c2c2c2c2
        hash_2: c2c2c2c2
        hash_3: 9494
        tea key: 6a6b6c6d 71727374 65666768 7a7b7c7d
        password: 0123456789abcdefghijABCDEFGHIJkl
        hwid key: 61616161
    "});

    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("parse")
        .arg("aaaa")
        .assert();
    assert.failure().stderr(indoc! {"
        Error: main hash must be 104 bytes, got 4
    "});
}

#[test]
fn test_cli_hwid() {
    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("hwid")
        .arg("Your ID-code: 0A1B-2C3D-4E5F-6A7B-8C9D-0E1F-2A3B-4C5D")
        .assert();
    assert.success().stdout(indoc! {"
        0A1B-2C3D-4E5F-6A7B-8C9D-0E1F-2A3B-4C5D
    "});

    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("hwid")
        .arg("License expired")
        .assert();
    assert.failure().stderr(indoc! {"
        Error: no HWID found
    "});
}

#[test]
fn test_cli_info() {
    let dir = tempfile::tempdir().unwrap();
    let license = dir.path().join("regkey.dat");
    let keys = dir.path().join("regkey.rsa");

    let mut contents = b"WLREGKEY".to_vec();
    contents.resize(0x190, 0);
    std::fs::write(&license, contents).unwrap();
    // counts 2, 1, 1, 1 followed by the digits
    let mut key_file = vec![2u8, 1, 1, 1];
    for digit in [0xffff_fffbu32, 0xffff_ffff, 0x0001_0001, 0x0000_0061, 3] {
        key_file.extend_from_slice(&digit.to_le_bytes());
    }
    std::fs::write(&keys, key_file).unwrap();

    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("info")
        .arg("-d")
        .arg(&license)
        .arg("-r")
        .arg(&keys)
        .arg("-s")
        .assert();
    assert.success().stdout(formatdoc! {"
        license: {path}
        nt path: \\??\\{path}
        fingerprint: 574c5245474b4559
        size: 400
        rsa blocks: 4
        rsa key 1: 2 modulus digits, 1 exponent digits
        rsa key 2: 1 modulus digits, 1 exponent digits
        launch mode: false
        skip hwid: true
        ",
        path = license.display(),
    });
}

#[test]
fn test_cli_info_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let license = dir.path().join("regkey.dat");
    std::fs::write(&license, [0u8; 0x80]).unwrap();

    let assert = Command::cargo_bin("wlextract")
        .unwrap()
        .arg("info")
        .arg("-d")
        .arg(&license)
        .arg("-r")
        .arg(dir.path().join("missing.rsa"))
        .assert();
    assert.failure().stderr(indoc! {"
        Error: Unable to load RSA file: cannot open
    "});
}
