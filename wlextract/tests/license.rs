mod mock;

use mock::MockProcess;
use std::io::Write;
use wlextract::{
    Error, KeyStore, LicenseContext, MainHash, PublicKey, RecoveredSecret, MAIN_HASH_LEN,
};

fn keys() -> KeyStore {
    KeyStore {
        first: PublicKey {
            modulus: vec![0x8000_0001, 0x7fff_ffff, 0x0000_0003],
            exponent: vec![0x0001_0001],
        },
        second: PublicKey {
            modulus: vec![0x0123_4567, 0x89ab_cdef],
            exponent: vec![0x0000_0011, 0x0000_0001],
        },
    }
}

#[test]
fn test_key_file_layout() {
    let mut bytes: Vec<u8> = vec![];
    keys().write(&mut bytes).unwrap();

    assert_eq!(bytes[..4], [3, 1, 2, 2]);
    assert_eq!(bytes.len(), 4 + (3 + 1 + 2 + 2) * 4);
    // first modulus digit, little endian
    assert_eq!(bytes[4..8], [0x01, 0x00, 0x00, 0x80]);

    let read = KeyStore::read(&mut bytes.as_slice()).unwrap();
    assert_eq!(read, keys());
}

#[test]
fn test_key_file_rejects_truncation() {
    let mut bytes: Vec<u8> = vec![];
    keys().write(&mut bytes).unwrap();

    for len in [0, 3, 4, bytes.len() - 1] {
        assert!(
            matches!(KeyStore::read(&mut &bytes[..len]), Err(Error::KeyFile(_))),
            "accepted {len} bytes"
        );
    }
}

#[test]
fn test_key_file_rejects_empty_key() {
    let mut store = keys();
    store.second.exponent.clear();
    assert!(matches!(
        store.write(&mut Vec::<u8>::new()),
        Err(Error::KeyFile(_))
    ));
}

#[test]
fn test_mp_int_digit_count_bounded() {
    let mut p = MockProcess::new();
    p.poke_u32(0x1000, 2);
    p.poke_u32(0x100c, 0x2000);
    p.poke_u32(0x2000, 0x0001_0001);
    p.poke_u32(0x2004, 0x0000_0003);
    assert_eq!(
        PublicKey::read_mp_int(&p, 0x1000).unwrap(),
        [0x0001_0001, 0x0000_0003]
    );

    // a garbage record is rejected before its digits are read
    p.poke_u32(0x1000, 0x401);
    assert!(matches!(
        PublicKey::read_mp_int(&p, 0x1000),
        Err(Error::DigitCount {
            address: 0x1000,
            used: 0x401
        })
    ));
}

#[test]
fn test_load_license() {
    let dir = tempfile::tempdir().unwrap();
    let license_path = dir.path().join("regkey.dat");
    let key_path = dir.path().join("regkey.rsa");

    let mut license = std::fs::File::create(&license_path).unwrap();
    license.write_all(b"\x01\x02\x03\x04\x05\x06\x07\x08").unwrap();
    license.write_all(&[0xaa; 0x178]).unwrap();
    drop(license);
    let mut key_file = std::fs::File::create(&key_path).unwrap();
    keys().write(&mut key_file).unwrap();
    drop(key_file);

    let context = LicenseContext::load(&license_path, &key_path)
        .unwrap()
        .skip_hwid(true);
    assert_eq!(context.fingerprint(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(context.size(), 0x180);
    assert_eq!(context.decrypt_calls(), 3);
    assert_eq!(context.keys(), &keys());
    assert!(context.path().is_absolute());
    assert!(context.nt_path().starts_with(r"\??\"));
    assert!(context.nt_path().ends_with("regkey.dat"));
    assert!(context.is_skip_hwid());
    assert!(context.exits_early());

    let context = context.launch_mode(true);
    assert!(context.is_launch_mode());
    assert!(context.is_skip_hwid());
    assert!(!context.exits_early());
}

#[test]
fn test_load_license_errors() {
    let dir = tempfile::tempdir().unwrap();
    let license_path = dir.path().join("regkey.dat");
    let key_path = dir.path().join("regkey.rsa");

    assert!(matches!(
        LicenseContext::load(&license_path, &key_path),
        Err(Error::License(_))
    ));

    // shorter than its fingerprint
    std::fs::write(&license_path, b"\x01\x02\x03").unwrap();
    assert!(matches!(
        LicenseContext::load(&license_path, &key_path),
        Err(Error::License(_))
    ));

    std::fs::write(&license_path, [0u8; 0x100]).unwrap();
    assert!(matches!(
        LicenseContext::load(&license_path, &key_path),
        Err(Error::KeyFile(_))
    ));

    std::fs::write(&key_path, [1u8, 1, 0, 1]).unwrap();
    assert!(matches!(
        LicenseContext::load(&license_path, &key_path),
        Err(Error::KeyFile(_))
    ));
}

#[test]
fn test_partial_block_decrypted() {
    let context = LicenseContext::new("regkey.dat".into(), [0; 8], 0x17f, keys());
    assert_eq!(context.decrypt_calls(), 3);
    let context = LicenseContext::new("regkey.dat".into(), [0; 8], 0x181, keys());
    assert_eq!(context.decrypt_calls(), 4);
}

fn secret() -> RecoveredSecret {
    let mut secret = RecoveredSecret::default();
    secret.set_hash_3(0x9494);
    secret.set_tea_key([0x6a6b_6c6d, 0x7172_7374, 0x6566_6768, 0x7a7b_7c7d]);
    secret.set_password(*b"0123456789abcdefghijABCDEFGHIJkl");
    secret
}

#[test]
fn test_synthesize_and_parse() {
    let main_hash = MainHash::synthesize(&secret()).unwrap();
    let text = main_hash.to_string();
    assert_eq!(text.len(), MAIN_HASH_LEN);

    // a trailing terminator as shown by the target is tolerated
    let parsed: MainHash = format!("{text}\0").parse().unwrap();
    assert_eq!(parsed, main_hash);

    let derived = parsed.derive();
    let expected = secret();
    assert_eq!(derived.hash_3, expected.hash_3);
    assert_eq!(derived.tea_key, expected.tea_key);
    assert_eq!(derived.password, expected.password);
    // filler terms: "aaaa" + "aaaa"
    assert_eq!(derived.hash_1, 0xc2c2_c2c2);
    assert_eq!(derived.hwid_key, u32::from_le_bytes(*b"aaaa"));
}

#[test]
fn test_synthesize_uses_twin() {
    // key0's 0x1a high byte cannot be split, so the (key0, key1) half is
    // written as its twin
    let mut secret = secret();
    secret.tea_key = Some([0x1aa1_b2c3, 0xe162_6364, 0x61e2_e3e4, 0xf071_7273]);
    let main_hash = MainHash::synthesize(&secret).unwrap();
    assert_eq!(
        main_hash.derive().tea_key,
        Some([0x9aa1_b2c3, 0x6162_6364, 0x61e2_e3e4, 0xf071_7273])
    );
}

#[test]
fn test_synthesize_incomplete() {
    let mut secret = secret();
    secret.password = None;
    assert!(matches!(
        MainHash::synthesize(&secret),
        Err(Error::Incomplete("password"))
    ));

    let mut secret = self::secret();
    secret.hash_3 = Some(0x0101);
    assert!(matches!(
        MainHash::synthesize(&secret),
        Err(Error::SumByte(0x01))
    ));
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        "abc".parse::<MainHash>(),
        Err(Error::MainHashLength { got: 3, .. })
    ));
    let text = MainHash::synthesize(&secret()).unwrap().to_string();
    let mut broken = text.into_bytes();
    broken[70] = b' ';
    let broken = String::from_utf8(broken).unwrap();
    assert!(matches!(broken.parse::<MainHash>(), Err(Error::Password)));
}
