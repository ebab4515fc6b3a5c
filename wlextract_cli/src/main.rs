use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
struct ActionInfo {
    /// License file path
    #[arg(short = 'd', long, default_value = "regkey.dat")]
    license: String,

    /// RSA public key file path
    #[arg(short = 'r', long, default_value = "regkey.rsa")]
    keys: String,

    /// Only bypass the RSA check and let the target run
    #[arg(short, long, default_value = "false")]
    launch: bool,

    /// Skip searching the target's messages for a hardware id
    #[arg(short, long, default_value = "false")]
    skip_hwid: bool,
}

#[derive(Parser, Debug)]
struct ActionForge {
    /// Recovered hash_3 (hex)
    #[arg(long, value_parser = parse_hex16)]
    hash3: u16,

    /// Recovered TEA key words (hex), key0 first
    #[arg(short, long, num_args = 4, required = true, value_parser = parse_hex32)]
    tea_key: Vec<u32>,

    /// Recovered 32 character password
    #[arg(short, long)]
    password: String,
}

#[derive(Parser, Debug)]
struct ActionParse {
    /// Main hash string
    #[arg(index = 1)]
    main_hash: String,
}

#[derive(Parser, Debug)]
struct ActionHwid {
    /// Message text to scan
    #[arg(index = 1)]
    text: String,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print license and key file details
    Info(ActionInfo),
    /// Build a main hash from recovered values
    Forge(ActionForge),
    /// Print the values a main hash derives to
    Parse(ActionParse),
    /// Find a hardware id in message text
    Hwid(ActionHwid),
}

#[derive(Parser, Debug)]
#[command(author, version)]
struct Args {
    #[command(subcommand)]
    action: Action,
}

fn main() -> Result<(), wlextract::Error> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    match args.action {
        Action::Info(args) => info(args),
        Action::Forge(args) => forge(args),
        Action::Parse(args) => parse(args),
        Action::Hwid(args) => hwid(args),
    }
}

fn parse_hex(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn parse_hex16(s: &str) -> Result<u16, String> {
    u16::from_str_radix(parse_hex(s), 16).map_err(|e| e.to_string())
}

fn parse_hex32(s: &str) -> Result<u32, String> {
    u32::from_str_radix(parse_hex(s), 16).map_err(|e| e.to_string())
}

fn info(args: ActionInfo) -> Result<(), wlextract::Error> {
    let license = wlextract::LicenseContext::load(&args.license, &args.keys)?
        .launch_mode(args.launch)
        .skip_hwid(args.skip_hwid);
    println!("license: {}", license.path().display());
    println!("nt path: {}", license.nt_path());
    println!("fingerprint: {}", hex::encode(license.fingerprint()));
    println!("size: {}", license.size());
    println!("rsa blocks: {}", license.decrypt_calls());
    for (i, key) in [&license.keys().first, &license.keys().second]
        .into_iter()
        .enumerate()
    {
        println!(
            "rsa key {}: {} modulus digits, {} exponent digits",
            i + 1,
            key.modulus.len(),
            key.exponent.len()
        );
    }
    println!("launch mode: {}", license.is_launch_mode());
    println!("skip hwid: {}", license.is_skip_hwid());
    Ok(())
}

fn forge(args: ActionForge) -> Result<(), wlextract::Error> {
    let password: [u8; wlextract::PASSWORD_LEN] = args
        .password
        .as_bytes()
        .try_into()
        .ok()
        .filter(|p: &[u8; wlextract::PASSWORD_LEN]| wlextract::is_alphanumeric(p))
        .ok_or(wlextract::Error::Password)?;
    let tea_key: [u32; 4] = args
        .tea_key
        .try_into()
        .map_err(|words: Vec<u32>| wlextract::Error::TeaKeyLength(words.len()))?;

    let mut secret = wlextract::RecoveredSecret::default();
    secret.set_hash_3(args.hash3);
    secret.set_tea_key(tea_key);
    secret.set_password(password);
    let main_hash = wlextract::MainHash::synthesize(&secret)?;
    log::debug!("{main_hash:?}");
    println!("{main_hash}");
    Ok(())
}

fn parse(args: ActionParse) -> Result<(), wlextract::Error> {
    let main_hash: wlextract::MainHash = args.main_hash.parse()?;
    let secret = main_hash.derive();
    println!("hash_1: {:08x}", secret.hash_1);
    println!("hash_2: {:08x}", secret.hash_2);
    if let Some(hash_3) = secret.hash_3 {
        println!("hash_3: {hash_3:04x}");
    }
    if let Some(key) = secret.tea_key {
        println!(
            "tea key: {:08x} {:08x} {:08x} {:08x}",
            key[0], key[1], key[2], key[3]
        );
    }
    if let Some(password) = secret.password_str() {
        println!("password: {password}");
    }
    println!("hwid key: {:08x}", secret.hwid_key);
    Ok(())
}

fn hwid(args: ActionHwid) -> Result<(), wlextract::Error> {
    if wlextract::mentions_debugger(&args.text) {
        log::warn!("message mentions a debugger");
    }
    let hwid = wlextract::find_hwid(&args.text).ok_or(wlextract::Error::NoHwid)?;
    println!("{hwid}");
    Ok(())
}
