use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use console::style;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::io::{BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use secret_splitter::config::{Config, MAX_SHARES};
use secret_splitter::crypto::{self, EncryptedFile, SecretString, ENCRYPTED_EXTENSION};
use secret_splitter::shamir::{
    self, Diffuser, FieldModulus, Share, ShareKind, MAX_DEGREE, MIN_DIFFUSION_BYTES,
};

/// Size of the random master key protecting a file, unless `-s` says otherwise
const FILE_KEY_BITS: u32 = 256;

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Shares needed to recover the secret
    #[arg(short = 't', long)]
    pub threshold: Option<usize>,

    /// Number of shares to create
    #[arg(short = 'n', long)]
    pub shares: Option<usize>,

    /// Prefix every share with this token
    #[arg(short = 'w', long)]
    pub token: Option<String>,

    /// Security level in bits (8..=1024, a multiple of 8)
    #[arg(short = 's', long = "security-level")]
    pub security_level: Option<u32>,

    /// Read the secret as hex digits
    #[arg(short = 'x', long)]
    pub hex: bool,

    /// Only print the shares
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Like -q, and also suppress warnings
    #[arg(short = 'Q', long = "extra-quiet")]
    pub extra_quiet: bool,

    /// Disable the diffusion layer
    #[arg(short = 'D', long = "no-diffusion")]
    pub no_diffusion: bool,

    /// Print shares without kind and checksum, as ssss-split does
    #[arg(long)]
    pub plain: bool,

    /// Encrypt this file with a random key and split the key
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CombineArgs {
    /// Number of shares to read
    #[arg(short = 't', long)]
    pub threshold: Option<usize>,

    /// Print the secret as hex digits
    #[arg(short = 'x', long)]
    pub hex: bool,

    /// Only print the secret
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Like -q, and also suppress warnings
    #[arg(short = 'Q', long = "extra-quiet")]
    pub extra_quiet: bool,

    /// Disable the diffusion layer
    #[arg(short = 'D', long = "no-diffusion")]
    pub no_diffusion: bool,

    /// Decrypt this encrypted file with the recovered key
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Where to write the decrypted file
    #[arg(long, value_name = "PATH", requires = "file")]
    pub output: Option<PathBuf>,
}

/// Informational text and warnings, both on stderr
struct Reporter {
    quiet: bool,
    extra_quiet: bool,
}

impl Reporter {
    fn new(quiet: bool, extra_quiet: bool) -> Self {
        Self {
            quiet: quiet || extra_quiet,
            extra_quiet,
        }
    }

    fn info(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }

    fn warning(&self, message: &str) {
        if !self.extra_quiet {
            eprintln!("{} {}", style("WARNING:").yellow().bold(), message);
        }
    }

    fn spinner(&self, message: &'static str) -> Result<ProgressBar> {
        if self.quiet {
            return Ok(ProgressBar::hidden());
        }

        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_message(message);
        Ok(pb)
    }
}

/// Execute the init command
pub fn init(config_path: &Path) -> Result<()> {
    Config::initialize(config_path)?;
    Ok(())
}

/// Pick the diffusion layer for a field, warning when it has to be skipped
fn choose_diffuser(enabled: bool, modulus: FieldModulus, reporter: &Reporter) -> Diffuser {
    if !enabled {
        return Diffuser::None;
    }
    if modulus.size_in_bytes() < MIN_DIFFUSION_BYTES {
        reporter.warning("security level too small for the diffusion layer");
        return Diffuser::None;
    }
    Diffuser::Xtea
}

/// Read one line, hidden when typed on a terminal
fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    if std::io::stdin().is_terminal() {
        let secret = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .context("I/O error while reading secret")?;
        return Ok(Zeroizing::new(secret));
    }

    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("I/O error while reading secret")?;
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

/// Secret bytes and the field they are split in
fn secret_bytes(
    secret: &str,
    hex: bool,
    security_level: Option<u32>,
    reporter: &Reporter,
) -> Result<(Zeroizing<Vec<u8>>, FieldModulus)> {
    let modulus = match security_level {
        Some(level) => FieldModulus::new(level)?,
        None => {
            let level = if hex {
                4 * ((secret.len() + 1) & !1)
            } else {
                8 * secret.len()
            };
            let level = u32::try_from(level).unwrap_or(u32::MAX);
            let modulus = FieldModulus::new(level)
                .map_err(|_| anyhow!("security level invalid (secret too long?)"))?;
            reporter.info(format!("Using a {} bit security level.", level));
            modulus
        }
    };

    let degree = modulus.degree() as usize;
    let bytes = if hex {
        if secret.len() > degree / 4 {
            bail!("input string too long");
        }
        if secret.len() < degree / 4 {
            reporter.warning("input string too short, adding null padding on the left");
        }
        shamir::parse_hex_secret(secret).context("invalid syntax")?
    } else {
        if secret.len() > degree / 8 {
            bail!("input string too long");
        }
        if secret.bytes().any(|c| !(32..127).contains(&c)) {
            reporter.warning("binary data detected, use -x mode instead");
        }
        secret.as_bytes().to_vec()
    };

    if bytes.is_empty() {
        bail!("secret cannot be empty");
    }

    Ok((Zeroizing::new(bytes), modulus))
}

/// Execute the split command
pub fn split(config: &Config, args: SplitArgs) -> Result<()> {
    let reporter = Reporter::new(args.quiet, args.extra_quiet);
    let threshold = args.threshold.unwrap_or(config.default_threshold);
    let shares = args.shares.unwrap_or(config.default_shares);
    let security_level = args.security_level.or(config.security_level);
    let hex = args.hex || config.hex_mode;

    if threshold < 2 {
        bail!("invalid parameters: invalid threshold value");
    }
    if shares < threshold {
        bail!("invalid parameters: number of shares smaller than threshold");
    }
    if shares > MAX_SHARES {
        bail!("invalid parameters: at most {} shares are supported", MAX_SHARES);
    }
    if let Some(level) = security_level {
        if !FieldModulus::is_valid_degree(level) {
            bail!("invalid parameters: invalid security level");
        }
    }
    if let Some(token) = &args.token {
        if token.len() > MAX_DEGREE as usize / 8 {
            bail!("invalid parameters: token too long");
        }
        if token.contains(char::is_whitespace) {
            bail!("invalid parameters: token cannot contain whitespace");
        }
    }

    let (kind, secret, modulus) = match &args.file {
        Some(_) => {
            let modulus = FieldModulus::new(security_level.unwrap_or(FILE_KEY_BITS))?;
            let key = crypto::generate_master_key(modulus.degree() as usize);
            (ShareKind::File, key, modulus)
        }
        None => {
            reporter.info(format!(
                "Generating shares using a ({},{}) scheme with {} security level.",
                threshold,
                shares,
                match security_level {
                    Some(level) => format!("a {} bit", level),
                    None => "dynamic".to_string(),
                }
            ));

            let max_level = security_level.unwrap_or(MAX_DEGREE);
            let prompt = if hex {
                format!("Enter the secret, at most {} hex digits", max_level / 4)
            } else {
                format!("Enter the secret, at most {} ASCII characters", max_level / 8)
            };

            let input = read_secret(&prompt)?;
            let (bytes, modulus) = secret_bytes(&input, hex, security_level, &reporter)?;
            (ShareKind::Message, bytes, modulus)
        }
    };

    let diffuser = choose_diffuser(!args.no_diffusion && config.diffusion, modulus, &reporter);
    let split = shamir::split_with(
        kind,
        &secret,
        threshold,
        diffuser,
        modulus,
        &mut ChaCha20Rng::from_entropy(),
    )?;
    debug!(threshold, shares, degree = modulus.degree(), "splitting secret");

    if let Some(path) = &args.file {
        let pb = reporter.spinner("Encrypting file...")?;

        let mut passphrase = hex::encode(&*secret);
        let envelope = crypto::encrypt_file(path, &SecretString::new(passphrase.clone()))?;
        passphrase.zeroize();

        let mut target = path.as_os_str().to_owned();
        target.push(".");
        target.push(ENCRYPTED_EXTENSION);
        let target = PathBuf::from(target);
        envelope.write_to(&target)?;

        pb.finish_and_clear();
        reporter.info(format!("Encrypted file written to {}", style(target.display()).bold()));
    }

    let width = shares.to_string().len();
    let prefix = args.token.map(|token| format!("{}-", token)).unwrap_or_default();
    for share in split.shares(shares)? {
        if args.plain {
            println!("{}{}", prefix, share.to_plain_string(width));
        } else {
            println!("{}{}", prefix, share);
        }
    }

    Ok(())
}

/// Read `count` share lines, prompting for each on a terminal
fn read_shares(count: usize, reporter: &Reporter) -> Result<Vec<String>> {
    reporter.info(format!("Enter {} shares separated by newlines:", count));

    if std::io::stdin().is_terminal() {
        return (1..=count)
            .map(|i| {
                Input::<String>::new()
                    .with_prompt(format!("Share [{}/{}]", i, count))
                    .interact_text()
                    .context("I/O error while reading shares")
            })
            .collect();
    }

    let lines = std::io::stdin()
        .lock()
        .lines()
        .take(count)
        .collect::<std::io::Result<Vec<_>>>()
        .context("I/O error while reading shares")?;
    if lines.len() < count {
        bail!("I/O error while reading shares");
    }
    Ok(lines)
}

/// Execute the combine command
pub fn combine(config: &Config, args: CombineArgs) -> Result<()> {
    let reporter = Reporter::new(args.quiet, args.extra_quiet);
    let threshold = args.threshold.unwrap_or(config.default_threshold);
    let hex = args.hex || config.hex_mode;

    if threshold < 2 {
        bail!("invalid parameters: invalid threshold value");
    }

    let lines = read_shares(threshold, &reporter)?;

    let mut modulus = None;
    for line in &lines {
        let share = Share::parse(line).map_err(|_| anyhow!("invalid syntax"))?;
        match modulus {
            None => modulus = Some(share.modulus()),
            Some(m) if m != share.modulus() => bail!("shares have different security levels"),
            Some(_) => {}
        }
    }
    let modulus = modulus.ok_or_else(|| anyhow!("no shares given"))?;

    let diffuser = choose_diffuser(!args.no_diffusion && config.diffusion, modulus, &reporter);
    let recovered = shamir::combine(&lines, diffuser)?;

    if let Some(path) = &args.file {
        let passphrase = crypto::file_passphrase(&recovered)?;
        let envelope = EncryptedFile::read_from(path)?;

        let pb = reporter.spinner("Decrypting file...")?;
        let mut contents = crypto::decrypt_file(&envelope, &passphrase)?;
        pb.finish_and_clear();

        let target = match &args.output {
            Some(output) => output.clone(),
            None => {
                let name = Path::new(&envelope.file_name)
                    .file_name()
                    .context("Encrypted file has no usable file name")?;
                path.with_file_name(name)
            }
        };
        envelope.restore_to(&target, &contents)?;
        contents.zeroize();

        reporter.info(format!("Decrypted file written to {}", style(target.display()).bold()));
        return Ok(());
    }

    if recovered.kind() == ShareKind::File {
        reporter.warning("these shares protect a file, pass --file to decrypt it");
    }

    let secret = Zeroizing::new(if hex { recovered.hex() } else { recovered.text() });
    if reporter.quiet {
        eprintln!("{}", *secret);
    } else {
        eprintln!("Resulting secret: {}", *secret);
    }

    Ok(())
}
