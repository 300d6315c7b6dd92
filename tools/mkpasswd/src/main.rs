use anyhow::{Context, Result};
use clap::Parser;
use rustsvc_core::password::{hash_password, verify_password};

/// rustsvc password hashing utility using Argon2
///
/// Generates the Argon2id hashes stored as account credentials, e.g. when
/// seeding accounts into a database snapshot by hand.
#[derive(Parser, Debug)]
#[command(
    name = "mkpasswd",
    version,
    about = "Generate Argon2 password hashes for rustsvc accounts",
    long_about = "This utility generates secure password hashes using the Argon2id \
                  algorithm, in the same format the services use for account \
                  passwords.\n\n\
                  By default, the tool prompts for a password securely (without echoing). \
                  Alternatively, you can provide a password via command-line argument \
                  (not recommended for security reasons) or pipe it via stdin."
)]
struct Cli {
    /// Password to hash (not recommended - use interactive prompt instead)
    #[arg(short, long, conflicts_with = "stdin")]
    password: Option<String>,

    /// Read password from stdin (useful for scripting)
    #[arg(short, long)]
    stdin: bool,

    /// Check the password against an existing hash instead of creating one
    #[arg(long, value_name = "HASH")]
    check: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let password = if let Some(pwd) = cli.password {
        eprintln!("Warning: Providing passwords via command-line arguments is insecure.");
        eprintln!("Consider using the interactive prompt or stdin instead.\n");
        pwd
    } else if cli.stdin {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read password from stdin")?;
        buffer.trim().to_string()
    } else {
        eprintln!("Enter password: ");
        rpassword::read_password().context("Failed to read password")?
    };

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    if let Some(hash) = cli.check {
        if verify_password(&password, &hash) {
            println!("Password matches.");
            return Ok(());
        }
        anyhow::bail!("Password does not match the given hash");
    }

    if password.len() < 8 {
        eprintln!("Warning: Password is less than 8 characters. Consider using a stronger password.\n");
    }

    let password_hash = hash_password(&password).context("Failed to hash password")?;

    println!("\n=== Argon2 Password Hash ===");
    println!("{}", password_hash);
    println!("\n=== Usage ===");
    println!("Store the hash as an account's password_hash in the database snapshot:");
    println!("Example: \"password_hash\": \"{}\"", password_hash);
    println!("\nThe hash format is: $argon2id$v=19$m=...$...$...");
    println!("This includes the algorithm, parameters, salt, and hash all in one string.\n");

    Ok(())
}
