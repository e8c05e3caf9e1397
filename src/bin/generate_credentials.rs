//! Prints a credentials file entry for a new user:
//!
//! ```text
//! generate_credentials <username> <password> >> credentials.toml
//! ```

use stem_trivia_bot::auth::generate_credentials;

fn main() {
    let mut args = std::env::args().skip(1);
    let (username, password) = match (args.next(), args.next()) {
        (Some(username), Some(password)) => (username, password),
        _ => {
            eprintln!("Usage: generate_credentials <username> <password>");
            std::process::exit(2);
        }
    };

    let credentials = generate_credentials(&password, &mut rand::thread_rng());
    println!(
        "[auth.credentials.{}]\npassword_hash = \"{}\"\nsalt = \"{}\"",
        username, credentials.password_hash, credentials.salt
    );
}
