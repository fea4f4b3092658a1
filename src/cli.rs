use std::path::PathBuf;

use clap::Parser;

use crate::auth::Identity;

#[derive(Parser)]
#[command(name = "arys")]
#[command(version)]
#[command(about = "Terminal chat client for the Arys backend — streamed text, images and speech")]
pub struct Args {
    /// Backend base URL (overrides the config file and ARYS_SERVER)
    #[arg(long)]
    pub server: Option<String>,

    /// Login contact; falls back to ARYS_CONTACT
    #[arg(long, short)]
    pub contact: Option<String>,

    /// Login password; falls back to ARYS_PASSWORD
    #[arg(long, short)]
    pub password: Option<String>,

    /// Register a new account under this display name before logging in
    #[arg(long)]
    pub register: Option<String>,

    /// Config file path (defaults to <config dir>/arys/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// History turns to show on startup
    #[arg(long, default_value = "20")]
    pub history: u32,

    /// Skip loading history on startup
    #[arg(long)]
    pub no_history: bool,
}

/// Merge command-line credentials with environment fallbacks. Both parts
/// must resolve for an identity to exist.
pub fn resolve_identity(
    arg_contact: Option<String>,
    arg_password: Option<String>,
    env_contact: Option<String>,
    env_password: Option<String>,
) -> Option<Identity> {
    let contact = arg_contact.or(env_contact)?;
    let password = arg_password.or(env_password)?;
    Some(Identity::new(contact, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_identity_args_win_over_env() {
        let identity = resolve_identity(
            Some("arg@host".into()),
            Some("arg-pw".into()),
            Some("env@host".into()),
            Some("env-pw".into()),
        )
        .expect("identity");
        assert_eq!(identity.contact, "arg@host");
        assert_eq!(identity.password, "arg-pw");
    }

    #[test]
    fn test_resolve_identity_env_fallback() {
        let identity = resolve_identity(
            None,
            None,
            Some("env@host".into()),
            Some("env-pw".into()),
        )
        .expect("identity");
        assert_eq!(identity.contact, "env@host");
    }

    #[test]
    fn test_resolve_identity_mixed_sources() {
        let identity =
            resolve_identity(Some("arg@host".into()), None, None, Some("env-pw".into()))
                .expect("identity");
        assert_eq!(identity.contact, "arg@host");
        assert_eq!(identity.password, "env-pw");
    }

    #[test]
    fn test_resolve_identity_requires_both_parts() {
        assert!(resolve_identity(Some("u".into()), None, None, None).is_none());
        assert!(resolve_identity(None, Some("p".into()), None, None).is_none());
        assert!(resolve_identity(None, None, None, None).is_none());
    }

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::parse_from(["arys"]);
        assert!(args.server.is_none());
        assert_eq!(args.history, 20);
        assert!(!args.no_history);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "arys",
            "--server",
            "http://localhost:3940",
            "--contact",
            "u@h",
            "--password",
            "pw",
            "--register",
            "Ada",
            "--no-history",
        ]);
        assert_eq!(args.server.as_deref(), Some("http://localhost:3940"));
        assert_eq!(args.register.as_deref(), Some("Ada"));
        assert!(args.no_history);
    }
}
