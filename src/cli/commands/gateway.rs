use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_ADMIN_EMAIL: &str = "admin-email";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_REQUEST_PATH: &str = "request-path";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_PENDING_SESSION_TTL_SECONDS: &str = "pending-session-ttl-seconds";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_REDIRECT_TTL_SECONDS: &str = "redirect-ttl-seconds";
pub const ARG_TOKEN_SWEEP_SECONDS: &str = "token-sweep-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub base_url: String,
    pub session_secret: SecretString,
    pub admin_email: Option<String>,
    pub admin_password: Option<SecretString>,
    pub login_path: String,
    pub request_path: String,
    pub session_ttl_seconds: u64,
    pub pending_session_ttl_seconds: u64,
    pub token_ttl_seconds: u64,
    pub redirect_ttl_seconds: u64,
    pub token_sweep_seconds: u64,
}

impl Options {
    /// Parse gateway arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let read_optional = |id: &str| -> Option<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };
        let read_seconds =
            |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);

        Ok(Self {
            base_url: read_required(ARG_BASE_URL)?,
            session_secret: SecretString::from(read_required(ARG_SESSION_SECRET)?),
            admin_email: read_optional(ARG_ADMIN_EMAIL),
            admin_password: read_optional(ARG_ADMIN_PASSWORD).map(SecretString::from),
            login_path: read_optional(ARG_LOGIN_PATH).unwrap_or_else(|| "/login".to_string()),
            request_path: read_optional(ARG_REQUEST_PATH)
                .unwrap_or_else(|| "/request".to_string()),
            session_ttl_seconds: read_seconds(ARG_SESSION_TTL_SECONDS, 604_800),
            pending_session_ttl_seconds: read_seconds(ARG_PENDING_SESSION_TTL_SECONDS, 3600),
            token_ttl_seconds: read_seconds(ARG_TOKEN_TTL_SECONDS, 900),
            redirect_ttl_seconds: read_seconds(ARG_REDIRECT_TTL_SECONDS, 900),
            token_sweep_seconds: read_seconds(ARG_TOKEN_SWEEP_SECONDS, 60),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_identity_args(command);
    with_lifetime_args(command)
}

fn with_identity_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public URL of the gateway, e.g. https://auth.example.com")
                .long_help(
                    "Public URL of the gateway. Its registrable domain scopes the gateway session cookie, and the login and access-request pages are resolved against it.",
                )
                .env("WAYPASS_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session and redirect cookies")
                .env("WAYPASS_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_EMAIL)
                .long(ARG_ADMIN_EMAIL)
                .help("Create this admin account at startup if it does not exist")
                .env("WAYPASS_ADMIN_EMAIL")
                .requires(ARG_ADMIN_PASSWORD),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password for the bootstrap admin account")
                .env("WAYPASS_ADMIN_PASSWORD")
                .hide_env_values(true)
                .requires(ARG_ADMIN_EMAIL),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Path of the login page, relative to the base URL")
                .env("WAYPASS_LOGIN_PATH")
                .default_value("/login"),
        )
        .arg(
            Arg::new(ARG_REQUEST_PATH)
                .long(ARG_REQUEST_PATH)
                .help("Path of the access-request page, relative to the base URL")
                .env("WAYPASS_REQUEST_PATH")
                .default_value("/request"),
        )
}

fn with_lifetime_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Authenticated session cookie TTL in seconds")
                .env("WAYPASS_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PENDING_SESSION_TTL_SECONDS)
                .long(ARG_PENDING_SESSION_TTL_SECONDS)
                .help("Pending session cookie TTL in seconds")
                .env("WAYPASS_PENDING_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Lifetime of a login handoff token in seconds")
                .env("WAYPASS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REDIRECT_TTL_SECONDS)
                .long(ARG_REDIRECT_TTL_SECONDS)
                .help("Lifetime of the remembered redirect target in seconds")
                .env("WAYPASS_REDIRECT_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_SWEEP_SECONDS)
                .long(ARG_TOKEN_SWEEP_SECONDS)
                .help("Interval between sweeps of expired handoff tokens")
                .env("WAYPASS_TOKEN_SWEEP_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const ENV: [(&str, Option<&str>); 4] = [
        ("WAYPASS_BASE_URL", None),
        ("WAYPASS_SESSION_SECRET", None),
        ("WAYPASS_ADMIN_EMAIL", None),
        ("WAYPASS_ADMIN_PASSWORD", None),
    ];

    #[test]
    fn parses_defaults() -> anyhow::Result<()> {
        temp_env::with_vars(ENV, || {
            let matches = with_args(Command::new("waypass")).get_matches_from(vec![
                "waypass",
                "--base-url",
                "https://auth.example.com",
                "--session-secret",
                "s3cret",
            ]);
            let options = Options::parse(&matches)?;
            assert_eq!(options.base_url, "https://auth.example.com");
            assert_eq!(options.session_secret.expose_secret(), "s3cret");
            assert!(options.admin_email.is_none());
            assert!(options.admin_password.is_none());
            assert_eq!(options.login_path, "/login");
            assert_eq!(options.request_path, "/request");
            assert_eq!(options.session_ttl_seconds, 604_800);
            assert_eq!(options.pending_session_ttl_seconds, 3600);
            assert_eq!(options.token_ttl_seconds, 900);
            assert_eq!(options.redirect_ttl_seconds, 900);
            assert_eq!(options.token_sweep_seconds, 60);
            Ok(())
        })
    }

    #[test]
    fn reads_environment() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("WAYPASS_BASE_URL", Some("https://auth.example.org")),
                ("WAYPASS_SESSION_SECRET", Some("from-env")),
                ("WAYPASS_ADMIN_EMAIL", Some("root@example.org")),
                ("WAYPASS_ADMIN_PASSWORD", Some("hunter2")),
                ("WAYPASS_TOKEN_TTL_SECONDS", Some("30")),
            ],
            || {
                let matches = with_args(Command::new("waypass")).get_matches_from(vec!["waypass"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.base_url, "https://auth.example.org");
                assert_eq!(options.admin_email.as_deref(), Some("root@example.org"));
                assert_eq!(
                    options
                        .admin_password
                        .as_ref()
                        .map(|p| p.expose_secret().to_string()),
                    Some("hunter2".to_string())
                );
                assert_eq!(options.token_ttl_seconds, 30);
                Ok(())
            },
        )
    }

    #[test]
    fn admin_email_requires_password() {
        temp_env::with_vars(ENV, || {
            let result = with_args(Command::new("waypass")).try_get_matches_from(vec![
                "waypass",
                "--base-url",
                "https://auth.example.com",
                "--session-secret",
                "s3cret",
                "--admin-email",
                "root@example.com",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn blank_secret_is_rejected() {
        temp_env::with_vars(ENV, || {
            let matches = with_args(Command::new("waypass")).get_matches_from(vec![
                "waypass",
                "--base-url",
                "https://auth.example.com",
                "--session-secret",
                "  ",
            ]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(
                    err.to_string()
                        .contains("missing required argument: --session-secret")
                );
            }
        });
    }
}
