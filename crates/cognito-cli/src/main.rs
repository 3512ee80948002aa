mod logging;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use cognito_api::CookieSource;
use cognito_auth::{
    AccessClaims, IdentityClaims, Rejection, SessionResolver, TokenVerifier, locate,
};
use cognito_connectors::EnvCookieSource;
use cognito_core::{
    AuthSettings, SETTINGS_FILE, apply_env_overrides, build_resolver, default_config_dir,
    load_key_store, load_settings_from_dir, validate_settings, write_default_config_files,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "cognito", about = "Inspect Cognito cookie sessions")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write auth.toml and keys.json into the config directory
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Show the Cognito cookies found in a Cookie header
    Locate {
        #[arg(long)]
        cookie: String,
    },
    /// Verify a single token
    Verify {
        #[arg(long, value_enum)]
        kind: TokenKind,
        #[arg(long)]
        token: String,
    },
    /// Resolve a session from a Cookie header (or COGNITO_COOKIE)
    Resolve {
        #[arg(long)]
        cookie: Option<String>,
    },
    /// List trusted signing keys
    Keys,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TokenKind {
    Id,
    Access,
}

#[derive(Debug, Serialize)]
struct KeyEntry<'a> {
    region: &'a str,
    user_pool_id: &'a str,
    kid: &'a str,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init()?;
    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);

    match cli.command {
        Commands::Init { force } => {
            if force && cfg_dir.exists() {
                for name in [SETTINGS_FILE, "keys.json"] {
                    let p = cfg_dir.join(name);
                    if p.exists() {
                        fs::remove_file(&p)?;
                    }
                }
            }
            write_default_config_files(&cfg_dir)?;
            pout(
                cli.json,
                serde_json::json!({"message":"init complete","config_dir":cfg_dir}),
                &format!("Init complete, edit {}", cfg_dir.join(SETTINGS_FILE).display()),
            )?;
        }
        Commands::Locate { cookie } => {
            let settings = load_settings(&cfg_dir)?;
            let found = locate(Some(&cookie), &settings.client_id);
            let text = match (&found.last_user, &found.id_token, &found.access_token) {
                (None, _, _) => "No LastAuthUser cookie for this client".to_string(),
                (Some(user), id, access) => format!(
                    "user={user} id_token={} access_token={}",
                    presence(id.as_deref()),
                    presence(access.as_deref())
                ),
            };
            pout(
                cli.json,
                serde_json::json!({
                    "client_id": settings.client_id,
                    "last_user": found.last_user,
                    "id_token": found.id_token,
                    "access_token": found.access_token,
                }),
                &text,
            )?;
        }
        Commands::Verify { kind, token } => {
            let settings = load_settings(&cfg_dir)?;
            let keys = load_key_store(&settings)?;
            let verifier = TokenVerifier::default().with_leeway(settings.leeway_seconds);
            let client_id = settings.client_id.as_str();

            let outcome: Result<serde_json::Value, Rejection> = match kind {
                TokenKind::Id => verifier
                    .verify_detailed(&keys, Some(token.as_str()), |c: &IdentityClaims| {
                        c.aud == client_id
                    })
                    .and_then(|c| to_value(&c)),
                TokenKind::Access => verifier
                    .verify_detailed(&keys, Some(token.as_str()), |c: &AccessClaims| {
                        c.client_id == client_id
                    })
                    .and_then(|c| to_value(&c)),
            };

            match outcome {
                Ok(claims) => pout(
                    cli.json,
                    serde_json::json!({"valid": true, "claims": claims}),
                    &format!("Token valid\n{}", serde_json::to_string_pretty(&claims)?),
                )?,
                Err(reason) => {
                    pout(
                        cli.json,
                        serde_json::json!({"valid": false, "reason": reason.to_string()}),
                        &format!("Token rejected: {reason}"),
                    )?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Resolve { cookie } => {
            let settings = load_settings(&cfg_dir)?;
            let resolver: SessionResolver = build_resolver(&settings)?;
            let header = cookie.or_else(|| EnvCookieSource::new().cookie_header());
            if header.is_none() {
                tracing::warn!("no cookie header given and COGNITO_COOKIE is not set");
            }

            let session = resolver.resolve(header.as_deref());
            let text = match &session {
                Some(s) => format!(
                    "Signed in as {} <{}> until {}",
                    s.username(),
                    s.email(),
                    s.expires_at()
                ),
                None => "Signed out".to_string(),
            };
            pout(cli.json, serde_json::to_value(&session)?, &text)?;
        }
        Commands::Keys => {
            let settings = load_settings(&cfg_dir)?;
            let keys = load_key_store(&settings)?;
            let entries: Vec<KeyEntry<'_>> = keys
                .iter()
                .map(|(region, user_pool_id, key)| KeyEntry {
                    region,
                    user_pool_id,
                    kid: &key.key_id,
                })
                .collect();
            let text = if entries.is_empty() {
                format!("No keys in {}", settings.key_file.display())
            } else {
                entries
                    .iter()
                    .map(|e| format!("{} {} {}", e.region, e.user_pool_id, e.kid))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            pout(cli.json, serde_json::to_value(&entries)?, &text)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_settings(cfg_dir: &Path) -> anyhow::Result<AuthSettings> {
    let settings = load_settings_from_dir(cfg_dir)
        .with_context(|| format!("run `cognito init` to create {}", cfg_dir.display()))?;
    let settings = apply_env_overrides(settings);
    validate_settings(&settings)?;
    Ok(settings)
}

fn to_value<T: Serialize>(claims: &T) -> Result<serde_json::Value, Rejection> {
    serde_json::to_value(claims).map_err(|e| Rejection::Invalid(e.to_string()))
}

fn presence(value: Option<&str>) -> &'static str {
    if value.is_some() { "present" } else { "missing" }
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
