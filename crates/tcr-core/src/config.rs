use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, media::DEFAULT_MAX_PAYLOAD_BYTES, security::AllowList, Result};

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_CAPTION: &str = "Photo from Web App 📸";
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "https://web.telegram.org",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

/// Typed process configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials / access
    /// Always `Some` when produced by [`Config::load`].
    pub bot_token: Option<String>,
    pub allowed_users: AllowList,

    // Server
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub cors_allowed_origins: Vec<String>,

    // Payload limits
    pub max_payload_bytes: usize,

    // Provider
    pub telegram_api_url: String,
    pub send_photo_timeout: Duration,
    pub bot_info_timeout: Duration,
    pub default_caption: String,

    // Request log
    pub log_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let bot_token = env_str("BOT_TOKEN")
            .or_else(|| env_str("TELEGRAM_BOT_TOKEN"))
            .and_then(non_empty);
        let allowed_users = parse_csv_i64(
            env_str("AUTHORIZED_USER_IDS").or_else(|| env_str("AUTHORIZED_USER_ID")),
        );

        if bot_token.is_none() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if allowed_users.is_empty() {
            return Err(Error::Config(
                "AUTHORIZED_USER_IDS environment variable is required".to_string(),
            ));
        }

        let host = env_str("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_u16("PORT").unwrap_or(3000);
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| Error::Config(format!("invalid HOST/PORT {host}:{port}: {e}")))?;

        let cors_allowed_origins = parse_csv(env_str("CORS_ALLOWED_ORIGINS"))
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect());

        let telegram_api_url = env_str("TELEGRAM_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bot_token,
            allowed_users: AllowList::new(allowed_users),
            listen_addr,
            static_dir: env_path("STATIC_DIR").unwrap_or_else(|| PathBuf::from("public")),
            cors_allowed_origins,
            max_payload_bytes: env_usize("MAX_PAYLOAD_BYTES").unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES),
            telegram_api_url,
            send_photo_timeout: Duration::from_secs(
                env_u64("SEND_PHOTO_TIMEOUT_SECS").unwrap_or(30),
            ),
            bot_info_timeout: Duration::from_secs(env_u64("BOT_INFO_TIMEOUT_SECS").unwrap_or(10)),
            default_caption: env_str("DEFAULT_CAPTION")
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_CAPTION.to_string()),
            log_dir: env_path("LOG_DIR").unwrap_or_else(|| PathBuf::from("logs")),
        })
    }

    /// A config with defaults for everything but the credential and allow-list.
    pub fn with_defaults(bot_token: Option<String>, allowed_users: AllowList) -> Self {
        Self {
            bot_token,
            allowed_users,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            static_dir: PathBuf::from("public"),
            cors_allowed_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            send_photo_timeout: Duration::from_secs(30),
            bot_info_timeout: Duration::from_secs(10),
            default_caption: DEFAULT_CAPTION.to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }

    /// Inbound body limit: base64 inflates by 4/3, plus room for the JSON envelope.
    pub fn max_body_bytes(&self) -> usize {
        self.max_payload_bytes
            .saturating_mul(4)
            .div_ceil(3)
            .saturating_add(64 * 1024)
    }

    /// The caption to send: the client's if non-blank, else the configured default.
    pub fn caption_or_default<'a>(&'a self, caption: Option<&'a str>) -> &'a str {
        match caption {
            Some(c) if !c.trim().is_empty() => c,
            _ => &self.default_caption,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_csv(v: Option<String>) -> Option<Vec<String>> {
    let v = v?;
    let out = v
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
