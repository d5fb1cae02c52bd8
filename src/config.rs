//! Server configuration parsed from environment variables.
//!
//! Read once at startup. Every key is optional; a present but unparseable
//! value is a startup error rather than a silent fallback.

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Fixed display-color palette, assigned round-robin to joining participants.
pub const DEFAULT_PALETTE: &[&str] = &[
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("OUTBOX_CAPACITY must be at least 1")]
    ZeroCapacity,
    #[error("PALETTE must list at least one color")]
    EmptyPalette,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Depth of each connection's outbound queue.
    pub outbox_capacity: usize,
    /// Room joined when a `join` omits `roomKey`.
    pub default_room: String,
    pub palette: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            default_room: protocol::DEFAULT_ROOM_KEY.to_owned(),
            palette: DEFAULT_PALETTE.iter().map(|c| (*c).to_owned()).collect(),
        }
    }
}

impl ServerConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `HOST`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `OUTBOX_CAPACITY`: default 256
    /// - `DEFAULT_ROOM`: default `default`
    /// - `PALETTE`: comma-separated colors, default built-in palette
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a present value cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. `from_env` delegates here.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = non_empty(lookup("HOST")).unwrap_or(defaults.host);
        let port = parse_or("PORT", lookup("PORT"), defaults.port)?;
        let outbox_capacity = parse_or("OUTBOX_CAPACITY", lookup("OUTBOX_CAPACITY"), defaults.outbox_capacity)?;
        if outbox_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let default_room = non_empty(lookup("DEFAULT_ROOM")).unwrap_or(defaults.default_room);
        let palette = match lookup("PALETTE") {
            Some(raw) => parse_palette(&raw)?,
            None => defaults.palette,
        };

        Ok(Self { host, port, outbox_capacity, default_room, palette })
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue { key, value: raw })
}

fn parse_palette(raw: &str) -> Result<Vec<String>, ConfigError> {
    let colors: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect();
    if colors.is_empty() {
        return Err(ConfigError::EmptyPalette);
    }
    Ok(colors)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
