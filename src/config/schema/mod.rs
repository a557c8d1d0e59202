use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Generates a `Debug` impl that redacts secret fields.
///
/// - `field_name`: printed normally
/// - `redact_option(field_name)`: `Option<String>`, shows `None` or `Some("[REDACTED]")`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact_option($field:ident)) => {
        $builder.field(
            stringify!($field),
            &$self.$field.as_ref().map(|_| "[REDACTED]"),
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact_option($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact_option($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

fn default_operator_name() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Recorded as `addedBy` on contacts created through this process.
    #[serde(default = "default_operator_name")]
    pub name: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            name: default_operator_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// Address book
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddressBookConfig {
    #[serde(default, rename = "dbPath")]
    pub db_path: Option<String>,
}

impl AddressBookConfig {
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(crate::utils::expand_home(path)),
            None => Ok(crate::utils::get_bulletin_home()?.join("address_book.db")),
        }
    }
}

// ---------------------------------------------------------------------------
// Content sources
// ---------------------------------------------------------------------------

fn default_timeout_secs() -> u64 {
    15
}

fn default_persons_path() -> String {
    "persons".to_string()
}

fn default_news_path() -> String {
    "news".to_string()
}

fn default_activities_path() -> String {
    "activities".to_string()
}

fn default_places_path() -> String {
    "places".to_string()
}

fn default_legends_path() -> String {
    "legends".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Base URL of the content API. Empty means no content store is configured.
    #[serde(default, rename = "baseUrl")]
    pub base_url: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs", rename = "timeoutSecs")]
    pub timeout_secs: u64,
    #[serde(default = "default_persons_path", rename = "personsPath")]
    pub persons_path: String,
    #[serde(default = "default_news_path", rename = "newsPath")]
    pub news_path: String,
    #[serde(default = "default_activities_path", rename = "activitiesPath")]
    pub activities_path: String,
    #[serde(default = "default_places_path", rename = "placesPath")]
    pub places_path: String,
    #[serde(default = "default_legends_path", rename = "legendsPath")]
    pub legends_path: String,
}

redact_debug!(
    ContentConfig,
    base_url,
    redact_option(api_key),
    timeout_secs,
    persons_path,
    news_path,
    activities_path,
    places_path,
    legends_path,
);

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            persons_path: default_persons_path(),
            news_path: default_news_path(),
            activities_path: default_activities_path(),
            places_path: default_places_path(),
            legends_path: default_legends_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Hard limits on the pause between items of a batch. Config may narrow
/// this range but never widen it.
pub const MIN_DELAY_SECS: u64 = 1;
pub const MAX_DELAY_SECS: u64 = 60;

fn default_cooldown_secs() -> u64 {
    3
}

fn default_min_delay_secs() -> u64 {
    MIN_DELAY_SECS
}

fn default_max_delay_secs() -> u64 {
    MAX_DELAY_SECS
}

fn default_delay_secs() -> u64 {
    2
}

fn default_max_deliveries() -> usize {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Quiet period after a batch completes before another may start.
    #[serde(default = "default_cooldown_secs", rename = "cooldownSecs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_min_delay_secs", rename = "minDelaySecs")]
    pub min_delay_secs: u64,
    #[serde(default = "default_max_delay_secs", rename = "maxDelaySecs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_delay_secs", rename = "defaultDelaySecs")]
    pub default_delay_secs: u64,
    /// Upper bound on items x recipients for a single batch.
    #[serde(default = "default_max_deliveries", rename = "maxDeliveriesPerBatch")]
    pub max_deliveries_per_batch: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            default_delay_secs: default_delay_secs(),
            max_deliveries_per_batch: default_max_deliveries(),
        }
    }
}

// ---------------------------------------------------------------------------
// WhatsApp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "sessionDir")]
    pub session_dir: Option<String>,
}

impl WhatsAppConfig {
    pub fn resolve_session_dir(&self) -> Result<PathBuf> {
        match &self.session_dir {
            Some(path) => Ok(crate::utils::expand_home(path)),
            None => Ok(crate::utils::get_bulletin_home()?.join("whatsapp")),
        }
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub operator: OperatorConfig,
    #[serde(default, rename = "addressBook")]
    pub address_book: AddressBookConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.operator.name.trim().is_empty() {
            bail!("operator.name must not be empty");
        }

        let dispatch = &self.dispatch;
        if dispatch.min_delay_secs < MIN_DELAY_SECS {
            bail!("dispatch.minDelaySecs must be at least {}", MIN_DELAY_SECS);
        }
        if dispatch.max_delay_secs > MAX_DELAY_SECS {
            bail!(
                "dispatch.maxDelaySecs ({}) must not exceed {}",
                dispatch.max_delay_secs,
                MAX_DELAY_SECS
            );
        }
        if dispatch.min_delay_secs > dispatch.max_delay_secs {
            bail!(
                "dispatch.minDelaySecs ({}) must not exceed dispatch.maxDelaySecs ({})",
                dispatch.min_delay_secs,
                dispatch.max_delay_secs
            );
        }
        if !(dispatch.min_delay_secs..=dispatch.max_delay_secs)
            .contains(&dispatch.default_delay_secs)
        {
            bail!(
                "dispatch.defaultDelaySecs ({}) must be within [{}, {}]",
                dispatch.default_delay_secs,
                dispatch.min_delay_secs,
                dispatch.max_delay_secs
            );
        }
        if dispatch.max_deliveries_per_batch == 0 {
            bail!("dispatch.maxDeliveriesPerBatch must be greater than 0");
        }

        if !self.content.base_url.is_empty() {
            let parsed = url::Url::parse(&self.content.base_url).map_err(|e| {
                anyhow::anyhow!(
                    "content.baseUrl is not a valid URL ({}): {}",
                    self.content.base_url,
                    e
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("content.baseUrl must use http or https");
            }
        }
        if self.content.timeout_secs == 0 {
            bail!("content.timeoutSecs must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
