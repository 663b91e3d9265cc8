use crate::application::aggregation::AggregationOptions;
use crate::application::validation::MalformedPolicy;
use crate::domain::palette::{ColorStrategy, Palette, DEFAULT_PALETTE};
use crate::domain::period::MonthLocale;
use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub backend: BackendSettings,
    #[serde(default)]
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
    #[serde(default)]
    pub color_strategy: ColorStrategy,
    #[serde(default)]
    pub month_locale: MonthLocale,
    #[serde(default)]
    pub malformed_records: MalformedPolicy,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            color_strategy: ColorStrategy::default(),
            month_locale: MonthLocale::default(),
            malformed_records: MalformedPolicy::default(),
        }
    }
}

impl DashboardSettings {
    pub fn aggregation_options(&self) -> anyhow::Result<AggregationOptions> {
        let palette = Palette::new(self.palette.clone())
            .context("dashboard.palette must contain at least one color")?;
        Ok(AggregationOptions {
            palette,
            color_strategy: self.color_strategy,
            month_locale: self.month_locale,
            registry: Default::default(),
        })
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_path() -> String {
    "/api/dashboard/site-metrics".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
}

/// Settings from `config/settings.*` (optional) overlaid with
/// `SITE_METRICS__SECTION__KEY` environment variables
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/settings").required(false))
        .add_source(
            config::Environment::with_prefix("SITE_METRICS")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("dashboard.palette"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
