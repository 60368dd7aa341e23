//! Resource catalog: which options can be scanned against.
//!
//! Options are always derived from the event's resource settings. The
//! catalog never invents real options; when nothing usable comes back it
//! substitutes clearly marked placeholders so the operator can tell the
//! station is not configured.

use crate::api::{ApiResult, AtlasApi};
use crate::error::ApiError;
use crate::types::{EventId, OptionOrigin, ResourceOption, ResourceOptionId, ResourceType, TemplateField};
use chrono::{DateTime, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

// ============================================================================
// Settings shapes
// ============================================================================

/// Resource settings of an event, as configured by organizers
///
/// Each collection is decoded leniently: a collection that is missing or not
/// a list reads as empty, and entries that do not decode are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    /// Food: one entry per conference day
    #[serde(deserialize_with = "lenient_list")]
    pub days: Vec<FoodDay>,
    /// Kits: kit bag items
    #[serde(deserialize_with = "lenient_list")]
    pub items: Vec<SettingsEntry>,
    /// Certificates: certificate types
    #[serde(deserialize_with = "lenient_list")]
    pub types: Vec<SettingsEntry>,
    /// Certificate printing: printable templates
    #[serde(deserialize_with = "lenient_list")]
    pub templates: Vec<SettingsEntry>,
}

/// A conference day and the meals served on it
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodDay {
    /// Calendar date, ISO 8601
    pub date: Option<String>,
    /// Meals served that day
    #[serde(deserialize_with = "lenient_list")]
    pub meals: Vec<Meal>,
}

/// A meal slot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meal {
    /// Meal name (Breakfast, Lunch, ...)
    pub name: Option<String>,
}

/// A kit item, certificate type or certificate template
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsEntry {
    /// Database id, absent on entries that were never saved individually
    #[serde(rename = "_id")]
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Printable fields (templates only)
    #[serde(deserialize_with = "lenient_list")]
    pub fields: Vec<TemplateField>,
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// ============================================================================
// Flattening
// ============================================================================

/// Flatten settings into the options of one resource type
#[must_use]
pub fn flatten_options(settings: &ResourceSettings, resource_type: ResourceType) -> Vec<ResourceOption> {
    match resource_type {
        ResourceType::Food => food_options(&settings.days),
        ResourceType::Kits => entry_options(&settings.items, resource_type),
        ResourceType::Certificates => entry_options(&settings.types, resource_type),
        ResourceType::CertificatePrinting => entry_options(&settings.templates, resource_type),
    }
}

fn food_options(days: &[FoodDay]) -> Vec<ResourceOption> {
    days.iter()
        .enumerate()
        .flat_map(|(day_index, day)| {
            let day_label = day_label(day.date.as_deref(), day_index);
            day.meals.iter().enumerate().map(move |(meal_index, meal)| {
                let meal_name = meal
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map_or_else(|| format!("Meal {}", meal_index + 1), str::to_string);
                ResourceOption::configured(
                    format!("{day_index}_{meal_name}"),
                    format!("{meal_name} ({day_label})"),
                )
            })
        })
        .collect()
}

/// `"Jan 1"` for a parseable date, `"Day {n}"` otherwise
fn day_label(date: Option<&str>, day_index: usize) -> String {
    date.and_then(parse_day)
        .map_or_else(|| format!("Day {}", day_index + 1), |d| d.format("%b %-d").to_string())
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

fn entry_options(entries: &[SettingsEntry], resource_type: ResourceType) -> Vec<ResourceOption> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| ResourceOption {
            id: ResourceOptionId::new(
                entry
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("{resource_type}-{index}")),
            ),
            name: entry
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| format!("{} {}", resource_type.label(), index + 1)),
            origin: OptionOrigin::Configured,
            fields: entry.fields.clone(),
        })
        .collect()
}

/// Stand-ins shown when a type has no configured options
#[must_use]
pub fn placeholder_options(resource_type: ResourceType) -> Vec<ResourceOption> {
    (1..=2)
        .map(|n| ResourceOption {
            id: ResourceOptionId::new(format!("{resource_type}-placeholder-{n}")),
            name: format!("{} Option {n}", resource_type.label()),
            origin: OptionOrigin::Placeholder,
            fields: Vec::new(),
        })
        .collect()
}

/// Stand-in shown when the settings could not be loaded
#[must_use]
pub fn load_error_option(resource_type: ResourceType) -> ResourceOption {
    ResourceOption {
        id: ResourceOptionId::new(format!("{resource_type}-error")),
        name: format!("Error Loading {} Options", resource_type.label()),
        origin: OptionOrigin::LoadError,
        fields: Vec::new(),
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Options resolved for one resource type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogLoad {
    /// Resource type the options belong to
    pub resource_type: ResourceType,
    /// Options in display order
    pub options: Vec<ResourceOption>,
    /// Why loading failed, if it did
    pub error: Option<ApiError>,
}

impl CatalogLoad {
    /// Resolve a settings fetch into options
    ///
    /// With `placeholders` enabled an empty result yields two placeholder
    /// options and a failure yields a single load-error option; otherwise
    /// both yield no options.
    #[must_use]
    pub fn resolve(
        resource_type: ResourceType,
        settings: ApiResult<ResourceSettings>,
        placeholders: bool,
    ) -> Self {
        match settings {
            Ok(settings) => {
                let mut options = flatten_options(&settings, resource_type);
                if options.is_empty() && placeholders {
                    options = placeholder_options(resource_type);
                }
                Self {
                    resource_type,
                    options,
                    error: None,
                }
            },
            Err(error) => Self {
                resource_type,
                options: if placeholders {
                    vec![load_error_option(resource_type)]
                } else {
                    Vec::new()
                },
                error: Some(error),
            },
        }
    }

    /// The option selected by default: the first one
    #[must_use]
    pub fn default_selection(&self) -> Option<ResourceOptionId> {
        self.options.first().map(|option| option.id.clone())
    }
}

/// Loads resource options for an event
#[derive(Clone)]
pub struct ResourceCatalog {
    api: Arc<dyn AtlasApi>,
    placeholder_options: bool,
}

impl ResourceCatalog {
    /// Create a catalog over the backend
    #[must_use]
    pub fn new(api: Arc<dyn AtlasApi>, placeholder_options: bool) -> Self {
        Self {
            api,
            placeholder_options,
        }
    }

    /// Load the options of `resource_type` for `event`
    ///
    /// Never fails: failures resolve to the fallback options and are kept
    /// in [`CatalogLoad::error`].
    pub async fn load(&self, event: EventId, resource_type: ResourceType) -> CatalogLoad {
        let settings = self.api.resource_settings(event.clone(), resource_type).await;

        if let Err(error) = &settings {
            tracing::warn!(%event, %resource_type, %error, "Failed to load resource options");
            metrics::counter!("catalog.load.failures", "type" => resource_type.as_str()).increment(1);
        }

        let load = CatalogLoad::resolve(resource_type, settings, self.placeholder_options);
        tracing::debug!(%event, %resource_type, options = load.options.len(), "Resource options loaded");
        load
    }
}

impl std::fmt::Debug for ResourceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCatalog")
            .field("placeholder_options", &self.placeholder_options)
            .finish_non_exhaustive()
    }
}
