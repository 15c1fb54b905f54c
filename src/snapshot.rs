use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};

/// Install/update channels as Vesslo writes them. The set is open; a
/// record may belong to several channels at once.
pub const SOURCE_BREW: &str = "Brew";
pub const SOURCE_APP_STORE: &str = "App Store";
pub const SOURCE_SPARKLE: &str = "Sparkle";
pub const SOURCE_MANUAL: &str = "Manual";

/// One export of Vesslo's tracked apps, validated and defaulted.
///
/// Immutable once built; a newer export replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot
{
    /// Export timestamp, compared only as a string to detect changes.
    #[serde(rename = "exportedAt", default = "fallback_export_token")]
    pub exported_at: String,
    /// Vesslo's own count of pending updates; trusted, not re-derived.
    #[serde(rename = "updateCount", default)]
    pub update_count: u32,
    /// Tracked apps in writer order.
    #[serde(deserialize_with = "valid_records")]
    pub apps: Vec<AppRecord>,
}

impl Snapshot
{
    /// A snapshot is fresh when exported within the last 24 hours.
    /// Pure in `now` so the boundary is testable.
    pub fn is_fresh(&self,
                    now: DateTime<Utc>)
                    -> bool
    {
        match DateTime::parse_from_rfc3339(&self.exported_at)
        {
            Ok(exported) => now.signed_duration_since(exported) < Duration::hours(24),
            Err(_) => false,
        }
    }
}

/// One tracked application within a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppRecord
{
    /// Stable identity across snapshots.
    pub id: String,
    pub name: String,
    /// Bundle location on disk.
    pub path: String,
    /// Platform identifier, needed for vesslo:// deep links.
    pub bundle_id: Option<String>,
    /// Currently installed version.
    pub version: Option<String>,
    /// Version available to update to; see `has_pending_update`.
    pub target_version: Option<String>,
    pub developer: Option<String>,
    /// Base64 image payload; carried opaquely.
    pub icon: Option<String>,
    pub tags: Vec<String>,
    pub memo: Option<String>,
    pub sources: Vec<String>,
    /// Store identifier, needed for mas/App Store actions.
    pub app_store_id: Option<String>,
    /// Cask token, needed for Homebrew actions.
    pub homebrew_cask: Option<String>,
}

impl AppRecord
{
    /// A record is ingested only when the writer gave it a non-empty id,
    /// name and path. Everything else is defaulted, never rejected.
    pub fn is_valid(&self) -> bool
    {
        !self.id.is_empty() && !self.name.is_empty() && !self.path.is_empty()
    }

    /// Whether an update is pending. Vesslo has emitted every placeholder
    /// shape at some point: a missing key, JSON null, the literal string
    /// "undefined" and blank strings all mean "no update".
    pub fn has_pending_update(&self) -> bool
    {
        match &self.target_version
        {
            Some(version) => version != "undefined" && !version.trim().is_empty(),
            None => false,
        }
    }

    pub fn is_homebrew(&self) -> bool
    {
        self.sources.iter().any(|s| s == SOURCE_BREW)
    }

    pub fn is_app_store(&self) -> bool
    {
        self.sources.iter().any(|s| s == SOURCE_APP_STORE)
    }

    pub fn is_sparkle(&self) -> bool
    {
        self.sources.iter().any(|s| s == SOURCE_SPARKLE)
    }

    /// Badge precedence: Brew, then App Store, then Sparkle, else Manual.
    pub fn primary_source(&self) -> &'static str
    {
        if self.is_homebrew()
        {
            SOURCE_BREW
        }
        else if self.is_app_store()
        {
            SOURCE_APP_STORE
        }
        else if self.is_sparkle()
        {
            SOURCE_SPARKLE
        }
        else
        {
            SOURCE_MANUAL
        }
    }

    /// "1.2.3 → 1.3.0" accessory for update rows.
    pub fn version_arrow(&self) -> String
    {
        format!("{} → {}",
                self.version.as_deref().unwrap_or("?"),
                self.target_version.as_deref().unwrap_or("?"))
    }

    /// Version, developer and #tags joined for the row subtitle.
    pub fn subtitle(&self) -> String
    {
        let mut parts: Vec<String> = Vec::new();
        if let Some(version) = &self.version
        {
            parts.push(version.clone());
        }
        if let Some(developer) = &self.developer
        {
            parts.push(developer.clone());
        }
        for tag in &self.tags
        {
            parts.push(format!("#{}", tag));
        }
        parts.join(" • ")
    }
}

/// Fallback token when the writer omitted `exportedAt`. Stamping "now"
/// keeps the snapshot usable, at the cost that such snapshots compare as
/// changed on every poll.
fn fallback_export_token() -> String
{
    Utc::now().to_rfc3339()
}

/// Deserialize the `apps` array leniently: records missing id/name/path,
/// or too malformed to type at all, are dropped without failing the load.
fn valid_records<'de, D>(deserializer: D) -> Result<Vec<AppRecord>, D::Error>
    where D: Deserializer<'de>
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;

    Ok(raw.into_iter()
          .filter_map(|value| serde_json::from_value::<AppRecord>(value).ok())
          .filter(AppRecord::is_valid)
          .collect())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use chrono::TimeZone;

    fn record_with_target(target_version: Option<&str>) -> AppRecord
    {
        AppRecord {
            id: "1".to_string(),
            name: "Example".to_string(),
            path: "/Applications/Example.app".to_string(),
            target_version: target_version.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn pending_update_rejects_every_placeholder_shape()
    {
        assert!(!record_with_target(None).has_pending_update());
        assert!(!record_with_target(Some("undefined")).has_pending_update());
        assert!(!record_with_target(Some("")).has_pending_update());
        assert!(!record_with_target(Some("   ")).has_pending_update());

        assert!(record_with_target(Some("2.1.0")).has_pending_update());
    }

    #[test]
    fn json_null_target_version_means_no_update()
    {
        let record: AppRecord = serde_json::from_str(
            r#"{"id":"1","name":"Example","path":"/a","targetVersion":null}"#,
        ).unwrap();

        assert_eq!(record.target_version, None);
        assert!(!record.has_pending_update());
    }

    #[test]
    fn freshness_boundary_is_24_hours()
    {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();

        let fresh = Snapshot {
            exported_at: "2024-06-01T12:01:00+00:00".to_string(),
            update_count: 0,
            apps: Vec::new(),
        };
        assert!(fresh.is_fresh(now));

        let stale = Snapshot {
            exported_at: "2024-06-01T11:59:00+00:00".to_string(),
            update_count: 0,
            apps: Vec::new(),
        };
        assert!(!stale.is_fresh(now));
    }

    #[test]
    fn unparseable_export_timestamp_is_never_fresh()
    {
        let snapshot = Snapshot {
            exported_at: "last tuesday".to_string(),
            update_count: 0,
            apps: Vec::new(),
        };

        assert!(!snapshot.is_fresh(Utc::now()));
    }

    #[test]
    fn future_export_timestamp_counts_as_fresh()
    {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
        let snapshot = Snapshot {
            exported_at: "2024-06-03T12:00:00+00:00".to_string(),
            update_count: 0,
            apps: Vec::new(),
        };

        assert!(snapshot.is_fresh(now));
    }

    #[test]
    fn primary_source_prefers_brew_then_app_store_then_sparkle()
    {
        let mut record = record_with_target(None);
        assert_eq!(record.primary_source(), SOURCE_MANUAL);

        record.sources = vec![SOURCE_SPARKLE.to_string()];
        assert_eq!(record.primary_source(), SOURCE_SPARKLE);

        record.sources = vec![SOURCE_SPARKLE.to_string(), SOURCE_APP_STORE.to_string()];
        assert_eq!(record.primary_source(), SOURCE_APP_STORE);

        record.sources.push(SOURCE_BREW.to_string());
        assert_eq!(record.primary_source(), SOURCE_BREW);
    }

    #[test]
    fn subtitle_joins_present_fields_only()
    {
        let mut record = record_with_target(None);
        assert_eq!(record.subtitle(), "");

        record.version = Some("1.0".to_string());
        record.developer = Some("Acme".to_string());
        record.tags = vec!["work".to_string(), "daily".to_string()];
        assert_eq!(record.subtitle(), "1.0 • Acme • #work • #daily");
    }
}
