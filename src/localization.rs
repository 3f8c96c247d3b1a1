//! # Localization
//!
//! Renders command outcomes and labels with Fluent. Japanese is the default
//! language; English is available through `KEEPER_LANGUAGE=en`.

use std::collections::HashMap;

use anyhow::Result;
use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use tracing::warn;
use unic_langid::LanguageIdentifier;

/// Languages with a bundled resource file
pub const SUPPORTED_LANGUAGES: &[&str] = &["ja", "en"];

/// Language used when a requested one has no bundle
pub const DEFAULT_LANGUAGE: &str = "ja";

fn resource_source(language: &str) -> Option<&'static str> {
    match language {
        "ja" => Some(include_str!("../locales/ja/main.ftl")),
        "en" => Some(include_str!("../locales/en/main.ftl")),
        _ => None,
    }
}

/// Outcome of a user command, rendered through the message catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Batch requested with an empty queue
    SelectImages,
    /// Page cap reached with no empty slot
    NoRoom,
    /// Batch finished with `count` committed slots
    BatchSaved { count: usize },
    /// A second batch was started while one is running
    BatchRunning,
    /// Writing the session failed
    PersistFailed,
    /// Queue already full, nothing was added
    QueueFull { capacity: usize },
    /// Every offered image was queued
    ImagesAdded { count: usize },
    /// Only a prefix of the offered images fit
    ImagesPartiallyAdded { rejected: usize, capacity: usize },
    /// None of the offered files could be read
    AddFailed,
    LastPageReset,
    PageDeleted,
    PageSelected { page: usize },
    UnknownPage { page: usize },
    /// `slot` is 1-based, as displayed
    Editing { slot: usize },
    EditConfirmed { slot: usize },
    SlotEmpty { slot: usize },
    Copied { slot: usize },
    /// Batch progress: loading `name`
    Reading { name: String },
    /// Batch progress: finished
    Complete,
    /// Queue summary
    QueueWaiting { count: usize },
}

impl Status {
    /// Message id in the Fluent resources
    pub fn key(&self) -> &'static str {
        match self {
            Status::SelectImages => "status-select-images",
            Status::NoRoom => "status-no-room",
            Status::BatchSaved { .. } => "status-batch-saved",
            Status::BatchRunning => "status-batch-running",
            Status::PersistFailed => "status-persist-failed",
            Status::QueueFull { .. } => "status-queue-full",
            Status::ImagesAdded { .. } => "status-images-added",
            Status::ImagesPartiallyAdded { .. } => "status-images-partially-added",
            Status::AddFailed => "status-add-failed",
            Status::LastPageReset => "status-last-page-reset",
            Status::PageDeleted => "status-page-deleted",
            Status::PageSelected { .. } => "status-page-selected",
            Status::UnknownPage { .. } => "status-unknown-page",
            Status::Editing { .. } => "status-editing",
            Status::EditConfirmed { .. } => "status-edit-confirmed",
            Status::SlotEmpty { .. } => "status-slot-empty",
            Status::Copied { .. } => "status-copied",
            Status::Reading { .. } => "progress-reading",
            Status::Complete => "progress-complete",
            Status::QueueWaiting { count: 0 } => "queue-idle",
            Status::QueueWaiting { .. } => "queue-waiting",
        }
    }

    /// Placeable arguments
    pub fn args(&self) -> Vec<(&'static str, String)> {
        match self {
            Status::BatchSaved { count }
            | Status::ImagesAdded { count }
            | Status::QueueWaiting { count } => vec![("count", count.to_string())],
            Status::QueueFull { capacity } => vec![("capacity", capacity.to_string())],
            Status::ImagesPartiallyAdded { rejected, capacity } => vec![
                ("rejected", rejected.to_string()),
                ("capacity", capacity.to_string()),
            ],
            Status::PageSelected { page } => vec![("page", page.to_string())],
            Status::UnknownPage { page } => vec![("page", page.to_string())],
            Status::Editing { slot }
            | Status::EditConfirmed { slot }
            | Status::SlotEmpty { slot }
            | Status::Copied { slot } => vec![("slot", slot.to_string())],
            Status::Reading { name } => vec![("name", name.clone())],
            _ => Vec::new(),
        }
    }
}

/// Fluent bundles for every supported language
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Load every bundled resource
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for locale_str in SUPPORTED_LANGUAGES {
            let locale: LanguageIdentifier = locale_str.parse()?;
            let bundle = Self::create_bundle(&locale, locale_str)?;
            bundles.insert(locale_str.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: &LanguageIdentifier,
        language: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new(vec![locale.clone()]);
        // Plain terminal output; no bidi isolation marks around placeables
        bundle.set_use_isolating(false);

        let source = resource_source(language)
            .ok_or_else(|| anyhow::anyhow!("No resource bundled for language '{}'", language))?;
        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid {} resource: {:?}", language, errors))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate {} messages: {:?}", language, errors))?;

        Ok(bundle)
    }

    /// Check if a language is supported
    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Render `key` in `language`, falling back to the default language
    pub fn get_message_with_args_in_language(
        &self,
        key: &str,
        language: &str,
        args: &[(&str, String)],
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None => return format!("Missing translation: {}", key),
        };

        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(value.as_str()));
        }

        let mut errors = Vec::new();
        let value = bundle.format_pattern(pattern, Some(&fluent_args), &mut errors);
        if !errors.is_empty() {
            warn!(key, language, errors = ?errors, "Message formatted with errors");
        }
        value.into_owned()
    }

    /// Render a status in `language`
    pub fn render(&self, status: &Status, language: &str) -> String {
        self.get_message_with_args_in_language(status.key(), language, &status.args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_japanese_texts() {
        let manager = LocalizationManager::new().unwrap();
        assert_eq!(manager.render(&Status::NoRoom, "ja"), "空き枠がありません");
        assert_eq!(
            manager.render(&Status::BatchSaved { count: 3 }, "ja"),
            "3件を保存しました"
        );
        assert_eq!(
            manager.render(
                &Status::ImagesPartiallyAdded {
                    rejected: 5,
                    capacity: 200
                },
                "ja"
            ),
            "200枚上限のため 5 枚は追加されませんでした"
        );
        assert_eq!(
            manager.render(&Status::QueueWaiting { count: 0 }, "ja"),
            "待機中"
        );
        assert_eq!(
            manager.render(&Status::QueueWaiting { count: 4 }, "ja"),
            "待機中: 4枚"
        );
    }

    #[test]
    fn test_unknown_language_falls_back_to_japanese() {
        let manager = LocalizationManager::new().unwrap();
        assert!(!manager.is_language_supported("de"));
        assert_eq!(
            manager.render(&Status::Copied { slot: 2 }, "de"),
            "枠2をコピーしました"
        );
    }

    #[test]
    fn test_every_status_has_a_message() {
        let manager = LocalizationManager::new().unwrap();
        let statuses = [
            Status::SelectImages,
            Status::BatchRunning,
            Status::PersistFailed,
            Status::QueueFull { capacity: 200 },
            Status::ImagesAdded { count: 1 },
            Status::AddFailed,
            Status::LastPageReset,
            Status::PageDeleted,
            Status::PageSelected { page: 1 },
            Status::UnknownPage { page: 9 },
            Status::Editing { slot: 1 },
            Status::EditConfirmed { slot: 1 },
            Status::SlotEmpty { slot: 1 },
            Status::Reading {
                name: "a.jpg".to_string(),
            },
            Status::Complete,
        ];
        for language in SUPPORTED_LANGUAGES {
            for status in &statuses {
                let text = manager.render(status, language);
                assert!(!text.starts_with("Missing"), "{} in {}", status.key(), language);
            }
        }
    }
}
