//! Named correction prompts
//!
//! A prompt is the instruction text that steers what kind of correction the
//! model performs (grammar, tone, concision, ...). The set is user-owned and
//! lives in the settings file; at least one prompt must always exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Maximum prompt name length (characters)
pub const MAX_NAME_LEN: usize = 64;
/// Maximum prompt text length (characters)
pub const MAX_PROMPT_LEN: usize = 8000;

/// A named correction prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamePromptPair {
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NamePromptPair {
    fn new(name: &str, prompt: &str, description: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            prompt: prompt.trim().to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for an existing prompt
#[derive(Debug, Clone, Default)]
pub struct PromptPatch {
    pub name: Option<String>,
    pub prompt: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

/// Prompt management errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt name must not be empty")]
    EmptyName,

    #[error("Prompt name is longer than {} characters", MAX_NAME_LEN)]
    NameTooLong,

    #[error("Prompt text must not be empty")]
    EmptyPrompt,

    #[error("Prompt text is longer than {} characters", MAX_PROMPT_LEN)]
    PromptTooLong,

    #[error("A prompt named '{0}' already exists")]
    DuplicateName(String),

    #[error("Prompt not found: {0}")]
    NotFound(String),

    #[error("Cannot delete '{0}': at least one prompt must remain")]
    LastPrompt(String),

    #[error("Import failed: {0}")]
    Import(String),
}

/// Built-in prompts seeded when the settings hold none
pub fn default_prompts() -> Vec<NamePromptPair> {
    vec![
        NamePromptPair::new(
            "Grammar",
            "Fix spelling, grammar and punctuation mistakes. Keep the author's wording and \
             style wherever it is already correct.",
            Some("Spelling, grammar and punctuation"),
        ),
        NamePromptPair::new(
            "Formal",
            "Rewrite phrases that sound casual so the text reads as clear, professional, \
             formal prose. Do not change the meaning.",
            Some("Professional tone"),
        ),
        NamePromptPair::new(
            "Concise",
            "Shorten wordy or redundant phrases. Remove filler words. Keep every fact.",
            Some("Tighter wording"),
        ),
        NamePromptPair::new(
            "Friendly",
            "Adjust stiff or cold phrases so the text sounds warm and approachable while \
             staying correct.",
            Some("Casual, friendly tone"),
        ),
    ]
}

fn validate_name(name: &str) -> Result<(), PromptError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PromptError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(PromptError::NameTooLong);
    }
    Ok(())
}

fn validate_prompt(prompt: &str) -> Result<(), PromptError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PromptError::EmptyPrompt);
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(PromptError::PromptTooLong);
    }
    Ok(())
}

/// Owns the ordered set of prompts
#[derive(Debug, Clone)]
pub struct PromptManager {
    prompts: Vec<NamePromptPair>,
}

impl PromptManager {
    /// Build from stored prompts, seeding the defaults when the list is empty.
    ///
    /// Invalid or duplicate stored entries are dropped rather than failing the
    /// whole load; the user can re-create them.
    pub fn from_stored(stored: Vec<NamePromptPair>) -> Self {
        let mut prompts: Vec<NamePromptPair> = Vec::with_capacity(stored.len());
        for pair in stored {
            let valid = validate_name(&pair.name).is_ok() && validate_prompt(&pair.prompt).is_ok();
            let duplicate = prompts.iter().any(|p| same_name(&p.name, &pair.name));
            if valid && !duplicate {
                prompts.push(pair);
            } else {
                debug!(name = %pair.name, "Dropping invalid stored prompt");
            }
        }

        let mut manager = Self { prompts };
        manager.ensure_seeded();
        manager
    }

    /// Seed the defaults if no prompt exists. Returns true if it seeded.
    pub fn ensure_seeded(&mut self) -> bool {
        if self.prompts.is_empty() {
            self.prompts = default_prompts();
            info!(count = self.prompts.len(), "Seeded default prompts");
            true
        } else {
            false
        }
    }

    pub fn list(&self) -> &[NamePromptPair] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Look up by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&NamePromptPair> {
        self.prompts.iter().find(|p| same_name(&p.name, name))
    }

    pub fn get_by_id(&self, id: &str) -> Option<&NamePromptPair> {
        self.prompts.iter().find(|p| p.id == id)
    }

    /// Resolve by id first, then by name
    pub fn resolve(&self, key: &str) -> Result<&NamePromptPair, PromptError> {
        self.get_by_id(key)
            .or_else(|| self.get(key))
            .ok_or_else(|| PromptError::NotFound(key.to_string()))
    }

    pub fn add(
        &mut self,
        name: &str,
        prompt: &str,
        description: Option<&str>,
    ) -> Result<&NamePromptPair, PromptError> {
        validate_name(name)?;
        validate_prompt(prompt)?;
        if self.get(name).is_some() {
            return Err(PromptError::DuplicateName(name.trim().to_string()));
        }

        let pair = NamePromptPair::new(name, prompt, description);
        info!(name = %pair.name, id = %pair.id, "Added prompt");
        self.prompts.push(pair);
        Ok(&self.prompts[self.prompts.len() - 1])
    }

    /// Update the prompt identified by id or name
    pub fn update(&mut self, key: &str, patch: PromptPatch) -> Result<&NamePromptPair, PromptError> {
        let id = self.resolve(key)?.id.clone();

        if let Some(ref name) = patch.name {
            validate_name(name)?;
            if self
                .prompts
                .iter()
                .any(|p| p.id != id && same_name(&p.name, name))
            {
                return Err(PromptError::DuplicateName(name.trim().to_string()));
            }
        }
        if let Some(ref prompt) = patch.prompt {
            validate_prompt(prompt)?;
        }

        let index = self
            .prompts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))?;
        let pair = &mut self.prompts[index];
        if let Some(name) = patch.name {
            pair.name = name.trim().to_string();
        }
        if let Some(prompt) = patch.prompt {
            pair.prompt = prompt.trim().to_string();
        }
        if let Some(description) = patch.description {
            pair.description = description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
        }
        pair.updated_at = Utc::now();
        info!(name = %pair.name, id = %pair.id, "Updated prompt");
        Ok(&self.prompts[index])
    }

    /// Delete the prompt identified by id or name. The last prompt cannot be deleted.
    pub fn remove(&mut self, key: &str) -> Result<NamePromptPair, PromptError> {
        let pair = self.resolve(key)?;
        if self.prompts.len() <= 1 {
            return Err(PromptError::LastPrompt(pair.name.clone()));
        }
        let id = pair.id.clone();
        let index = self
            .prompts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))?;
        let removed = self.prompts.remove(index);
        info!(name = %removed.name, id = %removed.id, "Removed prompt");
        Ok(removed)
    }

    /// Replace the set with the built-in defaults
    pub fn reset_to_defaults(&mut self) {
        self.prompts = default_prompts();
        info!("Reset prompts to defaults");
    }

    /// Export as pretty JSON
    pub fn export_json(&self) -> Result<String, PromptError> {
        serde_json::to_string_pretty(&self.prompts).map_err(|e| PromptError::Import(e.to_string()))
    }

    /// Merge prompts from a JSON array. Entries whose names already exist are
    /// skipped. Returns the number of prompts added.
    ///
    /// All or nothing: one invalid entry leaves the prompt set unchanged.
    pub fn import_json(&mut self, json: &str) -> Result<usize, PromptError> {
        #[derive(Deserialize)]
        struct Incoming {
            name: String,
            prompt: String,
            #[serde(default)]
            description: Option<String>,
        }

        let incoming: Vec<Incoming> =
            serde_json::from_str(json).map_err(|e| PromptError::Import(e.to_string()))?;

        let mut staged = self.clone();
        let mut added = 0;
        for item in incoming {
            match staged.add(&item.name, &item.prompt, item.description.as_deref()) {
                Ok(_) => added += 1,
                Err(PromptError::DuplicateName(name)) => {
                    debug!(%name, "Skipping duplicate prompt on import");
                }
                Err(e) => return Err(PromptError::Import(format!("'{}': {}", item.name, e))),
            }
        }
        *self = staged;
        Ok(added)
    }

    /// Consume into the stored representation
    pub fn into_inner(self) -> Vec<NamePromptPair> {
        self.prompts
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PromptManager {
        PromptManager::from_stored(Vec::new())
    }

    #[test]
    fn test_empty_store_seeds_defaults() {
        let m = manager();
        assert_eq!(m.len(), default_prompts().len());
        assert!(m.get("grammar").is_some());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut m = manager();
        let id = m
            .add("  Legal ", "Use precise legal wording.", Some("contracts"))
            .unwrap()
            .id
            .clone();
        let pair = m.get("legal").unwrap();
        assert_eq!(pair.name, "Legal");
        assert_eq!(pair.description.as_deref(), Some("contracts"));
        assert_eq!(m.resolve(&id).unwrap().name, "Legal");
    }

    #[test]
    fn test_add_rejects_invalid() {
        let mut m = manager();
        assert_eq!(m.add("  ", "x", None).unwrap_err(), PromptError::EmptyName);
        assert_eq!(m.add("X", "  ", None).unwrap_err(), PromptError::EmptyPrompt);
        assert!(matches!(
            m.add("GRAMMAR", "dup", None).unwrap_err(),
            PromptError::DuplicateName(_)
        ));
        let long = "n".repeat(MAX_NAME_LEN + 1);
        assert_eq!(m.add(&long, "x", None).unwrap_err(), PromptError::NameTooLong);
    }

    #[test]
    fn test_update_rename_and_clear_description() {
        let mut m = manager();
        let updated = m
            .update(
                "Formal",
                PromptPatch {
                    name: Some("Business".to_string()),
                    prompt: None,
                    description: Some(None),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Business");
        assert!(updated.description.is_none());
        assert!(updated.updated_at >= updated.created_at);
        assert!(m.get("Formal").is_none());
    }

    #[test]
    fn test_update_rejects_rename_to_existing() {
        let mut m = manager();
        let err = m
            .update(
                "Formal",
                PromptPatch {
                    name: Some("concise".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, PromptError::DuplicateName(_)));
    }

    #[test]
    fn test_remove_keeps_at_least_one() {
        let mut m = manager();
        let names: Vec<String> = m.list().iter().map(|p| p.name.clone()).collect();
        for name in &names[1..] {
            m.remove(name).unwrap();
        }
        assert_eq!(m.len(), 1);
        assert!(matches!(
            m.remove(&names[0]).unwrap_err(),
            PromptError::LastPrompt(_)
        ));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_from_stored_drops_invalid_and_duplicates() {
        let a = NamePromptPair::new("One", "p", None);
        let b = NamePromptPair::new("one", "q", None);
        let mut c = NamePromptPair::new("Two", "r", None);
        c.prompt = String::new();
        let m = PromptManager::from_stored(vec![a, b, c]);
        assert_eq!(m.len(), 1);
        assert_eq!(m.list()[0].name, "One");
    }

    #[test]
    fn test_import_skips_existing_names() {
        let mut m = manager();
        let json = r#"[
            {"name": "Grammar", "prompt": "dup"},
            {"name": "Academic", "prompt": "Use an academic register.", "description": "papers"}
        ]"#;
        assert_eq!(m.import_json(json).unwrap(), 1);
        assert!(m.get("academic").is_some());
        assert!(matches!(m.import_json("{"), Err(PromptError::Import(_))));
    }

    #[test]
    fn test_export_roundtrips_through_serde() {
        let m = manager();
        let json = m.export_json().unwrap();
        let back: Vec<NamePromptPair> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m.list());
        assert!(json.contains("createdAt"));
    }

    #[test]
    fn test_failed_import_changes_nothing() {
        let mut prompts = manager();
        let before = prompts.list().to_vec();
        let json = r#"[
            {"name": "Academic", "prompt": "Use an academic register."},
            {"name": "Bad", "prompt": "  "}
        ]"#;
        let err = prompts.import_json(json).unwrap_err();
        assert!(matches!(err, PromptError::Import(_)));
        assert_eq!(prompts.list(), before.as_slice());
        assert!(prompts.get("Academic").is_none());
    }

    #[test]
    fn test_names_compare_case_insensitively_beyond_ascii() {
        let mut prompts = manager();
        prompts.add("Ärger", "Sound annoyed.", None).unwrap();
        assert!(matches!(
            prompts.add(" ärger ", "Sound annoyed again.", None),
            Err(PromptError::DuplicateName(_))
        ));
        assert!(prompts.get("ÄRGER").is_some());
    }
}
