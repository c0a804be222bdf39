use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::trip::Trip;

pub const DEFAULT_PROFILE_NAME: &str = "Default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub trips: Vec<Trip>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            trips: vec![],
        }
    }

    fn matches(&self, selector: &str) -> bool {
        self.id == selector || self.name.eq_ignore_ascii_case(selector.trim())
    }
}

/// Every profile plus the one currently selected.
///
/// Never empty; the active index always points at an existing profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredBook", into = "StoredBook")]
pub struct ProfileBook {
    profiles: Vec<Profile>,
    active: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredBook {
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    active_profile_id: Option<String>,
}

impl From<StoredBook> for ProfileBook {
    fn from(stored: StoredBook) -> Self {
        if stored.profiles.is_empty() {
            warn!("stored profile book was empty; seeding default profile");
            return Self::default();
        }

        let active = match stored.active_profile_id.as_deref() {
            Some(id) => stored.profiles.iter().position(|p| p.id == id).unwrap_or_else(|| {
                warn!(active = %id, "active profile id not found; selecting first profile");
                0
            }),
            None => 0,
        };

        Self {
            profiles: stored.profiles,
            active,
        }
    }
}

impl From<ProfileBook> for StoredBook {
    fn from(book: ProfileBook) -> Self {
        let active_profile_id = Some(book.active().id.clone());
        Self {
            profiles: book.profiles,
            active_profile_id,
        }
    }
}

impl Default for ProfileBook {
    fn default() -> Self {
        Self {
            profiles: vec![Profile::new(DEFAULT_PROFILE_NAME)],
            active: 0,
        }
    }
}

impl ProfileBook {
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn active(&self) -> &Profile {
        &self.profiles[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Profile {
        &mut self.profiles[self.active]
    }

    pub fn is_active(&self, profile: &Profile) -> bool {
        self.active().id == profile.id
    }

    /// Looks a profile up by exact id or case-insensitive name.
    pub fn find(&self, selector: &str) -> Option<&Profile> {
        self.position(selector).map(|idx| &self.profiles[idx])
    }

    pub fn find_mut(&mut self, selector: &str) -> Option<&mut Profile> {
        self.position(selector).map(|idx| &mut self.profiles[idx])
    }

    fn position(&self, selector: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.matches(selector))
    }

    fn require(&self, selector: &str) -> anyhow::Result<usize> {
        self.position(selector)
            .ok_or_else(|| anyhow!("no profile named or identified by `{selector}`"))
    }

    fn check_name(&self, name: &str, except: Option<usize>) -> anyhow::Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("profile name cannot be empty"));
        }
        let clash = self
            .profiles
            .iter()
            .enumerate()
            .any(|(idx, p)| Some(idx) != except && p.name.eq_ignore_ascii_case(name));
        if clash {
            return Err(anyhow!("a profile named `{name}` already exists"));
        }
        Ok(name.to_string())
    }

    #[tracing::instrument(skip(self))]
    pub fn create(&mut self, name: &str) -> anyhow::Result<&Profile> {
        let name = self.check_name(name, None)?;
        self.profiles.push(Profile::new(name));
        let created = &self.profiles[self.profiles.len() - 1];
        info!(profile = %created.name, id = %created.id, "created profile");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    pub fn switch(&mut self, selector: &str) -> anyhow::Result<&Profile> {
        self.active = self.require(selector)?;
        let active = self.active();
        info!(profile = %active.name, "switched active profile");
        Ok(active)
    }

    #[tracing::instrument(skip(self))]
    pub fn rename(&mut self, selector: &str, new_name: &str) -> anyhow::Result<()> {
        let idx = self.require(selector)?;
        let name = self.check_name(new_name, Some(idx))?;
        info!(from = %self.profiles[idx].name, to = %name, "renamed profile");
        self.profiles[idx].name = name;
        Ok(())
    }

    /// Deletes a profile. The last remaining profile cannot be removed.
    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, selector: &str) -> anyhow::Result<Profile> {
        let idx = self.require(selector)?;
        if self.profiles.len() == 1 {
            return Err(anyhow!("cannot delete the only profile"));
        }

        let removed = self.profiles.remove(idx);
        if self.active == idx {
            self.active = 0;
        } else if self.active > idx {
            self.active -= 1;
        }
        info!(profile = %removed.name, active = %self.active().name, "deleted profile");
        Ok(removed)
    }

    /// Adds an imported profile, minting a new id on collision and
    /// suffixing the name until it is unique.
    #[tracing::instrument(skip(self, profile), fields(profile = %profile.name))]
    pub fn insert_imported(&mut self, mut profile: Profile) -> &Profile {
        if profile.id.trim().is_empty() || self.profiles.iter().any(|p| p.id == profile.id) {
            profile.id = Uuid::new_v4().to_string();
        }

        let base = match profile.name.trim() {
            "" => "Imported".to_string(),
            name => name.to_string(),
        };
        let mut name = base.clone();
        let mut n = 2;
        while self.check_name(&name, None).is_err() {
            name = format!("{base} ({n})");
            n += 1;
        }
        profile.name = name;

        self.profiles.push(profile);
        &self.profiles[self.profiles.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PROFILE_NAME, Profile, ProfileBook};

    #[test]
    fn default_book_has_one_active_profile() {
        let book = ProfileBook::default();
        assert_eq!(book.profiles().len(), 1);
        assert_eq!(book.active().name, DEFAULT_PROFILE_NAME);
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let mut book = ProfileBook::default();
        book.create("Alex").expect("create");
        assert!(book.create("alex").is_err());
        assert!(book.create("  ").is_err());
    }

    #[test]
    fn switch_by_name_or_id() {
        let mut book = ProfileBook::default();
        let id = book.create("Sam").expect("create").id.clone();
        book.switch("default").expect("switch by name");
        assert_eq!(book.active().name, DEFAULT_PROFILE_NAME);
        book.switch(&id).expect("switch by id");
        assert_eq!(book.active().name, "Sam");
        assert!(book.switch("nobody").is_err());
    }

    #[test]
    fn removing_active_profile_selects_first() {
        let mut book = ProfileBook::default();
        book.create("Sam").expect("create");
        book.switch("Sam").expect("switch");
        book.remove("Sam").expect("remove");
        assert_eq!(book.active().name, DEFAULT_PROFILE_NAME);
        assert!(book.remove(DEFAULT_PROFILE_NAME).is_err());
    }

    #[test]
    fn removing_earlier_profile_keeps_active() {
        let mut book = ProfileBook::default();
        book.create("Sam").expect("create");
        book.switch("Sam").expect("switch");
        book.remove(DEFAULT_PROFILE_NAME).expect("remove");
        assert_eq!(book.active().name, "Sam");
    }

    #[test]
    fn import_dedupes_id_and_name() {
        let mut book = ProfileBook::default();
        let mut copy = book.active().clone();
        copy.trips.clear();
        let original_id = copy.id.clone();
        let imported = book.insert_imported(copy);
        assert_ne!(imported.id, original_id);
        assert_eq!(imported.name, "Default (2)");
    }

    #[test]
    fn stored_form_round_trips_active_selection() {
        let mut book = ProfileBook::default();
        book.create("Sam").expect("create");
        book.switch("Sam").expect("switch");
        let json = serde_json::to_string(&book).expect("serialize");
        assert!(json.contains("activeProfileId"));
        let back: ProfileBook = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.active().name, "Sam");
    }

    #[test]
    fn unknown_active_id_falls_back_to_first() {
        let json = serde_json::json!({
            "profiles": [Profile::new("A"), Profile::new("B")],
            "activeProfileId": "missing"
        });
        let book: ProfileBook = serde_json::from_value(json).expect("deserialize");
        assert_eq!(book.active().name, "A");
    }

    #[test]
    fn empty_stored_book_is_seeded() {
        let book: ProfileBook = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(book.active().name, DEFAULT_PROFILE_NAME);
    }
}
