use serde::{Deserialize, Serialize};

/// One way to reach the site owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Editing handle for the list; never stored.
    #[serde(skip)]
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Contact {
    pub fn new(id: u64, kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            value: value.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.kind.trim().is_empty() && !self.value.trim().is_empty()
    }
}

/// The "about" document. Saved whole; absent fields stay absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl Profile {
    pub const COLLECTION: &'static str = "profile";
    pub const DOCUMENT: &'static str = "main";

    /// Drop contacts missing a type or value before a save.
    pub fn sanitized(mut self) -> Self {
        self.contacts.retain(Contact::is_complete);
        self.renumber();
        self
    }

    /// Assign fresh local handles, e.g. after loading from the store.
    pub fn renumber(&mut self) {
        for (i, contact) in self.contacts.iter_mut().enumerate() {
            contact.id = i as u64 + 1;
        }
    }
}
