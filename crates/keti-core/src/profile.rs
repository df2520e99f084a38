//! Profiles: the people who own subjects and sign in to the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Maximum length of a display name, in characters.
pub const NAME_MAX_CHARS: usize = 100;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  #[default]
  User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub user_id:     Uuid,
  pub email:       String,
  pub name:        Option<String>,
  #[serde(default)]
  pub role:        Role,
  pub avatar_path: Option<String>,
  pub created_at:  DateTime<Utc>,
}

impl Profile {
  /// The name to show, falling back to the email address.
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.email)
  }

  pub fn validate(&self) -> Result<()> {
    validate_email(&self.email)?;
    validate_name(self.name.as_deref())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
  /// Generated by the store when absent.
  #[serde(default)]
  pub user_id:     Option<Uuid>,
  pub email:       String,
  #[serde(default)]
  pub name:        Option<String>,
  #[serde(default)]
  pub role:        Role,
  #[serde(default)]
  pub avatar_path: Option<String>,
}

impl NewProfile {
  pub fn validate(&self) -> Result<()> {
    validate_email(&self.email)?;
    validate_name(self.name.as_deref())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:       Option<String>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub name:        Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role:        Option<Role>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub avatar_path: Option<Option<String>>,
}

impl ProfilePatch {
  pub fn apply_to(&self, profile: &mut Profile) {
    if let Some(email) = &self.email {
      profile.email = email.clone();
    }
    if let Some(name) = &self.name {
      profile.name = name.clone();
    }
    if let Some(role) = self.role {
      profile.role = role;
    }
    if let Some(avatar) = &self.avatar_path {
      profile.avatar_path = avatar.clone();
    }
  }
}

fn validate_email(email: &str) -> Result<()> {
  let email = email.trim();
  match email.split_once('@') {
    Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
    _ => Err(Error::invalid("email", format!("{email:?} is not an address"))),
  }
}

fn validate_name(name: Option<&str>) -> Result<()> {
  match name {
    Some(n) if n.chars().count() > NAME_MAX_CHARS => Err(Error::invalid(
      "name",
      format!("must be at most {NAME_MAX_CHARS} characters"),
    )),
    _ => Ok(()),
  }
}
