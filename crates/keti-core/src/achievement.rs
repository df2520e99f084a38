//! Achievements: outputs (papers, patents, reports) recorded against a
//! subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, subject::validate_title};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
  pub id:         i64,
  pub subject_id: i64,
  pub title:      String,
  /// Free-form category such as "paper" or "patent".
  pub kind:       Option<String>,
  pub doc_path:   Option<String>,
  pub pdf_path:   Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAchievement {
  pub subject_id: i64,
  pub title:      String,
  #[serde(default)]
  pub kind:       Option<String>,
  #[serde(default)]
  pub doc_path:   Option<String>,
  #[serde(default)]
  pub pdf_path:   Option<String>,
}

impl NewAchievement {
  pub fn validate(&self) -> Result<()> { validate_title(&self.title) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:    Option<String>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub kind:     Option<Option<String>>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub doc_path: Option<Option<String>>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub pdf_path: Option<Option<String>>,
}

impl AchievementPatch {
  pub fn apply_to(&self, achievement: &mut Achievement) {
    if let Some(title) = &self.title {
      achievement.title = title.clone();
    }
    if let Some(kind) = &self.kind {
      achievement.kind = kind.clone();
    }
    if let Some(doc) = &self.doc_path {
      achievement.doc_path = doc.clone();
    }
    if let Some(pdf) = &self.pdf_path {
      achievement.pdf_path = pdf.clone();
    }
  }
}

impl Achievement {
  pub fn validate(&self) -> Result<()> { validate_title(&self.title) }
}
