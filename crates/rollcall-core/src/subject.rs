//! Subjects: the courses a session takes attendance for.
//!
//! Subjects belong to the wider college directory. Rollcall only reads them
//! to populate the issuer's picker and to stamp descriptors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub id:         String,
  /// Display label, e.g. "Data Structures".
  pub name:       String,
  pub department: String,
  /// Year of study the subject is taught in.
  pub year:       u8,
}

/// Input to [`crate::store::SubjectDirectory::add_subject`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubject {
  pub id:         String,
  pub name:       String,
  pub department: String,
  pub year:       u8,
}

impl NewSubject {
  pub fn new(
    id: impl Into<String>,
    name: impl Into<String>,
    department: impl Into<String>,
    year: u8,
  ) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      department: department.into(),
      year,
    }
  }
}

impl From<NewSubject> for Subject {
  fn from(n: NewSubject) -> Self {
    Subject {
      id:         n.id,
      name:       n.name,
      department: n.department,
      year:       n.year,
    }
  }
}
