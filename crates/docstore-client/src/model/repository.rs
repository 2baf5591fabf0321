use docstore_core::RepositoryRow;

use crate::model::attribute::{AttrType, AttrValue};
use crate::model::entity::{Entity, EntityCore};

const ATTR_DESCRIPTION: &str = "description";

/// A named, identified document store; the unit a caller ultimately
/// connects to. Identity key is the backend's repository id.
#[derive(Debug)]
pub struct Repository {
    core: EntityCore,
}

impl Repository {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: &str) -> Self {
        let core = EntityCore::new(id, name);
        core.add_attr(
            ATTR_DESCRIPTION,
            AttrType::String,
            AttrValue::from(description),
        )
        .expect("fresh bag accepts the description slot");
        Self { core }
    }

    pub fn from_row(row: &RepositoryRow) -> Self {
        Self::new(&row.id, &row.name, &row.description)
    }

    pub fn description(&self) -> String {
        self.core
            .get_attr(ATTR_DESCRIPTION)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn set_description(&self, description: &str) {
        self.core
            .set_attr(ATTR_DESCRIPTION, AttrValue::from(description));
    }

    /// Re-sighting update: the backend is the source of truth, last write
    /// wins for both name and description.
    pub fn update_from_row(&self, row: &RepositoryRow) {
        self.set_name(&row.name);
        self.set_description(&row.description);
    }
}

impl Entity for Repository {
    fn core(&self) -> &EntityCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_name_and_description_attributes() {
        let repo = Repository::new("010f1", "docbase1", "Test");
        assert_eq!(repo.id(), "010f1");
        assert_eq!(repo.name(), "docbase1");
        assert_eq!(repo.description(), "Test");
        assert_eq!(repo.attr_names(), vec!["name", "description"]);
    }

    #[test]
    fn update_from_row_rewrites_in_place() {
        let repo = Repository::new("010f1", "docbase1", "Test");
        repo.update_from_row(&RepositoryRow {
            id: "010f1".into(),
            name: "docbase1_renamed".into(),
            description: "Renamed".into(),
        });
        assert_eq!(repo.name(), "docbase1_renamed");
        assert_eq!(repo.description(), "Renamed");
    }
}
