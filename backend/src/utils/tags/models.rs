use serde::{Deserialize, Serialize};

/// A tag as it appears inside messages and tag groups: `group` is the group's name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub group: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TagGroup {
    pub id: i64,
    pub name: String,
    pub tags: Vec<Tag>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct TagGroupRow {
    pub id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct TagRow {
    pub id: i64,
    pub name: String,
    pub group_name: String,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            group: row.group_name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct GroupedTagRow {
    pub group_id: i64,
    #[sqlx(flatten)]
    pub tag: TagRow,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageTagRow {
    pub message_id: i64,
    #[sqlx(flatten)]
    pub tag: TagRow,
}
