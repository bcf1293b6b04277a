pub mod errors;
pub mod models;

use anyhow::Context;
use errors::TagError;
use models::{GroupedTagRow, MessageTagRow, Tag, TagGroup, TagGroupRow, TagRow};
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// Looks every name up by exact match. The first unknown name fails the whole set.
pub async fn resolve_tags(
    conn: &mut SqliteConnection,
    names: &[String],
) -> Result<Vec<Tag>, TagError> {
    let mut tags: Vec<Tag> = Vec::with_capacity(names.len());

    for name in names {
        let tag: Tag = query_as::<_, TagRow>(
            r#"
                select t.id, t.name, g.name as group_name from tags t
                join tag_groups g on g.id = t.group_id
                where t.name = ?
            "#,
        )
        .bind(name.as_str())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to select tag by name")?
        .ok_or_else(|| TagError::InvalidTag(name.clone()))?
        .into();

        if tags.iter().all(|known| known.id != tag.id) {
            tags.push(tag);
        }
    }

    Ok(tags)
}

/// Clears the message's tag associations, then adds `tags`.
pub async fn replace_message_tags(
    conn: &mut SqliteConnection,
    message_id: i64,
    tags: &[Tag],
) -> Result<(), TagError> {
    query("delete from message_tags where message_id = ?")
        .bind(message_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear message tags")?;

    for tag in tags {
        query("insert into message_tags (message_id, tag_id) values (?, ?)")
            .bind(message_id)
            .bind(tag.id)
            .execute(&mut *conn)
            .await
            .context("Failed to add message tag")?;
    }

    Ok(())
}

pub async fn fetch_tags_for_messages(
    conn: &mut SqliteConnection,
    message_ids: &[i64],
) -> Result<HashMap<i64, Vec<Tag>>, TagError> {
    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    if message_ids.is_empty() {
        return Ok(tags);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
            select mt.message_id, t.id, t.name, g.name as group_name from message_tags mt
            join tags t on t.id = mt.tag_id
            join tag_groups g on g.id = t.group_id
            where mt.message_id in (
        "#,
    );
    let mut ids = builder.separated(", ");
    for id in message_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") order by t.id");

    let rows = builder
        .build_query_as::<MessageTagRow>()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to select message tags")?;

    for row in rows {
        tags.entry(row.message_id).or_default().push(row.tag.into());
    }

    Ok(tags)
}

pub async fn fetch_tag_groups(pool: &SqlitePool) -> Result<Vec<TagGroup>, TagError> {
    let groups = query_as::<_, TagGroupRow>("select id, name from tag_groups order by id")
        .fetch_all(pool)
        .await
        .context("Failed to select tag groups")?;

    let tags = query_as::<_, GroupedTagRow>(
        r#"
            select t.group_id, t.id, t.name, g.name as group_name from tags t
            join tag_groups g on g.id = t.group_id
            order by t.id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to select tags")?;

    let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in tags {
        grouped.entry(row.group_id).or_default().push(row.tag.into());
    }

    Ok(groups
        .into_iter()
        .map(|group| TagGroup {
            tags: grouped.remove(&group.id).unwrap_or_default(),
            id: group.id,
            name: group.name,
        })
        .collect())
}
