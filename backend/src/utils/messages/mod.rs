pub mod errors;
pub mod models;

use crate::modules::{database::to_db_timestamp, sanitizer::HtmlSanitizer};
use crate::utils::tags::{fetch_tags_for_messages, replace_message_tags, resolve_tags};
use anyhow::Context;
use errors::MessageError;
use models::{ActiveFilter, Message, MessageDraft, MessagePatch, MessageRow};
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use tracing::info;

const MESSAGE_COLUMNS: &str =
    "m.id, m.content, m.level, m.begins, m.expires, m.created, m.modified, m.modified_by";

async fn attach_tags(
    conn: &mut SqliteConnection,
    rows: Vec<MessageRow>,
) -> Result<Vec<Message>, MessageError> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut tags = fetch_tags_for_messages(conn, &ids).await?;

    let messages = rows
        .into_iter()
        .map(|row| {
            let message_tags = tags.remove(&row.id).unwrap_or_default();
            row.into_message(message_tags)
        })
        .collect::<anyhow::Result<Vec<Message>>>()?;

    Ok(messages)
}

async fn select_message(
    conn: &mut SqliteConnection,
    message_id: i64,
) -> Result<Option<Message>, MessageError> {
    let row = query_as::<_, MessageRow>(&format!(
        "select {MESSAGE_COLUMNS} from messages m where m.id = ?"
    ))
    .bind(message_id)
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to select message by id")?;

    match row {
        Some(row) => Ok(attach_tags(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn fetch_message(pool: &SqlitePool, message_id: i64) -> Result<Message, MessageError> {
    let mut conn = pool
        .acquire()
        .await
        .context("Failed to establish connection")?;

    select_message(&mut conn, message_id)
        .await?
        .ok_or(MessageError::NotFound(message_id))
}

/// Validates and stores a new message together with its tags, in one transaction.
pub async fn create_message(
    pool: &SqlitePool,
    sanitizer: &HtmlSanitizer,
    now: OffsetDateTime,
    draft: MessageDraft,
    tag_names: Option<Vec<String>>,
    modified_by: &str,
) -> Result<Message, MessageError> {
    let mut transaction = pool.begin().await.context("Failed to begin transaction")?;

    let tags = match tag_names {
        Some(names) => Some(resolve_tags(&mut transaction, &names).await?),
        None => None,
    };
    let message = draft.clean(sanitizer, now)?;

    let message_id = query(
        r#"
            insert into messages (content, level, begins, expires, created, modified, modified_by)
            values (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.content)
    .bind(message.level)
    .bind(to_db_timestamp(message.begins)?)
    .bind(message.expires.map(to_db_timestamp).transpose()?)
    .bind(to_db_timestamp(now)?)
    .bind(to_db_timestamp(now)?)
    .bind(modified_by)
    .execute(&mut *transaction)
    .await
    .context("Failed to create a message")?
    .last_insert_rowid();

    if let Some(tags) = tags {
        replace_message_tags(&mut transaction, message_id, &tags).await?;
    }

    let created = select_message(&mut transaction, message_id)
        .await?
        .context("Created message vanished")?;

    transaction
        .commit()
        .await
        .context("Failed to commit transaction")?;

    info!("Message ({message_id}) created");
    Ok(created)
}

/// Applies a sparse patch. Tags, when present, replace the whole association set.
pub async fn update_message(
    pool: &SqlitePool,
    sanitizer: &HtmlSanitizer,
    now: OffsetDateTime,
    message_id: i64,
    patch: MessagePatch,
    modified_by: &str,
) -> Result<Message, MessageError> {
    let mut transaction = pool.begin().await.context("Failed to begin transaction")?;

    let current = select_message(&mut transaction, message_id)
        .await?
        .ok_or(MessageError::NotFound(message_id))?;

    let mut draft = MessageDraft::from(&current);
    let tag_names = patch.apply(&mut draft)?;
    let tags = match tag_names {
        Some(names) => Some(resolve_tags(&mut transaction, &names).await?),
        None => None,
    };
    let message = draft.clean(sanitizer, now)?;

    query(
        r#"
            update messages
            set content = ?, level = ?, begins = ?, expires = ?, modified = ?, modified_by = ?
            where id = ?
        "#,
    )
    .bind(&message.content)
    .bind(message.level)
    .bind(to_db_timestamp(message.begins)?)
    .bind(message.expires.map(to_db_timestamp).transpose()?)
    .bind(to_db_timestamp(now)?)
    .bind(modified_by)
    .bind(message_id)
    .execute(&mut *transaction)
    .await
    .context("Failed to update message")?;

    if let Some(tags) = tags {
        replace_message_tags(&mut transaction, message_id, &tags).await?;
    }

    let updated = select_message(&mut transaction, message_id)
        .await?
        .context("Updated message vanished")?;

    transaction
        .commit()
        .await
        .context("Failed to commit transaction")?;

    info!("Message ({message_id}) updated");
    Ok(updated)
}

pub async fn delete_message(pool: &SqlitePool, message_id: i64) -> Result<(), MessageError> {
    let mut transaction = pool.begin().await.context("Failed to begin transaction")?;

    query("delete from message_tags where message_id = ?")
        .bind(message_id)
        .execute(&mut *transaction)
        .await
        .context("Failed to delete message tags")?;

    let res = query("delete from messages where id = ?")
        .bind(message_id)
        .execute(&mut *transaction)
        .await
        .context("Failed to delete message")?;

    if res.rows_affected() == 0 {
        return Err(MessageError::NotFound(message_id));
    }

    transaction
        .commit()
        .await
        .context("Failed to commit transaction")?;

    info!("Message ({message_id}) deleted");
    Ok(())
}

/// Messages whose window contains `now`, filtered by level and any-of tags,
/// highest level first, then most recent `begins`.
pub async fn active_messages(
    pool: &SqlitePool,
    now: OffsetDateTime,
    filter: &ActiveFilter,
) -> Result<Vec<Message>, MessageError> {
    let now = to_db_timestamp(now)?;

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("select distinct {MESSAGE_COLUMNS} from messages m"));
    if !filter.tags.is_empty() {
        builder.push(
            " join message_tags mt on mt.message_id = m.id join tags t on t.id = mt.tag_id",
        );
    }

    builder
        .push(" where m.begins <= ")
        .push_bind(now)
        .push(" and (m.expires is null or m.expires > ")
        .push_bind(now)
        .push(")");

    if let Some(level) = filter.level {
        builder.push(" and m.level = ").push_bind(level);
    }

    if !filter.tags.is_empty() {
        builder.push(" and t.name in (");
        let mut names = builder.separated(", ");
        for name in &filter.tags {
            names.push_bind(name.clone());
        }
        names.push_unseparated(")");
    }

    builder.push(" order by m.level desc, m.begins desc, m.id desc");

    let mut conn = pool
        .acquire()
        .await
        .context("Failed to establish connection")?;

    let rows = builder
        .build_query_as::<MessageRow>()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to select active messages")?;

    attach_tags(&mut conn, rows).await
}

/// Every message, active ones first, most recently modified first within each bucket.
pub async fn list_for_admin(
    pool: &SqlitePool,
    now: OffsetDateTime,
) -> Result<Vec<Message>, MessageError> {
    let mut conn = pool
        .acquire()
        .await
        .context("Failed to establish connection")?;

    let rows = query_as::<_, MessageRow>(&format!("select {MESSAGE_COLUMNS} from messages m"))
        .fetch_all(&mut *conn)
        .await
        .context("Failed to select messages")?;

    let mut messages = attach_tags(&mut conn, rows).await?;
    messages.sort_by(|a, b| {
        (b.is_active(now), b.modified, b.id).cmp(&(a.is_active(now), a.modified, a.id))
    });

    Ok(messages)
}
