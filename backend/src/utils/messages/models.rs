use super::errors::MessageError;
use crate::modules::{
    database::{from_db_timestamp, is_storable},
    sanitizer::HtmlSanitizer,
};
use crate::utils::tags::models::Tag;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

/// Keys of the `message` object a write request must carry at least one of.
pub const RECOGNIZED_KEYS: [&str; 5] = ["content", "level", "begins", "expires", "tags"];

#[derive(
    Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[serde(into = "i32")]
#[repr(i32)]
pub enum Level {
    #[default]
    Info = 20,
    Success = 25,
    Warning = 30,
    Danger = 40,
}

impl Level {
    pub fn from_code(code: i64) -> Result<Self, MessageError> {
        match code {
            20 => Ok(Self::Info),
            25 => Ok(Self::Success),
            30 => Ok(Self::Warning),
            40 => Ok(Self::Danger),
            other => Err(MessageError::InvalidLevel(other)),
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Success => "Success",
            Self::Warning => "Warning",
            Self::Danger => "Danger",
        }
    }
}

impl From<Level> for i32 {
    fn from(level: Level) -> Self {
        level.code()
    }
}

/// Half-open window check: `begins <= now < expires`, open-ended without `expires`.
pub fn is_active(begins: OffsetDateTime, expires: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    begins <= now && expires.map_or(true, |expires| now < expires)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub level: Level,
    pub begins: OffsetDateTime,
    pub expires: Option<OffsetDateTime>,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
    pub modified_by: String,
    pub tags: Vec<Tag>,
}

impl Message {
    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        is_active(self.begins, self.expires, now)
    }

    pub fn view(&self, now: OffsetDateTime) -> MessageView {
        MessageView {
            id: self.id,
            content: self.content.clone(),
            level: self.level,
            level_name: self.level.name(),
            begins: self.begins,
            expires: self.expires,
            created: self.created,
            modified: self.modified,
            modified_by: self.modified_by.clone(),
            tags: self.tags.clone(),
            is_active: self.is_active(now),
        }
    }
}

/// JSON shape of a message.
#[derive(Serialize, Debug, Clone)]
pub struct MessageView {
    pub id: i64,
    pub content: String,
    pub level: Level,
    pub level_name: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub begins: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
    pub modified_by: String,
    pub tags: Vec<Tag>,
    pub is_active: bool,
}

#[derive(sqlx::FromRow, Debug)]
pub(crate) struct MessageRow {
    pub id: i64,
    pub content: String,
    pub level: Level,
    pub begins: i64,
    pub expires: Option<i64>,
    pub created: i64,
    pub modified: i64,
    pub modified_by: String,
}

impl MessageRow {
    pub fn into_message(self, tags: Vec<Tag>) -> anyhow::Result<Message> {
        Ok(Message {
            id: self.id,
            content: self.content,
            level: self.level,
            begins: from_db_timestamp(self.begins)?,
            expires: self.expires.map(from_db_timestamp).transpose()?,
            created: from_db_timestamp(self.created)?,
            modified: from_db_timestamp(self.modified)?,
            modified_by: self.modified_by,
            tags,
        })
    }
}

/// Proposed field values of a message before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDraft {
    pub content: String,
    pub level: Level,
    pub begins: Option<OffsetDateTime>,
    pub expires: Option<OffsetDateTime>,
}

impl MessageDraft {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ..Default::default()
        }
    }

    /// Sanitizes content, defaults `begins` to `now` and checks the window.
    pub fn clean(
        self,
        sanitizer: &HtmlSanitizer,
        now: OffsetDateTime,
    ) -> Result<CleanMessage, MessageError> {
        let content = sanitizer.clean(&self.content);
        let begins = self.begins.unwrap_or(now);

        for value in std::iter::once(begins).chain(self.expires) {
            if !is_storable(value) {
                let shown = value.format(&Rfc3339).unwrap_or_else(|_| value.to_string());
                return Err(MessageError::InvalidTimestamp(shown));
            }
        }

        if let Some(expires) = self.expires {
            if expires <= begins {
                return Err(MessageError::InvalidExpires);
            }
        }

        Ok(CleanMessage {
            content,
            level: self.level,
            begins,
            expires: self.expires,
        })
    }
}

impl From<&Message> for MessageDraft {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            level: message.level,
            begins: Some(message.begins),
            expires: message.expires,
        }
    }
}

/// A draft that passed validation and may be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanMessage {
    pub content: String,
    pub level: Level,
    pub begins: OffsetDateTime,
    pub expires: Option<OffsetDateTime>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TagRef {
    Name(String),
    Object { name: String },
}

impl TagRef {
    pub fn into_name(self) -> String {
        match self {
            TagRef::Name(name) | TagRef::Object { name } => name,
        }
    }
}

/// Sparse update: `None` leaves a field alone, `Some(None)` clears a nullable one.
/// `content`, `level` and `tags` are not nullable, so an explicit `null` fails to parse.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct MessagePatch {
    #[serde(default, deserialize_with = "non_null")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub level: Option<i64>,
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub begins: Option<Option<OffsetDateTime>>,
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub expires: Option<Option<OffsetDateTime>>,
    #[serde(default, deserialize_with = "non_null")]
    pub tags: Option<Vec<TagRef>>,
}

impl MessagePatch {
    /// Parses a `{"message": {...}}` request body. Bytes that are not UTF-8 are malformed too.
    pub fn from_body(body: impl AsRef<[u8]>) -> Result<Self, MessageError> {
        let body = body.as_ref();
        let malformed =
            || MessageError::MalformedRequest(String::from_utf8_lossy(body).into_owned());

        let payload: Value = serde_json::from_slice(body).map_err(|_| malformed())?;
        let message = payload
            .get("message")
            .filter(|message| message.is_object())
            .ok_or_else(malformed)?;

        if !RECOGNIZED_KEYS.iter().any(|key| message.get(key).is_some()) {
            return Err(malformed());
        }

        serde_json::from_value(message.clone()).map_err(|_| malformed())
    }

    /// Writes the present fields into `draft` and hands back the tag names, if any were sent.
    pub fn apply(self, draft: &mut MessageDraft) -> Result<Option<Vec<String>>, MessageError> {
        if let Some(content) = self.content {
            draft.content = content;
        }
        if let Some(code) = self.level {
            draft.level = Level::from_code(code)?;
        }
        if let Some(begins) = self.begins {
            draft.begins = begins;
        }
        if let Some(expires) = self.expires {
            draft.expires = expires;
        }

        Ok(self
            .tags
            .map(|tags| tags.into_iter().map(TagRef::into_name).collect()))
    }
}

fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn nullable_timestamp<'de, D>(deserializer: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Some(None)),
        Some(value) => OffsetDateTime::parse(value, &Rfc3339)
            .map(|parsed| Some(Some(parsed.to_offset(UtcOffset::UTC))))
            .map_err(de::Error::custom),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ActiveFilter {
    pub level: Option<Level>,
    pub tags: Vec<String>,
}

/// Query string of the active messages endpoint: `?level=30&tags=seattle,tacoma`.
#[derive(Deserialize, Debug, Default)]
pub struct ActiveQuery {
    pub level: Option<i64>,
    pub tags: Option<String>,
}

impl TryFrom<ActiveQuery> for ActiveFilter {
    type Error = MessageError;

    fn try_from(query: ActiveQuery) -> Result<Self, Self::Error> {
        let level = query.level.map(Level::from_code).transpose()?;
        let tags = query
            .tags
            .map(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { level, tags })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, Duration};

    fn message(begins: OffsetDateTime, expires: Option<OffsetDateTime>) -> Message {
        Message {
            id: 1,
            content: "Hello World!".into(),
            level: Level::Info,
            begins,
            expires,
            created: begins,
            modified: begins,
            modified_by: "manager".into(),
            tags: vec![],
        }
    }

    #[test]
    fn active_inside_window() {
        let m = message(
            datetime!(2018-01-01 10:10:10 UTC),
            Some(datetime!(2018-01-08 10:10:10 UTC)),
        );
        assert!(m.is_active(datetime!(2018-01-05 00:00:00 UTC)));
        assert!(!m.is_active(datetime!(2018-02-01 00:00:00 UTC)));
    }

    #[test]
    fn window_is_half_open() {
        let begins = datetime!(2018-01-01 10:10:10 UTC);
        let expires = datetime!(2018-01-08 10:10:10 UTC);
        assert!(is_active(begins, Some(expires), begins));
        assert!(!is_active(begins, Some(expires), expires));
        assert!(!is_active(begins, Some(expires), begins - Duration::nanoseconds(1)));
    }

    #[test]
    fn open_ended_message_stays_active() {
        let begins = datetime!(2018-01-01 10:10:10 UTC);
        assert!(is_active(begins, None, begins + Duration::days(3650)));
        assert!(!is_active(begins, None, begins - Duration::days(1)));
    }

    #[test]
    fn expiry_is_final() {
        let begins = datetime!(2018-01-01 10:10:10 UTC);
        let expires = begins + Duration::days(7);
        let mut seen_expired = false;
        for hours in 0..24 * 20 {
            let now = begins + Duration::hours(hours);
            let active = is_active(begins, Some(expires), now);
            if now >= expires {
                seen_expired = true;
            }
            if seen_expired {
                assert!(!active, "active again at {now}");
            }
        }
        assert!(seen_expired);
    }

    #[test]
    fn level_codes() {
        assert_eq!(Level::default(), Level::Info);
        assert_eq!(Level::from_code(30).unwrap(), Level::Warning);
        assert_eq!(Level::Danger.code(), 40);
        assert_eq!(Level::Success.name(), "Success");
        assert!(Level::Danger > Level::Warning);
        match Level::from_code(99) {
            Err(MessageError::InvalidLevel(99)) => (),
            res => panic!("Test result is {:?}", res),
        }
    }

    #[test]
    fn clean_defaults_begins_to_now() {
        let now = datetime!(2018-01-01 10:10:10 UTC);
        let clean = MessageDraft::new("Hello World!")
            .clean(&HtmlSanitizer::new(), now)
            .unwrap();
        assert_eq!(clean.begins, now);
        assert_eq!(clean.expires, None);
        assert_eq!(clean.level, Level::Info);
        assert_eq!(clean.content, "Hello World!");
    }

    #[test]
    fn clean_rejects_expires_before_begins() {
        let now = datetime!(2018-01-01 10:10:10 UTC);
        for expires in [now, now - Duration::days(7)] {
            let draft = MessageDraft {
                expires: Some(expires),
                ..MessageDraft::new("")
            };
            match draft.clean(&HtmlSanitizer::new(), now) {
                Err(MessageError::InvalidExpires) => (),
                res => panic!("Test result is {:?}", res),
            }
        }
    }

    #[test]
    fn clean_rejects_unstorable_timestamps() {
        let now = datetime!(2018-01-01 10:10:10 UTC);
        let drafts = [
            MessageDraft {
                begins: Some(datetime!(2300-01-01 00:00:00 UTC)),
                ..MessageDraft::new("")
            },
            MessageDraft {
                expires: Some(datetime!(2300-01-01 00:00:00 UTC)),
                ..MessageDraft::new("")
            },
        ];
        for draft in drafts {
            match draft.clean(&HtmlSanitizer::new(), now) {
                Err(MessageError::InvalidTimestamp(shown)) => {
                    assert_eq!(shown, "2300-01-01T00:00:00Z")
                }
                res => panic!("Test result is {:?}", res),
            }
        }
    }

    #[test]
    fn clean_escapes_script() {
        let now = datetime!(2018-01-01 10:10:10 UTC);
        let clean = MessageDraft::new("<script>x</script>")
            .clean(&HtmlSanitizer::new(), now)
            .unwrap();
        assert_eq!(clean.content, "&lt;script&gt;x&lt;/script&gt;");
    }

    #[test]
    fn body_without_recognized_keys_is_malformed() {
        for body in ["", "not json", "{}", r#"{"message": {}}"#, r#"{"message": "x"}"#, r#"{"message": {"id": 4}}"#] {
            match MessagePatch::from_body(body) {
                Err(MessageError::MalformedRequest(raw)) => assert_eq!(raw, body),
                res => panic!("Test result for {body:?} is {:?}", res),
            }
        }
    }

    #[test]
    fn null_for_required_fields_is_malformed() {
        for body in [
            r#"{"message": {"content": null}}"#,
            r#"{"message": {"level": null}}"#,
            r#"{"message": {"tags": null}}"#,
            r#"{"message": {"content": 5}}"#,
        ] {
            match MessagePatch::from_body(body) {
                Err(MessageError::MalformedRequest(raw)) => assert_eq!(raw, body),
                res => panic!("Test result for {body:?} is {:?}", res),
            }
        }
    }

    #[test]
    fn non_utf8_body_is_malformed() {
        match MessagePatch::from_body(b"{\"message\": {\"content\": \"\xff\"}}") {
            Err(MessageError::MalformedRequest(raw)) => assert!(raw.contains('\u{fffd}')),
            res => panic!("Test result is {:?}", res),
        }
    }

    #[test]
    fn unparseable_timestamp_is_malformed() {
        let body = r#"{"message": {"begins": "next tuesday"}}"#;
        match MessagePatch::from_body(body) {
            Err(MessageError::MalformedRequest(_)) => (),
            res => panic!("Test result is {:?}", res),
        }
    }

    #[test]
    fn patch_distinguishes_absent_and_null() {
        let patch = MessagePatch::from_body(
            r#"{"message": {"content": "abc", "expires": null, "begins": "2018-01-01T10:10:10Z"}}"#,
        )
        .unwrap();
        assert_eq!(patch.content.as_deref(), Some("abc"));
        assert_eq!(patch.level, None);
        assert_eq!(patch.begins, Some(Some(datetime!(2018-01-01 10:10:10 UTC))));
        assert_eq!(patch.expires, Some(None));
        assert_eq!(patch.tags, None);
    }

    #[test]
    fn patch_normalizes_offsets_to_utc() {
        let patch =
            MessagePatch::from_body(r#"{"message": {"begins": "2018-01-01T12:10:10+02:00"}}"#)
                .unwrap();
        let begins = patch.begins.flatten().unwrap();
        assert_eq!(begins, datetime!(2018-01-01 10:10:10 UTC));
        assert_eq!(begins.offset(), UtcOffset::UTC);
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let begins = datetime!(2018-01-01 10:10:10 UTC);
        let mut draft = MessageDraft {
            content: "old".into(),
            level: Level::Warning,
            begins: Some(begins),
            expires: Some(begins + Duration::days(1)),
        };
        let patch = MessagePatch::from_body(r#"{"message": {"content": "new"}}"#).unwrap();
        assert_eq!(patch.apply(&mut draft).unwrap(), None);
        assert_eq!(draft.content, "new");
        assert_eq!(draft.level, Level::Warning);
        assert_eq!(draft.begins, Some(begins));
        assert_eq!(draft.expires, Some(begins + Duration::days(1)));
    }

    #[test]
    fn patch_accepts_tag_names_and_objects() {
        let patch = MessagePatch::from_body(
            r#"{"message": {"tags": ["seattle", {"id": 4, "name": "tacoma", "group": "Cities"}]}}"#,
        )
        .unwrap();
        let tags = patch.apply(&mut MessageDraft::default()).unwrap();
        assert_eq!(tags, Some(vec!["seattle".to_string(), "tacoma".to_string()]));
    }

    #[test]
    fn patch_with_empty_tags_clears() {
        let patch = MessagePatch::from_body(r#"{"message": {"tags": []}}"#).unwrap();
        assert_eq!(patch.apply(&mut MessageDraft::default()).unwrap(), Some(vec![]));
    }

    #[test]
    fn patch_rejects_unknown_level() {
        let patch = MessagePatch::from_body(r#"{"message": {"level": 35}}"#).unwrap();
        match patch.apply(&mut MessageDraft::default()) {
            Err(MessageError::InvalidLevel(35)) => (),
            res => panic!("Test result is {:?}", res),
        }
    }

    #[test]
    fn serialized_message_parses_back() {
        let begins = datetime!(2018-01-01 10:10:10 UTC);
        let mut original = message(begins, Some(begins + Duration::days(7)));
        original.level = Level::Danger;
        original.content = "<p>Hello <b>World</b></p>".into();
        original.tags = vec![Tag {
            id: 3,
            name: "seattle".into(),
            group: "Cities".into(),
        }];

        let body = serde_json::json!({ "message": original.view(begins) }).to_string();
        let mut draft = MessageDraft::default();
        let tags = MessagePatch::from_body(&body)
            .unwrap()
            .apply(&mut draft)
            .unwrap();

        assert_eq!(draft, MessageDraft::from(&original));
        assert_eq!(tags, Some(vec!["seattle".to_string()]));
    }

    #[test]
    fn view_shape() {
        let begins = datetime!(2018-01-01 10:10:10 UTC);
        let value = serde_json::to_value(message(begins, None).view(begins)).unwrap();
        assert_eq!(value["level"], 20);
        assert_eq!(value["level_name"], "Info");
        assert_eq!(value["begins"], "2018-01-01T10:10:10Z");
        assert_eq!(value["expires"], Value::Null);
        assert_eq!(value["modified_by"], "manager");
        assert_eq!(value["tags"], serde_json::json!([]));
        assert_eq!(value["is_active"], true);
    }

    #[test]
    fn active_query_splits_tags() {
        let filter = ActiveFilter::try_from(ActiveQuery {
            level: Some(30),
            tags: Some("seattle, tacoma,,".into()),
        })
        .unwrap();
        assert_eq!(filter.level, Some(Level::Warning));
        assert_eq!(filter.tags, vec!["seattle".to_string(), "tacoma".to_string()]);
    }
}
