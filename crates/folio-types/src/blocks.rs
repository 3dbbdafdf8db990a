use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BlockError {
    #[error("unknown block type: {0}")]
    UnknownType(String),

    #[error("invalid block data: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Calendar,
    Image,
    Location,
    Link,
    Text,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Calendar => "calendar",
            BlockType::Image => "image",
            BlockType::Location => "location",
            BlockType::Link => "link",
            BlockType::Text => "text",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calendar" => Ok(BlockType::Calendar),
            "image" => Ok(BlockType::Image),
            "location" => Ok(BlockType::Location),
            "link" => Ok(BlockType::Link),
            "text" => Ok(BlockType::Text),
            other => Err(BlockError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalendarData {
    pub title: String,
    pub date: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Small => "small",
            ImageSize::Medium => "medium",
            ImageSize::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageData {
    pub image_url: String,
    pub size: ImageSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationData {
    pub address: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkData {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextData {
    pub content: String,
}

/// Typed payload of a profile block, tagged by its block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block_type", content = "data", rename_all = "snake_case")]
pub enum BlockPayload {
    Calendar(CalendarData),
    Image(ImageData),
    Location(LocationData),
    Link(LinkData),
    Text(TextData),
}

impl BlockPayload {
    /// Parse and validate a payload for the given block type tag.
    pub fn parse(block_type: &str, data: serde_json::Value) -> Result<Self, BlockError> {
        let kind: BlockType = block_type.parse()?;
        let payload = Self::from_value(kind, data)?;
        payload.validate()?;
        Ok(payload)
    }

    fn from_value(kind: BlockType, data: serde_json::Value) -> Result<Self, BlockError> {
        let invalid = |e: serde_json::Error| BlockError::InvalidPayload(e.to_string());
        let mut payload = match kind {
            BlockType::Calendar => BlockPayload::Calendar(serde_json::from_value(data).map_err(invalid)?),
            BlockType::Image => BlockPayload::Image(serde_json::from_value(data).map_err(invalid)?),
            BlockType::Location => BlockPayload::Location(serde_json::from_value(data).map_err(invalid)?),
            BlockType::Link => BlockPayload::Link(serde_json::from_value(data).map_err(invalid)?),
            BlockType::Text => BlockPayload::Text(serde_json::from_value(data).map_err(invalid)?),
        };
        // An empty date input means "no date"
        if let BlockPayload::Calendar(c) = &mut payload {
            if c.date.as_deref().is_some_and(|d| d.trim().is_empty()) {
                c.date = None;
            }
        }
        Ok(payload)
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            BlockPayload::Calendar(_) => BlockType::Calendar,
            BlockPayload::Image(_) => BlockType::Image,
            BlockPayload::Location(_) => BlockType::Location,
            BlockPayload::Link(_) => BlockType::Link,
            BlockPayload::Text(_) => BlockType::Text,
        }
    }

    /// The payload without its tag, as stored in `profile_blocks.data`.
    pub fn data(&self) -> serde_json::Value {
        let value = match self {
            BlockPayload::Calendar(d) => serde_json::to_value(d),
            BlockPayload::Image(d) => serde_json::to_value(d),
            BlockPayload::Location(d) => serde_json::to_value(d),
            BlockPayload::Link(d) => serde_json::to_value(d),
            BlockPayload::Text(d) => serde_json::to_value(d),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    pub fn validate(&self) -> Result<(), BlockError> {
        match self {
            BlockPayload::Calendar(c) => {
                check_len("title", &c.title, 120)?;
                check_len("description", &c.description, 1000)?;
                if let Some(date) = &c.date {
                    NaiveDate::parse_from_str(date, "%Y-%m-%d")
                        .map_err(|_| BlockError::Invalid(format!("date must be YYYY-MM-DD, got {date:?}")))?;
                }
            }
            BlockPayload::Image(i) => {
                if !i.image_url.is_empty() && !is_image_url(&i.image_url) {
                    return Err(BlockError::Invalid("imageUrl must be an http(s) or /uploads/ URL".into()));
                }
                if let Some(alt) = &i.alt {
                    check_len("alt", alt, 200)?;
                }
            }
            BlockPayload::Location(l) => {
                check_len("address", &l.address, 200)?;
                check_len("city", &l.city, 100)?;
                check_len("country", &l.country, 100)?;
            }
            BlockPayload::Link(l) => {
                if !l.url.is_empty() && !is_link_url(&l.url) {
                    return Err(BlockError::Invalid("url must be http(s) or mailto".into()));
                }
                check_len("title", &l.title, 120)?;
            }
            BlockPayload::Text(t) => check_len("content", &t.content, 2000)?,
        }
        Ok(())
    }

    /// Text shown in read mode when the fields a block needs are absent.
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            BlockPayload::Calendar(c) if c.date.is_none() => Some("No event set"),
            BlockPayload::Image(i) if i.image_url.is_empty() => Some("No image set"),
            BlockPayload::Location(l)
                if l.address.trim().is_empty() && l.city.trim().is_empty() && l.country.trim().is_empty() =>
            {
                Some("No location set")
            }
            BlockPayload::Link(l) if l.url.is_empty() => Some("No link set"),
            BlockPayload::Text(t) if t.content.trim().is_empty() => Some("Nothing here yet"),
            _ => None,
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), BlockError> {
    if value.chars().count() > max {
        return Err(BlockError::Invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

fn is_image_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://") || url.starts_with("/uploads/")
}

fn is_link_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://") || url.starts_with("mailto:")
}

// -- Edit contract --

/// What a block tells its parent editor.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockEvent {
    Edit,
    Save(BlockPayload),
    Cancel,
}

/// Read/edit state of a single block.
///
/// Entering edit mode copies the payload into a local draft. Saving hands the
/// whole draft to the parent, cancelling drops it without emitting anything
/// else. The block never persists itself.
#[derive(Debug, Clone)]
pub struct BlockEditor {
    payload: BlockPayload,
    draft: Option<BlockPayload>,
}

impl BlockEditor {
    pub fn new(payload: BlockPayload) -> Self {
        Self { payload, draft: None }
    }

    pub fn payload(&self) -> &BlockPayload {
        &self.payload
    }

    pub fn draft(&self) -> Option<&BlockPayload> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut BlockPayload> {
        self.draft.as_mut()
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn begin_edit(&mut self) -> BlockEvent {
        self.draft = Some(self.payload.clone());
        BlockEvent::Edit
    }

    /// Substitute an uploaded file URL into an image draft.
    pub fn apply_upload(&mut self, url: &str) -> Result<(), BlockError> {
        match self.draft.as_mut() {
            Some(BlockPayload::Image(image)) => {
                image.image_url = url.to_string();
                Ok(())
            }
            Some(_) => Err(BlockError::Invalid("only image blocks accept uploads".into())),
            None => Err(BlockError::Invalid("block is not being edited".into())),
        }
    }

    pub fn save(&mut self) -> Option<BlockEvent> {
        let draft = self.draft.take()?;
        self.payload = draft.clone();
        Some(BlockEvent::Save(draft))
    }

    pub fn cancel(&mut self) -> Option<BlockEvent> {
        self.draft.take().map(|_| BlockEvent::Cancel)
    }
}
