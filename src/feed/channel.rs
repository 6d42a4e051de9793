use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ChannelConfig;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid channel pubDate '{value}': {source}")]
    InvalidPublished {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("Channel {0} must not be empty")]
    MissingField(&'static str),
}

/// Channel-level metadata, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub self_link: Option<String>,
    pub description: String,
    pub language: String,
    pub copyright: String,
    pub generator: String,
    pub managing_editor: String,
    pub owner_name: String,
    pub owner_email: String,
    pub subtitle: String,
    pub keywords: Vec<String>,
    pub explicit: bool,
    pub image: String,
    pub category: String,
    pub subcategory: String,
    pub update_period: String,
    pub update_frequency: u32,
    pub published: DateTime<Utc>,
    pub cdata_descriptions: bool,
}

impl Channel {
    /// Validates the `[channel]` config section.
    pub fn from_config(config: &ChannelConfig) -> Result<Self, ChannelError> {
        if config.title.trim().is_empty() {
            return Err(ChannelError::MissingField("title"));
        }
        if config.link.trim().is_empty() {
            return Err(ChannelError::MissingField("link"));
        }

        let published = DateTime::parse_from_rfc3339(config.published.trim())
            .map_err(|source| ChannelError::InvalidPublished {
                value: config.published.clone(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Self {
            title: config.title.clone(),
            link: config.link.clone(),
            self_link: config.self_link.clone().filter(|s| !s.trim().is_empty()),
            description: config.description.clone(),
            language: config.language.clone(),
            copyright: config.copyright.clone(),
            generator: config.generator.clone(),
            managing_editor: config.managing_editor.clone(),
            owner_name: config.owner_name.clone(),
            owner_email: config.owner_email.clone(),
            subtitle: config.subtitle.clone(),
            keywords: config.keywords.clone(),
            explicit: config.explicit,
            image: config.image.clone(),
            category: config.category.clone(),
            subcategory: config.subcategory.clone(),
            update_period: config.update_period.clone(),
            update_frequency: config.update_frequency,
            published,
            cdata_descriptions: config.cdata_descriptions,
        })
    }
}
