use serde::{Deserialize, Serialize};

/// Options attached to a map reload request.
///
/// `source_id` scopes the change to an analysis node so dataviews can decide
/// whether it affects them; `force_fetch` makes every dataview re-fetch no
/// matter its sync flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadOptions {
    pub source_id: Option<String>,
    pub force_fetch: bool,
    pub include_filters: bool,
}

impl ReloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scoped(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..Self::default()
        }
    }

    pub fn force_fetch(mut self) -> Self {
        self.force_fetch = true;
        self
    }

    pub fn with_filters(mut self) -> Self {
        self.include_filters = true;
        self
    }
}

/// What a url change carries for the dataviews receiving it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlChange {
    pub source_id: Option<String>,
    pub force_fetch: bool,
}

impl From<&ReloadOptions> for UrlChange {
    fn from(options: &ReloadOptions) -> Self {
        Self {
            source_id: options.source_id.clone(),
            force_fetch: options.force_fetch,
        }
    }
}
