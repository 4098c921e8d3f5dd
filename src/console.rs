//! Feed console controller.
//!
//! Each browser session owns its own rendered state (feed rows, items panel,
//! loaded article content, read-later list, status banner and draft input).
//! A [`Session`] implements every user action as one or a few Feed API calls.
//! The session map lock is never held across a network call.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiError, FeedApiClient, FeedEntry, FeedGroup, FeedItem};

pub const INVALID_URL_MESSAGE: &str = "Please enter a valid URL";
pub const INVALID_LINK_MESSAGE: &str = "Please enter a title and a URL";
pub const NO_CONTENT_MESSAGE: &str = "Load an item's content before summarizing";

/// Sessions kept before the least recently used one is dropped
pub const MAX_SESSIONS: usize = 1024;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("feed URL is empty")]
    InvalidUrl,

    #[error("custom link needs both a title and a URL")]
    InvalidLink,

    #[error("no content loaded")]
    NoContent,

    #[error("'{0}' is no longer listed by the Feed API")]
    Stale(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// User-facing actions, used to pick fallback messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddFeed,
    RemoveFeed,
    ViewItems,
    ViewAll,
    ViewContent,
    Summarize,
    ListReadLater,
    SaveForLater,
    AddCustomLink,
    RemoveReadLater,
}

impl Operation {
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::AddFeed => "Failed to add feed",
            Operation::RemoveFeed => "Failed to remove feed",
            Operation::ViewItems => "Failed to fetch feed items",
            Operation::ViewAll => "Failed to fetch feeds",
            Operation::ViewContent => "Failed to fetch content",
            Operation::Summarize => "Failed to summarize content",
            Operation::ListReadLater => "Failed to fetch read later items",
            Operation::SaveForLater => "Failed to add to read later",
            Operation::AddCustomLink => "Failed to add link",
            Operation::RemoveReadLater => "Failed to remove read later item",
        }
    }

    fn stale_message(self) -> &'static str {
        match self {
            Operation::RemoveReadLater => "Item is no longer in the read later list",
            Operation::ViewContent => "Item is no longer available",
            _ => "Feed is no longer in the list",
        }
    }
}

impl ConsoleError {
    /// Text shown in the status banner when `op` fails with this error
    pub fn user_message(&self, op: Operation) -> String {
        match self {
            ConsoleError::InvalidUrl => INVALID_URL_MESSAGE.to_string(),
            ConsoleError::InvalidLink => INVALID_LINK_MESSAGE.to_string(),
            ConsoleError::NoContent => NO_CONTENT_MESSAGE.to_string(),
            ConsoleError::Stale(_) => op.stale_message().to_string(),
            ConsoleError::Api(err) => err
                .server_message()
                .unwrap_or(op.fallback_message())
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Inline status banner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }

    pub fn css_class(&self) -> &'static str {
        match self.kind {
            NoticeKind::Info => "notice notice-info",
            NoticeKind::Error => "notice notice-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    /// Position at the time of the last list render; never sent back as-is
    pub index: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItems {
    pub feed_url: String,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupView {
    pub url: String,
    pub items: Vec<FeedItem>,
    pub collapsed: bool,
}

impl GroupView {
    pub fn heading(&self) -> String {
        format!("Feed: {}", self.url)
    }

    pub fn toggle(&mut self) {
        self.collapsed = !self.collapsed;
    }
}

impl From<FeedGroup> for GroupView {
    fn from(group: FeedGroup) -> Self {
        Self {
            url: group.url,
            items: group.items,
            collapsed: true,
        }
    }
}

/// Content of the items area: one feed flat, or every feed grouped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ItemsPanel {
    #[default]
    Empty,
    Flat(FlatItems),
    Grouped(Vec<GroupView>),
}

/// Extracted page text of one item, with its summary once requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentView {
    pub feed_url: String,
    pub title: String,
    pub link: String,
    pub text: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleState {
    pub feeds: Vec<FeedRow>,
    pub feeds_fetched_at: Option<DateTime<Utc>>,
    pub items: ItemsPanel,
    pub content: Option<ContentView>,
    pub read_later: Vec<FeedItem>,
    pub notice: Option<Notice>,
    /// Value of the add-feed input, kept when the add fails
    pub draft_url: String,
}

impl ConsoleState {
    fn set_feeds(&mut self, urls: Vec<String>) {
        self.feeds = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| FeedRow { index, url })
            .collect();
        self.feeds_fetched_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct SessionEntry {
    state: ConsoleState,
    last_seen: Instant,
}

pub struct Console {
    api: FeedApiClient,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    link_missing_comments: bool,
}

impl Console {
    pub fn new(api: FeedApiClient, link_missing_comments: bool) -> Self {
        Self {
            api,
            sessions: RwLock::new(HashMap::new()),
            link_missing_comments,
        }
    }

    pub fn link_missing_comments(&self) -> bool {
        self.link_missing_comments
    }

    pub fn session(&self, id: SessionId) -> Session<'_> {
        Session { console: self, id }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// One browser's view of the console
pub struct Session<'a> {
    console: &'a Console,
    id: SessionId,
}

impl Session<'_> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn link_missing_comments(&self) -> bool {
        self.console.link_missing_comments
    }

    pub async fn snapshot(&self) -> ConsoleState {
        self.console
            .sessions
            .read()
            .await
            .get(&self.id)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    fn api(&self) -> &FeedApiClient {
        &self.console.api
    }

    async fn update<R>(&self, f: impl FnOnce(&mut ConsoleState) -> R) -> R {
        let mut sessions = self.console.sessions.write().await;
        if !sessions.contains_key(&self.id) && sessions.len() >= MAX_SESSIONS {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                debug!("Dropping idle session {}", oldest);
                sessions.remove(&oldest);
            }
        }
        let entry = sessions.entry(self.id).or_insert_with(|| SessionEntry {
            state: ConsoleState::default(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        f(&mut entry.state)
    }

    /// Refresh the feed rows. Failures leave the list empty without a notice.
    pub async fn list_feeds(&self) -> Result<(), ConsoleError> {
        match self.api().list_feeds().await {
            Ok(urls) => {
                info!("Listed {} feeds", urls.len());
                self.update(|state| state.set_feeds(urls)).await;
                Ok(())
            }
            Err(e) => {
                warn!("Listing feeds failed: {}", e);
                self.update(|state| {
                    state.feeds.clear();
                    state.feeds_fetched_at = None;
                })
                .await;
                Err(e.into())
            }
        }
    }

    pub async fn add_feed(&self, raw: &str) -> Result<(), ConsoleError> {
        let url = raw.trim();
        if url.is_empty() {
            let err = ConsoleError::InvalidUrl;
            self.update(|state| state.draft_url = raw.to_string()).await;
            self.fail(Operation::AddFeed, &err).await;
            return Err(err);
        }

        if let Err(e) = self.api().add_feed(url).await {
            let err = ConsoleError::from(e);
            self.update(|state| state.draft_url = raw.to_string()).await;
            self.fail(Operation::AddFeed, &err).await;
            return Err(err);
        }

        info!("Added feed: {}", url);
        self.update(|state| {
            state.draft_url.clear();
            state.notice = Some(Notice::info(format!("Added {}", url)));
        })
        .await;
        let _ = self.list_feeds().await;
        Ok(())
    }

    /// Remove the feed with this URL, resolving its current index first
    pub async fn remove_feed(&self, url: &str) -> Result<(), ConsoleError> {
        let result = async {
            let index = self.resolve_feed(url).await?;
            self.api().remove_feed(index).await?;
            Ok::<_, ConsoleError>(())
        }
        .await;

        if let Err(err) = result {
            self.fail(Operation::RemoveFeed, &err).await;
            return Err(err);
        }

        info!("Removed feed: {}", url);
        self.update(|state| state.notice = Some(Notice::info(format!("Removed {}", url))))
            .await;
        let _ = self.list_feeds().await;
        Ok(())
    }

    pub async fn view_items(&self, url: &str) -> Result<(), ConsoleError> {
        self.update(|state| state.items = ItemsPanel::Empty).await;

        let result = async {
            let index = self.resolve_feed(url).await?;
            Ok::<_, ConsoleError>(self.api().fetch_items(index).await?)
        }
        .await;

        match result {
            Ok(entries) => {
                info!("Fetched {} items for {}", entries.len(), url);
                self.update(|state| {
                    state.items = ItemsPanel::Flat(FlatItems {
                        feed_url: url.to_string(),
                        entries,
                    });
                    state.notice = None;
                })
                .await;
                Ok(())
            }
            Err(err) => {
                self.fail(Operation::ViewItems, &err).await;
                Err(err)
            }
        }
    }

    /// Fetch every feed and show them grouped, each group collapsed
    pub async fn view_all(&self) -> Result<(), ConsoleError> {
        self.update(|state| state.items = ItemsPanel::Empty).await;

        match self.api().fetch_all().await {
            Ok(groups) => {
                info!("Fetched {} feed groups", groups.len());
                let groups = groups.into_iter().map(GroupView::from).collect();
                self.update(|state| {
                    state.items = ItemsPanel::Grouped(groups);
                    state.notice = None;
                })
                .await;
                Ok(())
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                self.fail(Operation::ViewAll, &err).await;
                Err(err)
            }
        }
    }

    /// Flip the group of feed `url` between collapsed and expanded. Returns
    /// false when the grouped view is not shown or has no such feed.
    pub async fn toggle_group(&self, url: &str) -> bool {
        self.update(|state| match &mut state.items {
            ItemsPanel::Grouped(groups) => match groups.iter_mut().find(|g| g.url == url) {
                Some(group) => {
                    group.toggle();
                    true
                }
                None => false,
            },
            _ => false,
        })
        .await
    }

    /// Load the page text of the item `link` in feed `feed_url`
    pub async fn view_content(&self, feed_url: &str, link: &str) -> Result<(), ConsoleError> {
        self.update(|state| state.content = None).await;

        let result = async {
            let feed_index = self.resolve_feed(feed_url).await?;
            let entries = self.api().fetch_items(feed_index).await?;
            let (item_index, title) = entries
                .iter()
                .enumerate()
                .find_map(|(i, entry)| match entry {
                    FeedEntry::Item(item) if item.link == link => Some((i, item.title.clone())),
                    _ => None,
                })
                .ok_or_else(|| ConsoleError::Stale(link.to_string()))?;
            let text = self.api().fetch_content(feed_index, item_index).await?;
            Ok::<_, ConsoleError>((title, text))
        }
        .await;

        match result {
            Ok((title, text)) => {
                info!("Fetched content for {}", link);
                self.update(|state| {
                    state.content = Some(ContentView {
                        feed_url: feed_url.to_string(),
                        title,
                        link: link.to_string(),
                        text,
                        summary: None,
                    });
                    state.notice = None;
                })
                .await;
                Ok(())
            }
            Err(err) => {
                self.fail(Operation::ViewContent, &err).await;
                Err(err)
            }
        }
    }

    /// Summarize the content currently loaded in this session
    pub async fn summarize(&self) -> Result<(), ConsoleError> {
        let loaded = self
            .update(|state| {
                state
                    .content
                    .as_ref()
                    .map(|c| (c.link.clone(), c.text.clone()))
            })
            .await;
        let Some((link, text)) = loaded else {
            let err = ConsoleError::NoContent;
            self.fail(Operation::Summarize, &err).await;
            return Err(err);
        };

        match self.api().summarize(&text).await {
            Ok(summary) => {
                info!("Summarized {}", link);
                self.update(|state| {
                    // Another item may have been loaded meanwhile
                    if let Some(content) = state.content.as_mut().filter(|c| c.link == link) {
                        content.summary = Some(summary);
                    }
                })
                .await;
                Ok(())
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                self.fail(Operation::Summarize, &err).await;
                Err(err)
            }
        }
    }

    pub async fn dismiss_notice(&self) {
        self.update(|state| state.notice = None).await;
    }

    pub async fn list_read_later(&self) -> Result<(), ConsoleError> {
        match self.api().list_read_later().await {
            Ok(items) => {
                self.update(|state| state.read_later = items).await;
                Ok(())
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                self.fail(Operation::ListReadLater, &err).await;
                Err(err)
            }
        }
    }

    pub async fn save_for_later(&self, item: FeedItem) -> Result<(), ConsoleError> {
        if let Err(e) = self.api().add_read_later(&item).await {
            let err = ConsoleError::from(e);
            self.fail(Operation::SaveForLater, &err).await;
            return Err(err);
        }

        info!("Saved for later: {}", item.title);
        let notice = Notice::info(format!("Saved \"{}\"", item.title));
        self.update(|state| state.notice = Some(notice)).await;
        self.reload_read_later().await;
        Ok(())
    }

    /// Save a link that is not part of any feed
    pub async fn add_custom_link(&self, title: &str, url: &str) -> Result<(), ConsoleError> {
        let (title, url) = (title.trim(), url.trim());
        let result = if title.is_empty() || url.is_empty() {
            Err(ConsoleError::InvalidLink)
        } else {
            self.api()
                .add_custom_link(title, url)
                .await
                .map_err(ConsoleError::from)
        };

        if let Err(err) = result {
            self.fail(Operation::AddCustomLink, &err).await;
            return Err(err);
        }

        info!("Saved custom link: {}", url);
        let notice = Notice::info(format!("Saved \"{}\"", title));
        self.update(|state| state.notice = Some(notice)).await;
        self.reload_read_later().await;
        Ok(())
    }

    pub async fn remove_read_later(&self, link: &str) -> Result<(), ConsoleError> {
        let result = async {
            let items = self.api().list_read_later().await?;
            let index = items
                .iter()
                .position(|item| item.link == link)
                .ok_or_else(|| ConsoleError::Stale(link.to_string()))?;
            self.api().remove_read_later(index).await?;
            Ok::<_, ConsoleError>(())
        }
        .await;

        if let Err(err) = result {
            self.fail(Operation::RemoveReadLater, &err).await;
            return Err(err);
        }

        self.update(|state| state.notice = Some(Notice::info("Removed from read later")))
            .await;
        self.reload_read_later().await;
        Ok(())
    }

    /// Re-list read-later after a change; a failure here keeps the change's notice
    async fn reload_read_later(&self) {
        match self.api().list_read_later().await {
            Ok(items) => self.update(|state| state.read_later = items).await,
            Err(e) => warn!("Reloading read later list failed: {}", e),
        }
    }

    /// Current index of `url` according to a fresh `GET /feeds`
    async fn resolve_feed(&self, url: &str) -> Result<usize, ConsoleError> {
        let urls = self.api().list_feeds().await?;
        let index = urls.iter().position(|u| u == url);
        self.update(|state| state.set_feeds(urls)).await;
        index.ok_or_else(|| ConsoleError::Stale(url.to_string()))
    }

    async fn fail(&self, op: Operation, err: &ConsoleError) {
        warn!("{:?} failed: {}", op, err);
        let notice = Notice::error(err.user_message(op));
        self.update(|state| state.notice = Some(notice)).await;
    }
}
