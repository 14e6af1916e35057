//! Phonebook bootstrap, ad-hoc searches and folder browsing.
//!
//! The bootstrap is two untagged searches run back to back: folders first,
//! then a contact query with the full configured limit whose `TotalRows` gives
//! the contact count. Everything after that (searches, folder browsing) is
//! tagged and correlated through the shared [`SearchTagQueue`].

use crate::codec::requests::{tagged, SearchTagQueue};
use crate::config::DirectoryConfig;
use crate::protocol::json;
use crate::validation::{quote_argument, ArgumentError, ArgumentRules};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryFolder {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactMethod {
    pub id: String,
    pub number: String,
    pub protocol: String,
    pub call_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryContact {
    pub id: String,
    pub name: String,
    pub title: String,
    pub folder_id: Option<String>,
    pub methods: Vec<ContactMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DirectoryItem {
    Folder(DirectoryFolder),
    Contact(DirectoryContact),
}

/// One page of directory results. Replaced wholesale by every response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directory {
    /// `None` for the root.
    pub folder_id: Option<String>,
    pub search: Option<String>,
    pub total_rows: u32,
    entries: Vec<DirectoryItem>,
}

impl Directory {
    pub fn items(&self) -> impl Iterator<Item = &DirectoryItem> {
        self.entries.iter()
    }

    pub fn folders(&self) -> impl Iterator<Item = &DirectoryFolder> {
        self.entries.iter().filter_map(|e| match e {
            DirectoryItem::Folder(f) => Some(f),
            DirectoryItem::Contact(_) => None,
        })
    }

    pub fn contacts(&self) -> impl Iterator<Item = &DirectoryContact> {
        self.entries.iter().filter_map(|e| match e {
            DirectoryItem::Contact(c) => Some(c),
            DirectoryItem::Folder(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Parse a `PhonebookSearchResult` body.
    pub fn from_search_result(result: &Value) -> Self {
        let total_rows = json::int(result, &["ResultInfo", "TotalRows"])
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);
        let mut entries = Vec::new();
        for f in json::items(result, &["Folder"]) {
            let Some(id) = json::text(f, &["FolderId"]).or_else(|| json::id_of(f)) else {
                continue;
            };
            entries.push(DirectoryItem::Folder(DirectoryFolder {
                id,
                name: json::text(f, &["Name"]).unwrap_or_default(),
                parent_id: json::text(f, &["ParentFolderId"]),
            }));
        }
        for c in json::items(result, &["Contact"]) {
            let Some(id) = json::text(c, &["ContactId"]).or_else(|| json::id_of(c)) else {
                continue;
            };
            let methods = json::items(c, &["ContactMethod"])
                .into_iter()
                .filter_map(|m| {
                    Some(ContactMethod {
                        id: json::text(m, &["ContactMethodId"]).or_else(|| json::id_of(m))?,
                        number: json::text(m, &["Number"])?,
                        protocol: json::text(m, &["Protocol"]).unwrap_or_default(),
                        call_type: json::text(m, &["CallType"]).unwrap_or_default(),
                    })
                })
                .collect();
            entries.push(DirectoryItem::Contact(DirectoryContact {
                id,
                name: json::text(c, &["Name"]).unwrap_or_default(),
                title: json::text(c, &["Title"]).unwrap_or_default(),
                folder_id: json::text(c, &["FolderId"]),
                methods,
            }));
        }
        Self {
            folder_id: None,
            search: None,
            total_rows,
            entries,
        }
    }

    fn merge_root_contacts(&mut self, other: Directory) {
        self.entries.retain(|e| matches!(e, DirectoryItem::Folder(_)));
        self.entries
            .extend(other.entries.into_iter().filter(|e| matches!(e, DirectoryItem::Contact(_))));
    }

    fn set_root_folders(&mut self, other: Directory) {
        self.entries.retain(|e| matches!(e, DirectoryItem::Contact(_)));
        let contacts = std::mem::take(&mut self.entries);
        self.entries = other
            .entries
            .into_iter()
            .filter(|e| matches!(e, DirectoryItem::Folder(_)))
            .chain(contacts)
            .collect();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhonebookSyncState {
    pub folders_received: bool,
    pub contact_count_received: bool,
    pub has_folders: bool,
    pub contact_count: u32,
}

impl PhonebookSyncState {
    pub fn is_complete(&self) -> bool {
        self.folders_received && self.contact_count_received
    }
}

/// Result of feeding an untagged bootstrap response.
#[derive(Debug, Default, PartialEq)]
pub struct BootstrapStep {
    pub next_command: Option<String>,
    pub root_changed: bool,
    pub completed: bool,
}

pub struct DirectoryBrowser {
    config: DirectoryConfig,
    tags: Arc<SearchTagQueue>,
    sync: PhonebookSyncState,
    root: Directory,
    history: Vec<Directory>,
    /// Tag → folder being browsed (`None` for text searches).
    in_flight: HashMap<String, Request>,
    last_search: Option<String>,
    searched_since_connect: bool,
    search_in_progress: bool,
}

#[derive(Debug, Clone)]
enum Request {
    Search(String),
    Folder(String),
}

impl DirectoryBrowser {
    pub fn new(config: DirectoryConfig, tags: Arc<SearchTagQueue>) -> Self {
        Self {
            config,
            tags,
            sync: PhonebookSyncState::default(),
            root: Directory::default(),
            history: Vec::new(),
            in_flight: HashMap::new(),
            last_search: None,
            searched_since_connect: false,
            search_in_progress: false,
        }
    }

    pub fn sync_state(&self) -> &PhonebookSyncState {
        &self.sync
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// The page currently shown: the top of the browse history, else the root.
    pub fn current(&self) -> &Directory {
        self.history.last().unwrap_or(&self.root)
    }

    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    pub fn search_in_progress(&self) -> bool {
        self.search_in_progress
    }

    fn phonebook(&self) -> &'static str {
        self.config.phonebook_mode.as_wire()
    }

    pub fn folder_search_command(&self) -> String {
        format!(
            "xCommand Phonebook Search PhonebookType: {} ContactType: Folder",
            self.phonebook()
        )
    }

    pub fn contact_count_command(&self) -> String {
        format!(
            "xCommand Phonebook Search PhonebookType: {} ContactType: Contact Limit: {}",
            self.phonebook(),
            self.config.result_limit
        )
    }

    /// Restart the two-phase fetch. Returns the folder search to send.
    pub fn begin_bootstrap(&mut self) -> String {
        self.sync = PhonebookSyncState::default();
        self.folder_search_command()
    }

    /// Feed an untagged `PhonebookSearchResult`.
    pub fn handle_bootstrap_result(&mut self, result: &Value) -> BootstrapStep {
        let page = Directory::from_search_result(result);
        if !self.sync.folders_received {
            self.sync.folders_received = true;
            let folders: Vec<&DirectoryFolder> = page.folders().collect();
            self.sync.has_folders = page.total_rows > 0 && !folders.is_empty();
            log::debug!(
                "phonebook folders received: {} (TotalRows {})",
                folders.len(),
                page.total_rows
            );
            self.root.set_root_folders(page);
            return BootstrapStep {
                next_command: Some(self.contact_count_command()),
                root_changed: true,
                completed: false,
            };
        }
        if !self.sync.contact_count_received {
            self.sync.contact_count_received = true;
            self.sync.contact_count = page.total_rows;
            self.root.total_rows = page.total_rows;
            self.root.merge_root_contacts(page);
            log::info!(
                "phonebook sync complete: {} contacts, folders: {}",
                self.sync.contact_count,
                self.sync.has_folders
            );
            return BootstrapStep {
                next_command: None,
                root_changed: true,
                completed: true,
            };
        }
        log::debug!("untagged phonebook result after bootstrap ignored");
        BootstrapStep::default()
    }

    /// Build a tagged text search, or `None` when an identical search is skipped.
    pub fn search(&mut self, text: &str) -> Result<Option<String>, ArgumentError> {
        let quoted = quote_argument(text, &ArgumentRules::search())?;
        if !self.config.auto_populate
            && self.searched_since_connect
            && self.last_search.as_deref() == Some(text)
        {
            log::debug!("skipping repeated directory search");
            return Ok(None);
        }
        self.last_search = Some(text.to_string());
        self.searched_since_connect = true;
        self.search_in_progress = true;
        let tag = self.tags.push_new();
        self.in_flight.insert(tag.clone(), Request::Search(text.to_string()));
        let cmd = format!(
            "xCommand Phonebook Search SearchString: {} PhonebookType: {} ContactType: Contact Limit: {}",
            quoted,
            self.phonebook(),
            self.config.result_limit
        );
        Ok(Some(tagged(&cmd, &tag)))
    }

    /// Build a tagged browse of one folder.
    pub fn folder_contents(&mut self, folder_id: &str) -> Result<String, ArgumentError> {
        let quoted = quote_argument(folder_id, &ArgumentRules::identifier())?;
        self.search_in_progress = true;
        let tag = self.tags.push_new();
        self.in_flight.insert(tag.clone(), Request::Folder(folder_id.to_string()));
        let cmd = format!(
            "xCommand Phonebook Search FolderId: {} PhonebookType: {} ContactType: Any Limit: {}",
            quoted,
            self.phonebook(),
            self.config.result_limit
        );
        Ok(tagged(&cmd, &tag))
    }

    /// Feed a tagged `PhonebookSearchResult`. Returns the new current page, or
    /// `None` when the tag is stale.
    pub fn handle_tagged_result(&mut self, tag: &str, result: &Value) -> Option<&Directory> {
        if !self.tags.match_response(tag) {
            log::debug!("stale directory response for tag {}", tag);
            self.in_flight.remove(tag);
            return None;
        }
        // anything queued before this tag was discarded by the match
        self.in_flight.retain(|t, _| t == tag || self.tags.contains(t));
        let request = self.in_flight.remove(tag);
        let mut page = Directory::from_search_result(result);
        match request {
            Some(Request::Search(text)) => page.search = Some(text),
            Some(Request::Folder(id)) => page.folder_id = Some(id),
            None => {}
        }
        self.search_in_progress = !self.tags.is_empty();
        self.history.push(page);
        self.history.last()
    }

    /// The codec rejected a tagged search. Drops the tag (and older ones) without
    /// touching the history.
    pub fn abandon(&mut self, tag: &str) {
        if self.tags.match_response(tag) {
            self.in_flight.retain(|t, _| self.tags.contains(t));
        }
        self.search_in_progress = !self.tags.is_empty();
    }

    /// Pop one page off the browse history.
    pub fn go_up(&mut self) -> &Directory {
        self.history.pop();
        self.current()
    }

    /// Back to the root page.
    pub fn reset(&mut self) -> &Directory {
        self.history.clear();
        self.current()
    }

    /// Connection lost: forget sync progress and every outstanding search.
    pub fn on_disconnect(&mut self) {
        self.sync = PhonebookSyncState::default();
        self.tags.clear();
        self.in_flight.clear();
        self.searched_since_connect = false;
        self.search_in_progress = false;
    }
}
