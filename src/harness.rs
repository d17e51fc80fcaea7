//! In-process host harness.
//!
//! Hosts the per-frame probes directly, with no browser underneath: frame
//! messages are routed to `PageProbe` instances over the same JSON
//! envelopes a real host would use. Integration tests and offline
//! development drive the full loop against this.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use tabpilot_core_types::{
    FrameId, FrameInfo, GroupId, HostError, Storage, TabGroupInfo, TabHandle, TabId, TabInfo,
};
use tabpilot_page_probe::{Document, PageProbe, ProbeConfig, ProbeRequest};

/// Placeholder PNG payload returned by the stub screenshot capture.
pub const STUB_SCREENSHOT: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk";

#[derive(Debug)]
struct TabSlot {
    id: TabId,
    tab: Arc<InProcessTab>,
    group: Option<GroupId>,
}

#[derive(Debug, Default)]
struct WindowState {
    tabs: Vec<TabSlot>,
    groups: Vec<TabGroupInfo>,
    active: Option<TabId>,
    next_tab: i64,
    next_group: i64,
}

/// One simulated browser window owning tabs and groups.
#[derive(Debug, Default)]
pub struct InProcessBrowser {
    window: Arc<Mutex<WindowState>>,
}

impl InProcessBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a tab whose top frame shows `doc`.
    pub fn open_tab(self: &Arc<Self>, doc: Document) -> Arc<InProcessTab> {
        let mut window = self.window.lock();
        let id = TabId(window.next_tab);
        window.next_tab += 1;
        let tab = Arc::new(InProcessTab::new(id, Arc::clone(&self.window), doc));
        window.tabs.push(TabSlot {
            id,
            tab: Arc::clone(&tab),
            group: None,
        });
        if window.active.is_none() {
            window.active = Some(id);
        }
        tab
    }
}

struct FrameSlot {
    probe: Arc<PageProbe>,
    url: String,
    parent: Option<FrameId>,
}

/// A tab whose frames are in-process probe instances.
pub struct InProcessTab {
    id: TabId,
    window: Arc<Mutex<WindowState>>,
    frames: DashMap<i64, FrameSlot>,
    /// Documents swapped in when `update_url` hits a registered URL.
    routes: Mutex<HashMap<String, Document>>,
    nav_log: Mutex<Vec<String>>,
    debug_calls: Mutex<Vec<(String, Value)>>,
    screenshot_data: Mutex<String>,
    debug_attached: AtomicBool,
}

impl InProcessTab {
    fn new(id: TabId, window: Arc<Mutex<WindowState>>, doc: Document) -> Self {
        let url = doc.url.clone();
        let tab = Self {
            id,
            window,
            frames: DashMap::new(),
            routes: Mutex::new(HashMap::new()),
            nav_log: Mutex::new(Vec::new()),
            debug_calls: Mutex::new(Vec::new()),
            screenshot_data: Mutex::new(STUB_SCREENSHOT.to_string()),
            debug_attached: AtomicBool::new(false),
        };
        tab.frames.insert(
            0,
            FrameSlot {
                probe: Arc::new(PageProbe::new(
                    Arc::new(AsyncMutex::new(doc)),
                    ProbeConfig::test(),
                )),
                url,
                parent: None,
            },
        );
        tab
    }

    /// Attach a child frame showing `doc`.
    pub fn add_frame(&self, frame_id: FrameId, doc: Document) -> Arc<AsyncMutex<Document>> {
        let url = doc.url.clone();
        let shared = Arc::new(AsyncMutex::new(doc));
        self.frames.insert(
            frame_id.0,
            FrameSlot {
                probe: Arc::new(PageProbe::new(Arc::clone(&shared), ProbeConfig::test())),
                url,
                parent: Some(FrameId::TOP),
            },
        );
        shared
    }

    /// Replace a frame's document (simulates iframe navigation).
    pub async fn replace_frame_document(&self, frame_id: FrameId, doc: Document) {
        if let Some(slot) = self.frames.get(&frame_id.0) {
            let shared = slot.probe.document();
            let mut current = shared.lock().await;
            *current = doc;
        }
    }

    /// Drop a frame entirely.
    pub fn remove_frame(&self, frame_id: FrameId) {
        self.frames.remove(&frame_id.0);
    }

    /// Shared handle to a frame's document.
    pub fn document(&self, frame_id: FrameId) -> Option<Arc<AsyncMutex<Document>>> {
        self.frames.get(&frame_id.0).map(|slot| slot.probe.document())
    }

    /// Register the document shown after navigating to `url`.
    pub fn route(&self, url: &str, doc: Document) {
        self.routes.lock().insert(url.to_string(), doc);
    }

    pub fn navigations(&self) -> Vec<String> {
        self.nav_log.lock().clone()
    }

    pub fn debug_calls(&self) -> Vec<(String, Value)> {
        self.debug_calls.lock().clone()
    }

    pub fn set_screenshot_data(&self, data: &str) {
        *self.screenshot_data.lock() = data.to_string();
    }

    pub fn is_debug_attached(&self) -> bool {
        self.debug_attached.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TabHandle for InProcessTab {
    fn id(&self) -> TabId {
        self.id
    }

    async fn url(&self) -> Result<String, HostError> {
        let doc = self
            .document(FrameId::TOP)
            .ok_or_else(|| HostError::new("no top frame"))?;
        let doc = doc.lock().await;
        Ok(doc.url.clone())
    }

    async fn title(&self) -> Result<String, HostError> {
        let doc = self
            .document(FrameId::TOP)
            .ok_or_else(|| HostError::new("no top frame"))?;
        let doc = doc.lock().await;
        Ok(doc.title.clone())
    }

    async fn enumerate_frames(&self) -> Result<Vec<FrameInfo>, HostError> {
        let mut frames: Vec<FrameInfo> = self
            .frames
            .iter()
            .map(|entry| FrameInfo {
                frame_id: FrameId(*entry.key()),
                parent_frame_id: entry.value().parent,
                url: entry.value().url.clone(),
            })
            .collect();
        frames.sort_by_key(|f| f.frame_id.0);
        Ok(frames)
    }

    async fn inject_probe_in_all_frames(&self) -> Result<(), HostError> {
        for entry in self.frames.iter() {
            entry.value().probe.install();
        }
        Ok(())
    }

    async fn send_to_frame(
        &self,
        frame_id: FrameId,
        message: Value,
    ) -> Result<Option<Value>, HostError> {
        let Some(slot) = self.frames.get(&frame_id.0) else {
            return Ok(None);
        };
        let probe = Arc::clone(&slot.probe);
        drop(slot);
        let request: ProbeRequest = serde_json::from_value(message)
            .map_err(|err| HostError::new(format!("bad probe message: {err}")))?;
        let reply = probe.handle(request).await;
        let value = serde_json::to_value(reply)
            .map_err(|err| HostError::new(format!("bad probe reply: {err}")))?;
        Ok(Some(value))
    }

    async fn update_url(&self, url: &str) -> Result<(), HostError> {
        self.nav_log.lock().push(url.to_string());
        let routed = self.routes.lock().remove(url);
        let doc_handle = self
            .document(FrameId::TOP)
            .ok_or_else(|| HostError::new("no top frame"))?;
        let mut doc = doc_handle.lock().await;
        match routed {
            Some(new_doc) => *doc = new_doc,
            None => {
                doc.url = url.to_string();
                doc.title = format!("Loaded: {url}");
            }
        }
        if let Some(mut slot) = self.frames.get_mut(&0) {
            slot.url = url.to_string();
        }
        Ok(())
    }

    async fn wait_loaded(&self, _timeout: Duration) -> Result<bool, HostError> {
        Ok(true)
    }

    async fn activate(&self) -> Result<(), HostError> {
        self.window.lock().active = Some(self.id);
        Ok(())
    }

    async fn close(&self) -> Result<(), HostError> {
        let mut window = self.window.lock();
        window.tabs.retain(|slot| slot.id != self.id);
        if window.active == Some(self.id) {
            window.active = window.tabs.first().map(|slot| slot.id);
        }
        Ok(())
    }

    async fn create_tab(&self, url: Option<&str>) -> Result<Arc<dyn TabHandle>, HostError> {
        let url = url.unwrap_or("about:newtab");
        let doc = Document::new(url, "New tab", 1280, 800);
        let mut window = self.window.lock();
        let id = TabId(window.next_tab);
        window.next_tab += 1;
        let tab = Arc::new(InProcessTab::new(id, Arc::clone(&self.window), doc));
        window.tabs.push(TabSlot {
            id,
            tab: Arc::clone(&tab),
            group: None,
        });
        Ok(tab)
    }

    async fn tab_handle(&self, id: TabId) -> Result<Arc<dyn TabHandle>, HostError> {
        let window = self.window.lock();
        window
            .tabs
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| Arc::clone(&slot.tab) as Arc<dyn TabHandle>)
            .ok_or_else(|| HostError::new(format!("no tab {id}")))
    }

    async fn list_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        let (slots, active) = {
            let window = self.window.lock();
            let slots: Vec<(TabId, Arc<InProcessTab>, Option<GroupId>)> = window
                .tabs
                .iter()
                .map(|slot| (slot.id, Arc::clone(&slot.tab), slot.group))
                .collect();
            (slots, window.active)
        };
        let mut infos = Vec::with_capacity(slots.len());
        for (index, (id, tab, group)) in slots.into_iter().enumerate() {
            let url = tab.url().await.unwrap_or_default();
            let title = tab.title().await.unwrap_or_default();
            infos.push(TabInfo {
                id,
                index,
                url,
                title,
                active: active == Some(id),
                group_id: group,
            });
        }
        Ok(infos)
    }

    async fn list_tab_groups(&self) -> Result<Vec<TabGroupInfo>, HostError> {
        Ok(self.window.lock().groups.clone())
    }

    async fn group_tabs(
        &self,
        tabs: &[TabId],
        color: Option<&str>,
        title: Option<&str>,
    ) -> Result<GroupId, HostError> {
        let mut window = self.window.lock();
        window.next_group += 1;
        let group = GroupId(window.next_group);
        window.groups.push(TabGroupInfo {
            id: group,
            title: title.unwrap_or_default().to_string(),
            color: color.unwrap_or("grey").to_string(),
        });
        for slot in window.tabs.iter_mut() {
            if tabs.contains(&slot.id) {
                slot.group = Some(group);
            }
        }
        Ok(group)
    }

    async fn add_to_group(&self, group: GroupId, tabs: &[TabId]) -> Result<(), HostError> {
        let mut window = self.window.lock();
        if !window.groups.iter().any(|g| g.id == group) {
            return Err(HostError::new(format!("no group {group}")));
        }
        for slot in window.tabs.iter_mut() {
            if tabs.contains(&slot.id) {
                slot.group = Some(group);
            }
        }
        Ok(())
    }

    async fn ungroup(&self, group: GroupId) -> Result<(), HostError> {
        let mut window = self.window.lock();
        window.groups.retain(|g| g.id != group);
        for slot in window.tabs.iter_mut() {
            if slot.group == Some(group) {
                slot.group = None;
            }
        }
        Ok(())
    }

    async fn debug_attach(&self) -> Result<(), HostError> {
        if self.debug_attached.swap(true, Ordering::SeqCst) {
            return Err(HostError::new("debugger already attached"));
        }
        Ok(())
    }

    async fn debug_detach(&self) -> Result<(), HostError> {
        self.debug_attached.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn debug_send(&self, method: &str, params: Value) -> Result<Value, HostError> {
        if !self.debug_attached.load(Ordering::SeqCst) {
            return Err(HostError::new("debugger not attached"));
        }
        self.debug_calls.lock().push((method.to_string(), params));
        Ok(Value::Object(Default::default()))
    }

    async fn capture_screenshot(&self) -> Result<String, HostError> {
        if !self.debug_attached.load(Ordering::SeqCst) {
            return Err(HostError::new("debugger not attached"));
        }
        Ok(self.screenshot_data.lock().clone())
    }
}

impl std::fmt::Debug for InProcessTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessTab")
            .field("id", &self.id)
            .field("frames", &self.frames.len())
            .finish()
    }
}

/// Volatile key-value storage for settings.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Option<String> {
        self.map.lock().get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        self.map.lock().insert(key.to_string(), value);
    }
}
