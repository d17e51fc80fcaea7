//! Tab and tab-group operations.

use serde_json::json;

use tabpilot_core_types::{GroupId, TabHandle, TabId};

use crate::ExecOutcome;

/// List open tabs and groups as a formatted block plus structured payload.
pub async fn list_tabs(tab: &dyn TabHandle) -> ExecOutcome {
    let tabs = match tab.list_tabs().await {
        Ok(tabs) => tabs,
        Err(err) => return ExecOutcome::failed(format!("could not list tabs: {err}")),
    };
    let groups = tab.list_tab_groups().await.unwrap_or_default();

    let mut text = format!("Open tabs ({}):\n", tabs.len());
    for info in &tabs {
        let marker = if info.active { "*" } else { " " };
        let group = info
            .group_id
            .map(|g| format!(" [group {}]", g.0))
            .unwrap_or_default();
        text.push_str(&format!(
            "{marker}[{}] {} - {}{group}\n",
            info.index, info.title, info.url
        ));
    }
    if !groups.is_empty() {
        text.push_str(&format!("Tab groups ({}):\n", groups.len()));
        for group in &groups {
            text.push_str(&format!(
                "[{}] {} ({})\n",
                group.id.0, group.title, group.color
            ));
        }
    }

    ExecOutcome::ok_with(text, json!({ "tabs": tabs, "groups": groups }))
}

pub async fn new_tab(tab: &dyn TabHandle, url: Option<&str>) -> ExecOutcome {
    match tab.create_tab(url).await {
        Ok(created) => ExecOutcome::ok(format!(
            "opened new tab {}{}",
            created.id(),
            url.map(|u| format!(" at {u}")).unwrap_or_default()
        )),
        Err(err) => ExecOutcome::failed(format!("could not open tab: {err}")),
    }
}

/// Activate a tab by zero-based index.
pub async fn switch_tab(tab: &dyn TabHandle, index: usize) -> ExecOutcome {
    let tabs = match tab.list_tabs().await {
        Ok(tabs) => tabs,
        Err(err) => return ExecOutcome::failed(format!("could not list tabs: {err}")),
    };
    let Some(info) = tabs.iter().find(|t| t.index == index) else {
        return ExecOutcome::failed(format!(
            "tab index {index} out of range (0..{})",
            tabs.len().saturating_sub(1)
        ));
    };
    match tab.tab_handle(info.id).await {
        Ok(handle) => match handle.activate().await {
            Ok(()) => ExecOutcome::ok(format!("switched to tab {index}: {}", info.title)),
            Err(err) => ExecOutcome::failed(format!("could not activate tab {index}: {err}")),
        },
        Err(err) => ExecOutcome::failed(format!("no handle for tab {index}: {err}")),
    }
}

/// Close a tab by index, or the current tab when no index is given.
pub async fn close_tab(tab: &dyn TabHandle, index: Option<usize>) -> ExecOutcome {
    match index {
        None => match tab.close().await {
            Ok(()) => ExecOutcome::ok("closed current tab"),
            Err(err) => ExecOutcome::failed(format!("could not close tab: {err}")),
        },
        Some(index) => {
            let tabs = match tab.list_tabs().await {
                Ok(tabs) => tabs,
                Err(err) => return ExecOutcome::failed(format!("could not list tabs: {err}")),
            };
            let Some(info) = tabs.iter().find(|t| t.index == index) else {
                return ExecOutcome::failed(format!(
                    "tab index {index} out of range (0..{})",
                    tabs.len().saturating_sub(1)
                ));
            };
            match tab.tab_handle(info.id).await {
                Ok(handle) => match handle.close().await {
                    Ok(()) => ExecOutcome::ok(format!("closed tab {index}: {}", info.title)),
                    Err(err) => ExecOutcome::failed(format!("could not close tab {index}: {err}")),
                },
                Err(err) => ExecOutcome::failed(format!("no handle for tab {index}: {err}")),
            }
        }
    }
}

/// Resolve zero-based indices to tab ids.
async fn ids_for_indices(tab: &dyn TabHandle, indices: &[usize]) -> Result<Vec<TabId>, String> {
    let tabs = tab
        .list_tabs()
        .await
        .map_err(|err| format!("could not list tabs: {err}"))?;
    indices
        .iter()
        .map(|&index| {
            tabs.iter()
                .find(|t| t.index == index)
                .map(|t| t.id)
                .ok_or_else(|| {
                    format!(
                        "tab index {index} out of range (0..{})",
                        tabs.len().saturating_sub(1)
                    )
                })
        })
        .collect()
}

pub async fn group_create(
    tab: &dyn TabHandle,
    indices: &[usize],
    color: Option<&str>,
    title: Option<&str>,
) -> ExecOutcome {
    let ids = match ids_for_indices(tab, indices).await {
        Ok(ids) => ids,
        Err(message) => return ExecOutcome::failed(message),
    };
    match tab.group_tabs(&ids, color, title).await {
        Ok(group) => ExecOutcome::ok_with(
            format!("created tab group {}", group.0),
            json!({ "groupId": group.0 }),
        ),
        Err(err) => ExecOutcome::failed(format!("could not create tab group: {err}")),
    }
}

pub async fn group_add(tab: &dyn TabHandle, group_id: i64, indices: &[usize]) -> ExecOutcome {
    let ids = match ids_for_indices(tab, indices).await {
        Ok(ids) => ids,
        Err(message) => return ExecOutcome::failed(message),
    };
    match tab.add_to_group(GroupId(group_id), &ids).await {
        Ok(()) => ExecOutcome::ok(format!("added {} tab(s) to group {group_id}", ids.len())),
        Err(err) => ExecOutcome::failed(format!("could not add to group {group_id}: {err}")),
    }
}

pub async fn group_remove(tab: &dyn TabHandle, group_id: i64) -> ExecOutcome {
    match tab.ungroup(GroupId(group_id)).await {
        Ok(()) => ExecOutcome::ok(format!("removed tab group {group_id}")),
        Err(err) => ExecOutcome::failed(format!("could not remove group {group_id}: {err}")),
    }
}
