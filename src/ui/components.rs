/// Reusable UI components

use patternfly_yew::prelude::*;
use uuid::Uuid;
use yew::prelude::*;

use crate::bookmarks::BookmarkGroup;
use crate::search::{FacetChoice, FacetCounts, FacetFilter, TabFacet};
use crate::session::{Toast, ToastKind};
use crate::tab_data::TabInfo;

#[derive(Properties, PartialEq)]
pub struct TabRowProps {
    pub tab: TabInfo,
    /// Keyboard cursor is on this row
    #[prop_or(false)]
    pub active: bool,
    #[prop_or(false)]
    pub selected: bool,
    pub on_activate: Callback<i32>,
    pub on_toggle_select: Callback<i32>,
    pub on_close: Callback<i32>,
}

#[function_component(TabRow)]
pub fn tab_row(props: &TabRowProps) -> Html {
    let tab = &props.tab;
    let id = tab.id;

    let class = classes!(
        "tab-row",
        props.active.then_some("tab-row-active"),
        props.selected.then_some("tab-row-selected"),
    );

    let on_close = props.on_close.reform(move |e: MouseEvent| {
        e.stop_propagation();
        id
    });
    let on_select = props.on_toggle_select.reform(move |e: MouseEvent| {
        e.stop_propagation();
        id
    });

    html! {
        <div id={format!("tab-{}", id)} class={class} onclick={props.on_activate.reform(move |_| id)}>
            <input type="checkbox" checked={props.selected} onclick={on_select} />
            if let Some(icon) = &tab.fav_icon_url {
                <img class="tab-favicon" src={icon.clone()} width="16" height="16" />
            }
            <div class="tab-text">
                <span class="tab-title">{&tab.title}</span>
                <span class="tab-domain">{&tab.domain}</span>
            </div>
            if tab.pinned {
                <span class="tab-badge">{"📌"}</span>
            }
            if tab.audible {
                <span class="tab-badge">{"🔊"}</span>
            }
            <button class="tab-close" title="Close tab" onclick={on_close}>{"✕"}</button>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct BookmarkGroupViewProps {
    pub group: BookmarkGroup,
    pub collapsed: bool,
    /// Navigation id of the selected row, if any
    #[prop_or_default]
    pub active_id: Option<String>,
    pub on_toggle: Callback<String>,
    pub on_open: Callback<String>,
    /// Opens the folder's bookmarks in new tabs
    pub on_open_all: Callback<String>,
}

#[function_component(BookmarkGroupView)]
pub fn bookmark_group_view(props: &BookmarkGroupViewProps) -> Html {
    let group = &props.group;
    let name = group.name.clone();
    let open_all_name = group.name.clone();
    let open_count = group.urls_to_open().len();

    html! {
        <div class="bookmark-group">
            <button class="bookmark-group-header" onclick={props.on_toggle.reform(move |_| name.clone())}>
                {if props.collapsed { "▶ " } else { "▼ " }}
                {format!("{} ({})", group.name, group.bookmarks.len())}
            </button>
            <button
                class="bookmark-open-all"
                title={format!("Open {} bookmarks in new tabs", open_count)}
                onclick={props.on_open_all.reform(move |_| open_all_name.clone())}
            >
                {"Open all"}
            </button>
            // collapsed rows stay in the DOM so they can be scrolled to after expanding
            {for group.bookmarks.iter().map(|hit| {
                let row_id = format!("bookmark-{}", hit.id);
                let active = props.active_id.as_deref() == Some(row_id.as_str());
                let url = hit.url.clone().unwrap_or_default();
                html! {
                    <div
                        id={row_id}
                        class={classes!("bookmark-row", active.then_some("tab-row-active"))}
                        hidden={props.collapsed}
                        onclick={props.on_open.reform(move |_| url.clone())}
                    >
                        <span class="tab-title">{&hit.title}</span>
                        <span class="tab-domain">{hit.url.clone().unwrap_or_default()}</span>
                    </div>
                }
            })}
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct FacetChipsProps {
    pub facets: FacetFilter,
    pub counts: FacetCounts,
    pub on_toggle: Callback<FacetChoice>,
}

#[function_component(FacetChips)]
pub fn facet_chips(props: &FacetChipsProps) -> Html {
    let chip = |label: &str, count: usize, active: bool, choice: FacetChoice| {
        let class = if active { "facet-chip facet-chip-active" } else { "facet-chip" };
        html! {
            <button class={class} onclick={props.on_toggle.reform(move |_| choice)}>
                {format!("{} {}", label, count)}
            </button>
        }
    };

    let count_of = |facet: TabFacet| match facet {
        TabFacet::Grouped => props.counts.grouped,
        TabFacet::Pinned => props.counts.pinned,
        TabFacet::Audible => props.counts.audible,
    };

    html! {
        <div class="facet-chips">
            {chip("All", props.counts.all, props.facets.is_all(), FacetChoice::All)}
            {for TabFacet::ALL.iter().map(|facet| {
                chip(facet.label(), count_of(*facet), props.facets.is_active(*facet), FacetChoice::Only(*facet))
            })}
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ToastStackProps {
    pub toasts: Vec<Toast>,
    pub on_dismiss: Callback<Uuid>,
}

#[function_component(ToastStack)]
pub fn toast_stack(props: &ToastStackProps) -> Html {
    html! {
        <div class="toast-stack">
            {for props.toasts.iter().map(|toast| {
                let alert_type = match toast.kind {
                    ToastKind::Success => AlertType::Success,
                    ToastKind::Info => AlertType::Info,
                    ToastKind::Warning => AlertType::Warning,
                    ToastKind::Danger => AlertType::Danger,
                };
                let id = toast.id;
                html! {
                    <Alert r#type={alert_type} title={toast.title.clone()} inline={true}>
                        if let Some(detail) = &toast.detail {
                            <p class="message-paragraph">{detail}</p>
                        }
                        <Button onclick={props.on_dismiss.reform(move |_| id)} variant={ButtonVariant::Link}>
                            {"Dismiss"}
                        </Button>
                    </Alert>
                }
            })}
        </div>
    }
}
